use image::GrayImage;
use rayon::prelude::*;
use slide_deck_common::config::SelectionConfig;
use slide_deck_common::frame::Frame;

use super::preprocess::{preprocess, PreprocessedImage};
use super::traits::FrameComparator;
use super::FilterError;

const WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Mean structural similarity of two equally sized grayscale images.
///
/// Local statistics come from 7x7 uniform windows with sample covariance
/// (N/(N-1)); only windows lying fully inside the image contribute. Row sums
/// run in parallel but are added in row order, so the result is bit-for-bit
/// reproducible.
pub fn mean_ssim(a: &GrayImage, b: &GrayImage) -> Result<f64, FilterError> {
    if a.dimensions() != b.dimensions() {
        return Err(FilterError::DimensionMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }
    let (width, height) = a.dimensions();
    if (width as usize) < WINDOW || (height as usize) < WINDOW {
        return Err(FilterError::TooSmall {
            width,
            height,
            window: WINDOW as u32,
        });
    }

    let w = width as usize;
    let h = height as usize;
    let xs = a.as_raw();
    let ys = b.as_raw();

    let sum_x = Integral::build(w, h, |i| u64::from(xs[i]));
    let sum_y = Integral::build(w, h, |i| u64::from(ys[i]));
    let sum_xx = Integral::build(w, h, |i| u64::from(xs[i]) * u64::from(xs[i]));
    let sum_yy = Integral::build(w, h, |i| u64::from(ys[i]) * u64::from(ys[i]));
    let sum_xy = Integral::build(w, h, |i| u64::from(xs[i]) * u64::from(ys[i]));

    let n = (WINDOW * WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let rows = h - WINDOW + 1;
    let cols = w - WINDOW + 1;

    let row_sums: Vec<f64> = (0..rows)
        .into_par_iter()
        .map(|y| {
            let mut acc = 0.0;
            for x in 0..cols {
                let ux = sum_x.window(x, y) as f64 / n;
                let uy = sum_y.window(x, y) as f64 / n;
                let uxx = sum_xx.window(x, y) as f64 / n;
                let uyy = sum_yy.window(x, y) as f64 / n;
                let uxy = sum_xy.window(x, y) as f64 / n;

                let vx = cov_norm * (uxx - ux * ux);
                let vy = cov_norm * (uyy - uy * uy);
                let vxy = cov_norm * (uxy - ux * uy);

                let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
                let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
                acc += numerator / denominator;
            }
            acc
        })
        .collect();

    let total: f64 = row_sums.iter().sum();
    Ok(total / (rows * cols) as f64)
}

/// Summed-area table over a `width` x `height` plane, padded by one row and
/// column of zeros.
struct Integral {
    stride: usize,
    sums: Vec<u64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize) -> u64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0u64; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0u64;
            for x in 0..width {
                row += value(y * width + x);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the window whose top-left corner is (x, y).
    fn window(&self, x: usize, y: usize) -> u64 {
        let top = y * self.stride;
        let bottom = (y + WINDOW) * self.stride;
        let (a, b) = (self.sums[top + x], self.sums[top + x + WINDOW]);
        let (c, d) = (self.sums[bottom + x], self.sums[bottom + x + WINDOW]);
        (d + a) - (b + c)
    }
}

/// Structural-similarity comparator over preprocessed frames.
#[derive(Debug, Clone, Copy)]
pub struct SsimComparator {
    size: (u32, u32),
}

impl SsimComparator {
    pub fn new(size: (u32, u32)) -> Self {
        Self { size }
    }

    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(config.compare_size())
    }
}

impl FrameComparator for SsimComparator {
    type Prepared = PreprocessedImage;

    fn prepare(&self, frame: &Frame) -> Result<PreprocessedImage, FilterError> {
        preprocess(&frame.image, self.size)
    }

    fn score(
        &self,
        candidate: &PreprocessedImage,
        reference: &PreprocessedImage,
    ) -> Result<f64, FilterError> {
        mean_ssim(candidate.as_gray(), reference.as_gray())
    }

    fn name(&self) -> &str {
        "ssim"
    }
}
