use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbImage};

use super::FilterError;

const LEVELS: usize = 256;

/// Comparison-ready form of a frame: single channel, fixed resolution,
/// histogram-equalized. Only ever held for the frame being compared and the
/// current reference slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedImage {
    gray: GrayImage,
}

impl PreprocessedImage {
    pub fn as_gray(&self) -> &GrayImage {
        &self.gray
    }

    #[cfg(test)]
    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }

    /// Expand back to a three-channel image with equal channels.
    #[cfg(test)]
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.gray.width(), self.gray.height(), |x, y| {
            let v = self.gray.get_pixel(x, y).0[0];
            image::Rgb([v, v, v])
        })
    }
}

/// Normalize `image` for comparison at `size` (width, height).
///
/// 1. BT.601 luma conversion
/// 2. direct stretch to `size` (skipped when already there)
/// 3. global histogram equalization
pub fn preprocess(image: &RgbImage, size: (u32, u32)) -> Result<PreprocessedImage, FilterError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(FilterError::EmptyImage);
    }

    let gray = to_luma(image);
    let mut gray = if gray.dimensions() == size {
        gray
    } else {
        image::imageops::resize(&gray, size.0, size.1, FilterType::Triangle)
    };
    equalize_histogram(&mut gray);

    Ok(PreprocessedImage { gray })
}

/// Rounded BT.601 weights, the usual video/OpenCV gray conversion.
/// Equal channels map back to the same level.
fn to_luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let l = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114 + 500) / 1000;
        Luma([l as u8])
    })
}

/// In-place global histogram equalization.
///
/// The lowest occupied level maps to 0 and the cumulative count above it is
/// stretched over 0..=255. A single-level image keeps its level.
pub fn equalize_histogram(gray: &mut GrayImage) {
    let mut hist = [0u64; LEVELS];
    for p in gray.pixels() {
        hist[p.0[0] as usize] += 1;
    }

    let total: u64 = hist.iter().sum();
    let Some(first) = hist.iter().position(|&count| count > 0) else {
        return;
    };
    if hist[first] == total {
        return;
    }

    let scale = (LEVELS - 1) as f64 / (total - hist[first]) as f64;
    let mut lut = [0u8; LEVELS];
    let mut cumulative = 0u64;
    for level in first + 1..LEVELS {
        cumulative += hist[level];
        lut[level] = (cumulative as f64 * scale).round().min(255.0) as u8;
    }

    for p in gray.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn stripes(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let v = ((x * 4) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        })
    }

    #[test]
    fn output_has_comparison_size() {
        let out = preprocess(&stripes(120, 40), (64, 48)).unwrap();
        assert_eq!(out.dimensions(), (64, 48));
    }

    #[test]
    fn equalization_spans_full_range() {
        let img = RgbImage::from_fn(64, 48, |x, _| {
            let v = 100 + (x % 8) as u8;
            Rgb([v, v, v])
        });
        let out = preprocess(&img, (64, 48)).unwrap();
        let min = out.as_gray().pixels().map(|p| p.0[0]).min().unwrap();
        let max = out.as_gray().pixels().map(|p| p.0[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn brightness_shift_is_normalized_away() {
        let dark = RgbImage::from_fn(64, 48, |x, y| {
            let v = ((x + y) % 32) as u8 + 40;
            Rgb([v, v, v])
        });
        let bright = RgbImage::from_fn(64, 48, |x, y| {
            let v = ((x + y) % 32) as u8 + 140;
            Rgb([v, v, v])
        });
        assert_eq!(
            preprocess(&dark, (64, 48)).unwrap(),
            preprocess(&bright, (64, 48)).unwrap()
        );
    }

    #[test]
    fn constant_image_keeps_its_level() {
        let img = RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]));
        let out = preprocess(&img, (8, 8)).unwrap();
        assert!(out.as_gray().pixels().all(|p| p.0[0] == 90));
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let once = preprocess(&stripes(64, 48), (64, 48)).unwrap();
        let twice = preprocess(&once.to_rgb(), (64, 48)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let img = stripes(200, 90);
        assert_eq!(
            preprocess(&img, (64, 48)).unwrap(),
            preprocess(&img, (64, 48)).unwrap()
        );
    }

    #[test]
    fn empty_image_is_rejected() {
        let err = preprocess(&RgbImage::new(0, 0), (64, 48)).unwrap_err();
        assert_eq!(err, FilterError::EmptyImage);
    }
}
