use image::codecs::jpeg::JpegEncoder;
use image::{ImageReader, RgbImage};
use std::io::Cursor;

/// A sampled video frame: its position in the source sequence plus the decoded raster.
///
/// Frames are immutable once produced by a frame source.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

/// What a frame source yields for each sampled position. A decode failure is
/// carried in-band so the selector can skip it without ending the scan.
pub type SourcedFrame = Result<Frame, FrameError>;

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Decode an encoded image (JPEG, PNG) into a frame.
    pub fn decode(index: u64, data: &[u8]) -> Result<Self, FrameError> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| FrameError::Decode {
                index,
                reason: e.to_string(),
            })?
            .decode()
            .map_err(|e| FrameError::Decode {
                index,
                reason: e.to_string(),
            })?;

        let image = img.to_rgb8();
        if image.width() == 0 || image.height() == 0 {
            return Err(FrameError::Empty { index });
        }
        Ok(Self { index, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A frame promoted to the output deck.
///
/// `seq` is the slide's rank among kept slides: contiguous from 0 in emission order.
#[derive(Debug, Clone)]
pub struct Slide {
    pub seq: u32,
    pub frame: Frame,
}

impl Slide {
    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.frame.image
    }

    /// Index of the frame this slide was taken from.
    pub fn source_index(&self) -> u64 {
        self.frame.index
    }

    /// Encode once for storage and the document; the raster can be dropped after.
    pub fn encode_jpeg(&self, quality: u8) -> Result<EncodedSlide, FrameError> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality)
            .encode_image(self.image())
            .map_err(|e| FrameError::Encode {
                index: self.frame.index,
                reason: e.to_string(),
            })?;
        let (width, height) = self.dimensions();
        Ok(EncodedSlide {
            seq: self.seq,
            source_index: self.frame.index,
            width,
            height,
            jpeg,
        })
    }
}

/// A kept slide in its stored form: the JPEG written to disk and embedded in
/// the document, plus the pixel size of the source frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSlide {
    pub seq: u32,
    pub source_index: u64,
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to read frame {index}: {reason}")]
    Read { index: u64, reason: String },
    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: u64, reason: String },
    #[error("frame {index} has no pixels")]
    Empty { index: u64 },
    #[error("failed to encode frame {index}: {reason}")]
    Encode { index: u64, reason: String },
}

impl FrameError {
    pub fn index(&self) -> u64 {
        match self {
            Self::Read { index, .. }
            | Self::Decode { index, .. }
            | Self::Empty { index }
            | Self::Encode { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder, Rgb};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    #[test]
    fn decode_png() {
        let frame = Frame::decode(3, &png_bytes(16, 9)).unwrap();
        assert_eq!(frame.index, 3);
        assert_eq!(frame.dimensions(), (16, 9));
        assert_eq!(frame.image.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn decode_garbage_reports_index() {
        let err = Frame::decode(42, b"definitely not an image").unwrap_err();
        assert!(matches!(err, FrameError::Decode { index: 42, .. }));
        assert_eq!(err.index(), 42);
    }

    #[test]
    fn slide_exposes_source_frame() {
        let frame = Frame::new(7, RgbImage::new(4, 2));
        let slide = Slide { seq: 0, frame };
        assert_eq!(slide.source_index(), 7);
        assert_eq!(slide.dimensions(), (4, 2));
    }

    #[test]
    fn encoded_slide_keeps_size_and_decodes() {
        let slide = Slide {
            seq: 2,
            frame: Frame::new(11, RgbImage::from_pixel(40, 30, Rgb([200, 100, 50]))),
        };
        let encoded = slide.encode_jpeg(90).unwrap();
        assert_eq!((encoded.seq, encoded.source_index), (2, 11));
        assert_eq!((encoded.width, encoded.height), (40, 30));
        assert!(encoded.jpeg.starts_with(&[0xFF, 0xD8]));

        let back = Frame::decode(0, &encoded.jpeg).unwrap();
        assert_eq!(back.dimensions(), (40, 30));
    }
}
