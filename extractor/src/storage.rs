use slide_deck_common::frame::EncodedSlide;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::keys::slide_file_name;

/// Receives every kept slide, in sequence order, as soon as it is emitted.
pub trait SlideSink {
    fn put_slide(&mut self, slide: &EncodedSlide) -> Result<(), SinkError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Writes slides as `slide_NNNN.jpg` into a directory, byte for byte as
/// encoded, so the same JPEG ends up in the document.
///
/// Refuses a sequence number that does not move forward, so the files on
/// disk are always in emission order.
pub struct DirectorySink {
    dir: PathBuf,
    next_seq: u32,
}

impl DirectorySink {
    /// Create the sink, making `dir` if it does not exist.
    pub fn create(dir: &Path) -> Result<Self, SinkError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| SinkError::CreateDir(dir.display().to_string(), e))?;
        info!(dir = %dir.display(), "slide directory ready");
        Ok(Self {
            dir: dir.to_path_buf(),
            next_seq: 0,
        })
    }
}

impl SlideSink for DirectorySink {
    fn put_slide(&mut self, slide: &EncodedSlide) -> Result<(), SinkError> {
        if slide.seq < self.next_seq {
            return Err(SinkError::OutOfOrder {
                expected: self.next_seq,
                got: slide.seq,
            });
        }

        let path = self.dir.join(slide_file_name(slide.seq, "jpg"));
        std::fs::write(&path, &slide.jpeg)
            .map_err(|e| SinkError::Write(path.display().to_string(), e.to_string()))?;

        debug!(seq = slide.seq, path = %path.display(), bytes = slide.jpeg.len(), "stored slide");
        self.next_seq = slide.seq + 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "directory"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create slide directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to write slide {0}: {1}")]
    Write(String, String),
    #[error("slide out of order: expected {expected}, got {got}")]
    OutOfOrder { expected: u32, got: u32 },
}
