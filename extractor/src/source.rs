use slide_deck_common::frame::{Frame, FrameError, SourcedFrame};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Lazily decodes a directory of sampled frames in file-name order.
///
/// Indices follow the sorted listing, so a frame that fails to decode still
/// occupies its position and is reported in-band.
pub struct DirectorySource {
    paths: std::vec::IntoIter<PathBuf>,
    next_index: u64,
}

impl DirectorySource {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| SourceError::ReadDir(dir.display().to_string(), e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        paths.sort();

        info!(dir = %dir.display(), frames = paths.len(), "frame directory listed");
        Ok(Self {
            paths: paths.into_iter(),
            next_index: 0,
        })
    }
}

impl Iterator for DirectorySource {
    type Item = SourcedFrame;

    fn next(&mut self) -> Option<SourcedFrame> {
        let path = self.paths.next()?;
        let index = self.next_index;
        self.next_index += 1;

        debug!(index, path = %path.display(), "loading frame");
        let data = match std::fs::read(&path) {
            Ok(d) => d,
            Err(e) => {
                return Some(Err(FrameError::Read {
                    index,
                    reason: format!("{}: {e}", path.display()),
                }))
            }
        };
        Some(Frame::decode(index, &data))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to list frame directory {0}: {1}")]
    ReadDir(String, std::io::Error),
}
