use slide_deck_common::config::Config;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::document::{Document, DocumentError};
use crate::filter::SsimComparator;
use crate::keys::{document_file_name, sanitize_title, work_dir_name};
use crate::sampler::{self, SamplerError};
use crate::selector::{self, SelectionStats};
use crate::source::{DirectorySource, SourceError};
use crate::storage::{DirectorySink, SinkError};

/// How one input ended. An empty deck is an outcome, not an error.
#[derive(Debug)]
pub enum Outcome {
    Created {
        path: PathBuf,
        pages: usize,
        stats: SelectionStats,
    },
    NoSlides {
        stats: SelectionStats,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("input {0} does not exist")]
    MissingInput(String),
    #[error("failed to prepare work directory {0}: {1}")]
    WorkDir(String, std::io::Error),
    #[error("input {input} overlaps work directory {work}; choose another output.work_dir")]
    Overlap { input: String, work: String },
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("selection task failed: {0}")]
    Join(String),
}

/// Base name for the work directory and the output document.
pub fn input_title(input: &Path) -> String {
    let stem = if input.is_dir() {
        input.file_name()
    } else {
        input.file_stem()
    };
    let title = stem
        .map(|s| sanitize_title(&s.to_string_lossy()))
        .unwrap_or_default();
    if title.is_empty() {
        "slides".into()
    } else {
        title
    }
}

/// Titles handed out during one run. A repeated title gets a numeric
/// suffix, so no two inputs share a document or a work directory.
#[derive(Debug, Default)]
pub struct DeckNames {
    taken: HashSet<String>,
}

impl DeckNames {
    /// e.g. "talk", then "talk (2)", "talk (3)"
    pub fn claim(&mut self, title: &str) -> String {
        // Case-folded: output may land on a case-insensitive filesystem.
        if self.taken.insert(title.to_lowercase()) {
            return title.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{title} ({n})");
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Turn one input (a video file or a directory of sampled frames) into
/// `<output_dir>/<title>.pdf`.
///
/// Scratch files live in `<work_dir>/<title>.slide-deck`, which this tool
/// owns: it is cleared before the run and removed afterwards unless
/// `keep_intermediate` is set. A work directory that contains the input,
/// or lies inside it, is refused before anything is touched.
pub async fn process_input(
    input: &Path,
    title: &str,
    config: &Config,
) -> Result<Outcome, PipelineError> {
    if !input.exists() {
        return Err(PipelineError::MissingInput(input.display().to_string()));
    }

    let work = work_area(input, title, &config.output.work_dir).await?;
    let pdf_path = config.output.output_dir.join(document_file_name(title));
    clean_work_dir(&work).await;

    let result = run(input, &work, &pdf_path, config).await;

    if !config.output.keep_intermediate {
        clean_work_dir(&work).await;
    }
    result
}

async fn work_area(input: &Path, title: &str, work_dir: &Path) -> Result<PathBuf, PipelineError> {
    tokio::fs::create_dir_all(work_dir)
        .await
        .map_err(|e| PipelineError::WorkDir(work_dir.display().to_string(), e))?;
    let root = tokio::fs::canonicalize(work_dir)
        .await
        .map_err(|e| PipelineError::WorkDir(work_dir.display().to_string(), e))?;
    let input = tokio::fs::canonicalize(input)
        .await
        .map_err(|e| PipelineError::WorkDir(input.display().to_string(), e))?;

    let work = root.join(work_dir_name(title));
    if input.starts_with(&work) || work.starts_with(&input) {
        return Err(PipelineError::Overlap {
            input: input.display().to_string(),
            work: work.display().to_string(),
        });
    }
    Ok(work)
}

async fn run(
    input: &Path,
    work: &Path,
    pdf_path: &Path,
    config: &Config,
) -> Result<Outcome, PipelineError> {
    let frames_dir = if input.is_dir() {
        info!(dir = %input.display(), "using pre-sampled frames");
        input.to_path_buf()
    } else {
        let sampled = sampler::sample_video(input, &work.join("frames"), &config.sampling).await?;
        if sampled.count == 0 {
            warn!(video = %input.display(), "ffmpeg produced no frames");
        }
        sampled.dir
    };

    let slides_dir = work.join("slides");
    let pdf_path = pdf_path.to_path_buf();
    let config = config.clone();
    tokio::task::spawn_blocking(move || build_deck(&frames_dir, &slides_dir, &pdf_path, &config))
        .await
        .map_err(|e| PipelineError::Join(e.to_string()))?
}

/// The synchronous core: select slides from `frames_dir`, store them under
/// `slides_dir`, and write the PDF if any slide was kept.
pub fn build_deck(
    frames_dir: &Path,
    slides_dir: &Path,
    pdf_path: &Path,
    config: &Config,
) -> Result<Outcome, PipelineError> {
    let source = DirectorySource::open(frames_dir)?;
    let mut sink = DirectorySink::create(slides_dir)?;
    let comparator = SsimComparator::from_config(&config.selection);

    let selection = selector::select(
        source,
        comparator,
        &config.selection,
        config.output.jpeg_quality,
        &mut sink,
    );
    let stats = selection.stats;

    let Some(document) = Document::assemble(&selection.slides) else {
        warn!(frames = stats.frames, skipped = stats.skipped, "no slides produced, no document created");
        return Ok(Outcome::NoSlides { stats });
    };

    document.write_pdf(pdf_path)?;
    Ok(Outcome::Created {
        path: pdf_path.to_path_buf(),
        pages: document.page_count(),
        stats,
    })
}

async fn clean_work_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => info!(dir = %dir.display(), "removed work directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove work directory"),
    }
}
