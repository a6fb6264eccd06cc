use slide_deck_common::frame::Frame;

use super::FilterError;

/// Strict threshold: a score equal to the threshold counts as a new slide.
pub fn is_similar(score: f64, threshold: f64) -> bool {
    score > threshold
}

/// Verdict of one comparison, with the score that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub score: f64,
    pub similar: bool,
}

/// Scores how alike an incoming frame is to a reference slide.
///
/// Preparation is split from scoring so the selector can cache the prepared
/// form of its current reference, and so frames can be prepared ahead of the
/// sequential pass. Both steps must be pure.
pub trait FrameComparator: Send + Sync {
    type Prepared: Send;

    fn prepare(&self, frame: &Frame) -> Result<Self::Prepared, FilterError>;

    /// Similarity in [-1, 1], 1 meaning identical.
    fn score(
        &self,
        candidate: &Self::Prepared,
        reference: &Self::Prepared,
    ) -> Result<f64, FilterError>;

    /// Score the pair and apply `threshold`.
    fn are_similar(
        &self,
        candidate: &Self::Prepared,
        reference: &Self::Prepared,
        threshold: f64,
    ) -> Result<Similarity, FilterError> {
        let score = self.score(candidate, reference)?;
        Ok(Similarity {
            score,
            similar: is_similar(score, threshold),
        })
    }

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
