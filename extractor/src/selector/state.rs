use slide_deck_common::frame::{Frame, Slide};
use tracing::{info, warn};

use crate::filter::FrameComparator;

/// The most recently kept slide, held in prepared form so it is only
/// preprocessed once.
struct Reference<P> {
    seq: u32,
    index: u64,
    prepared: P,
}

/// Outcome of offering one prepared frame to the selector.
#[derive(Debug)]
pub enum Decision {
    /// The frame became a new slide and is now the reference.
    Keep { slide: Slide, score: Option<f64> },
    /// The frame matched the reference and was dropped.
    Duplicate {
        index: u64,
        reference_seq: u32,
        score: f64,
    },
    /// The frame could not be compared; the reference is unchanged.
    Skip { index: u64 },
}

#[cfg(test)]
impl Decision {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep { .. })
    }
}

/// Sequential deduplication against the last kept slide.
///
/// ```text
///   frame ─┬─ no reference yet ──────────────► keep (seq 0)
///          └─ score(frame, reference)
///                ├─ score >  threshold ───────► drop
///                └─ score <= threshold ───────► keep (next seq), becomes reference
/// ```
///
/// Only the single most recent slide is ever compared against, so a slide
/// that comes back later is kept again.
pub struct SlideSelector<C: FrameComparator> {
    comparator: C,
    threshold: f64,
    last_kept: Option<Reference<C::Prepared>>,
    next_seq: u32,
}

impl<C: FrameComparator> SlideSelector<C> {
    pub fn new(comparator: C, threshold: f64) -> Self {
        Self {
            comparator,
            threshold,
            last_kept: None,
            next_seq: 0,
        }
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// `(seq, frame index)` of the current reference slide.
    #[cfg(test)]
    pub fn last_kept(&self) -> Option<(u32, u64)> {
        self.last_kept.as_ref().map(|r| (r.seq, r.index))
    }

    /// Prepare and offer a frame in one step.
    #[cfg(test)]
    pub fn process(&mut self, frame: Frame) -> Decision {
        match self.comparator.prepare(&frame) {
            Ok(prepared) => self.offer(frame, prepared),
            Err(_) => Decision::Skip { index: frame.index },
        }
    }

    /// Apply the transition for a frame whose prepared form is already known.
    pub fn offer(&mut self, frame: Frame, prepared: C::Prepared) -> Decision {
        let Some(reference) = &self.last_kept else {
            info!(index = frame.index, "first frame, keeping as slide 0");
            return self.keep(frame, prepared, None);
        };

        let verdict = match self
            .comparator
            .are_similar(&prepared, &reference.prepared, self.threshold)
        {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    index = frame.index,
                    reference = reference.seq,
                    reference_index = reference.index,
                    error = %e,
                    "comparison failed, skipping frame"
                );
                return Decision::Skip { index: frame.index };
            }
        };

        if verdict.similar {
            return Decision::Duplicate {
                index: frame.index,
                reference_seq: reference.seq,
                score: verdict.score,
            };
        }
        self.keep(frame, prepared, Some(verdict.score))
    }

    fn keep(&mut self, frame: Frame, prepared: C::Prepared, score: Option<f64>) -> Decision {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.last_kept = Some(Reference {
            seq,
            index: frame.index,
            prepared,
        });
        Decision::Keep {
            slide: Slide { seq, frame },
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SsimComparator;
    use crate::selector::testing::{frame, ScriptedComparator};
    use image::{Rgb, RgbImage};

    #[test]
    fn first_frame_is_always_kept() {
        let mut selector = SlideSelector::new(ScriptedComparator::default(), 0.9);
        let decision = selector.process(frame(5, 'A'));
        match decision {
            Decision::Keep { slide, score } => {
                assert_eq!(slide.seq, 0);
                assert_eq!(slide.source_index(), 5);
                assert!(score.is_none());
            }
            other => panic!("expected keep, got {other:?}"),
        }
        assert_eq!(selector.last_kept(), Some((0, 5)));
    }

    #[test]
    fn duplicate_leaves_reference_untouched() {
        let comparator = ScriptedComparator::default().with_score('A', 'a', 0.95);
        let mut selector = SlideSelector::new(comparator, 0.9);
        assert!(selector.process(frame(0, 'A')).is_keep());

        let decision = selector.process(frame(1, 'a'));
        assert!(matches!(
            decision,
            Decision::Duplicate { index: 1, reference_seq: 0, .. }
        ));
        assert_eq!(selector.last_kept(), Some((0, 0)));
    }

    #[test]
    fn score_at_threshold_starts_new_slide() {
        let comparator = ScriptedComparator::default().with_score('A', 'B', 0.9);
        let mut selector = SlideSelector::new(comparator, 0.9);
        selector.process(frame(0, 'A'));
        match selector.process(frame(1, 'B')) {
            Decision::Keep { slide, score } => {
                assert_eq!(slide.seq, 1);
                assert_eq!(score, Some(0.9));
            }
            other => panic!("expected keep, got {other:?}"),
        }
        assert_eq!(selector.last_kept(), Some((1, 1)));
    }

    #[test]
    fn failed_preparation_is_skipped() {
        let comparator = ScriptedComparator::default().failing_on('X');
        let mut selector = SlideSelector::new(comparator, 0.9);
        assert!(matches!(
            selector.process(frame(0, 'X')),
            Decision::Skip { index: 0 }
        ));
        assert!(selector.last_kept().is_none());

        // The next good frame still becomes slide 0.
        match selector.process(frame(1, 'A')) {
            Decision::Keep { slide, .. } => assert_eq!(slide.seq, 0),
            other => panic!("expected keep, got {other:?}"),
        }
    }

    #[test]
    fn ssim_selector_drops_exact_repeat() {
        let comparator = SsimComparator::new((32, 24));
        let mut selector = SlideSelector::new(comparator, 0.9);
        let img = RgbImage::from_fn(64, 48, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([5, 5, 5])
            }
        });
        assert!(selector.process(Frame::new(0, img.clone())).is_keep());
        assert!(matches!(
            selector.process(Frame::new(1, img)),
            Decision::Duplicate { .. }
        ));
    }
}
