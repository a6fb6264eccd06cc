pub mod state;

pub use state::{Decision, SlideSelector};

use rayon::prelude::*;
use slide_deck_common::config::SelectionConfig;
use slide_deck_common::frame::{EncodedSlide, Frame, SourcedFrame};
use tracing::{debug, error, info, warn};

use crate::filter::FrameComparator;
use crate::storage::SlideSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub frames: u64,
    pub kept: u32,
    pub duplicates: u64,
    pub skipped: u64,
    /// Kept slides that could not be encoded and are missing from the output.
    pub unencoded: u32,
}

/// The kept slides of one pass, in sequence order, already JPEG-encoded.
#[derive(Debug, Default)]
pub struct Selection {
    pub slides: Vec<EncodedSlide>,
    pub stats: SelectionStats,
}

/// Run one forward pass over `frames`, emitting kept slides to `sink`.
///
/// Up to `prepare_window` frames are decoded and preprocessed in parallel,
/// then fed to the selector strictly in source order. Frames that failed to
/// decode or prepare are counted and skipped. Each kept slide is encoded
/// once at `jpeg_quality` and its raster dropped; only the reference stays
/// cached, in prepared form. If the sink fails it is dropped for the rest
/// of the pass so what it stored stays in order; the slides are still
/// returned.
pub fn select<C, I, S>(
    frames: I,
    comparator: C,
    config: &SelectionConfig,
    jpeg_quality: u8,
    sink: &mut S,
) -> Selection
where
    C: FrameComparator,
    I: IntoIterator<Item = SourcedFrame>,
    S: SlideSink + ?Sized,
{
    let mut selector = SlideSelector::new(comparator, config.threshold);
    let mut selection = Selection::default();
    let mut sink = Some(sink);
    let mut frames = frames.into_iter();
    let window = config.prepare_window.max(1);

    info!(
        comparator = selector.comparator().name(),
        threshold = config.threshold,
        width = config.compare_width,
        height = config.compare_height,
        window,
        "starting slide selection"
    );

    loop {
        let batch: Vec<SourcedFrame> = frames.by_ref().take(window).collect();
        if batch.is_empty() {
            break;
        }

        let comparator = selector.comparator();
        let prepared: Vec<Result<(Frame, C::Prepared), u64>> = batch
            .into_par_iter()
            .map(|item| match item {
                Ok(frame) => match comparator.prepare(&frame) {
                    Ok(p) => Ok((frame, p)),
                    Err(e) => {
                        warn!(index = frame.index, error = %e, "failed to prepare frame, skipping");
                        Err(frame.index)
                    }
                },
                Err(e) => {
                    warn!(index = e.index(), error = %e, "failed to load frame, skipping");
                    Err(e.index())
                }
            })
            .collect();

        for item in prepared {
            selection.stats.frames += 1;
            let (frame, p) = match item {
                Ok(pair) => pair,
                Err(_) => {
                    selection.stats.skipped += 1;
                    continue;
                }
            };

            match selector.offer(frame, p) {
                Decision::Keep { slide, score } => {
                    selection.stats.kept += 1;
                    info!(seq = slide.seq, index = slide.source_index(), score = ?score, "new slide");
                    let encoded = match slide.encode_jpeg(jpeg_quality) {
                        Ok(e) => e,
                        Err(e) => {
                            error!(seq = slide.seq, error = %e, "failed to encode slide, dropping it");
                            selection.stats.unencoded += 1;
                            continue;
                        }
                    };
                    if let Some(s) = sink.as_mut() {
                        if let Err(e) = s.put_slide(&encoded) {
                            error!(
                                sink = s.name(),
                                seq = encoded.seq,
                                error = %e,
                                "slide sink failed, no further slides will be stored"
                            );
                            sink = None;
                        }
                    }
                    selection.slides.push(encoded);
                }
                Decision::Duplicate {
                    index,
                    reference_seq,
                    score,
                } => {
                    debug!(index, reference = reference_seq, score, "duplicate of last slide");
                    selection.stats.duplicates += 1;
                }
                Decision::Skip { index } => {
                    debug!(index, "frame skipped");
                    selection.stats.skipped += 1;
                }
            }
        }
    }

    let stats = selection.stats;
    info!(
        frames = stats.frames,
        kept = stats.kept,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        unencoded = stats.unencoded,
        "slide selection finished"
    );
    selection
}


#[cfg(test)]
mod tests {
    use super::testing::{frames, RecordingSink, ScriptedComparator};
    use super::*;
    use slide_deck_common::frame::FrameError;
    use std::sync::Arc;

    fn config(window: usize) -> SelectionConfig {
        SelectionConfig {
            threshold: 0.9,
            compare_width: 8,
            compare_height: 8,
            prepare_window: window,
        }
    }

    /// Labels of the kept frames, looked up by source index in `input`.
    fn labels(input: &str, selection: &Selection) -> String {
        let chars: Vec<char> = input.chars().collect();
        selection
            .slides
            .iter()
            .map(|s| chars[s.source_index as usize])
            .collect()
    }

    // Arc lets a test keep a handle on the comparator after handing it over.
    impl FrameComparator for Arc<ScriptedComparator> {
        type Prepared = (u64, char);

        fn prepare(&self, frame: &Frame) -> Result<(u64, char), crate::filter::FilterError> {
            self.as_ref().prepare(frame)
        }

        fn score(
            &self,
            candidate: &(u64, char),
            reference: &(u64, char),
        ) -> Result<f64, crate::filter::FilterError> {
            self.as_ref().score(candidate, reference)
        }
    }

    #[test]
    fn empty_input_yields_no_slides() {
        let mut sink = RecordingSink::default();
        let selection = select(Vec::new(), ScriptedComparator::default(), &config(4), 90, &mut sink);
        assert!(selection.slides.is_empty());
        assert_eq!(selection.stats, SelectionStats::default());
        assert!(sink.seqs.is_empty());
    }

    #[test]
    fn runs_of_repeats_collapse() {
        let mut sink = RecordingSink::default();
        let selection = select(frames("AAABBC"), ScriptedComparator::default(), &config(4), 90, &mut sink);
        assert_eq!(labels("AAABBC", &selection), "ABC");
        assert_eq!(sink.seqs, [0, 1, 2]);
        assert_eq!(
            selection.stats,
            SelectionStats {
                frames: 6,
                kept: 3,
                duplicates: 3,
                skipped: 0,
                unencoded: 0,
            }
        );
    }

    #[test]
    fn returning_slide_is_kept_again() {
        let mut sink = RecordingSink::default();
        let selection = select(frames("ABA"), ScriptedComparator::default(), &config(2), 90, &mut sink);
        assert_eq!(labels("ABA", &selection), "ABA");
        let seqs: Vec<u32> = selection.slides.iter().map(|s| s.seq).collect();
        assert_eq!(seqs, [0, 1, 2]);
    }

    #[test]
    fn first_slide_is_first_decoded_frame() {
        let mut input: Vec<SourcedFrame> = vec![
            Err(FrameError::Decode {
                index: 0,
                reason: "truncated".into(),
            }),
            Err(FrameError::Empty { index: 1 }),
        ];
        input.extend(frames("BB").into_iter().map(|f| {
            f.map(|mut frame| {
                frame.index += 2;
                frame
            })
        }));

        let mut sink = RecordingSink::default();
        let selection = select(input, ScriptedComparator::default(), &config(3), 90, &mut sink);
        assert_eq!(selection.slides.len(), 1);
        assert_eq!(selection.slides[0].seq, 0);
        assert_eq!(selection.slides[0].source_index, 2);
        assert_eq!(selection.stats.skipped, 2);
    }

    #[test]
    fn only_failures_yield_no_slides() {
        let input: Vec<SourcedFrame> = (0..3).map(|index| Err(FrameError::Empty { index })).collect();
        let mut sink = RecordingSink::default();
        let selection = select(input, ScriptedComparator::default(), &config(2), 90, &mut sink);
        assert!(selection.slides.is_empty());
        assert_eq!(selection.stats.skipped, 3);
    }

    #[test]
    fn compares_only_against_most_recent_slide() {
        // A, a (dup of A), B, b (dup of B), A: every comparison must target
        // the latest kept frame, never a rejected one.
        let comparator = Arc::new(
            ScriptedComparator::default()
                .with_score('A', 'a', 0.97)
                .with_score('B', 'b', 0.99)
                .with_score('a', 'B', 0.1)
                .with_score('b', 'A', 0.1),
        );
        let mut sink = RecordingSink::default();
        let selection = select(frames("AaBbA"), Arc::clone(&comparator), &config(3), 90, &mut sink);

        assert_eq!(labels("AaBbA", &selection), "ABA");
        assert_eq!(comparator.calls(), [(1, 0), (2, 0), (3, 2), (4, 2)]);
    }

    #[test]
    fn result_does_not_depend_on_window() {
        let comparator = || {
            ScriptedComparator::default()
                .with_score('A', 'a', 0.95)
                .with_score('a', 'b', 0.5)
                .failing_on('x')
        };
        let input = "AaxaBbxbbAa";
        let mut baseline = None;
        for window in [1, 2, 3, 7, 64] {
            let mut sink = RecordingSink::default();
            let selection = select(frames(input), comparator(), &config(window), 90, &mut sink);
            let got = (labels(input, &selection), selection.stats, sink.seqs.clone());
            match &baseline {
                None => baseline = Some(got),
                Some(expected) => assert_eq!(&got, expected, "window {window}"),
            }
        }
    }

    #[test]
    fn sink_failure_stops_storing_but_keeps_selecting() {
        let mut sink = RecordingSink {
            fail_at: Some(1),
            ..Default::default()
        };
        let selection = select(frames("ABCD"), ScriptedComparator::default(), &config(2), 90, &mut sink);
        assert_eq!(labels("ABCD", &selection), "ABCD");
        assert_eq!(sink.seqs, [0]);
    }
}
