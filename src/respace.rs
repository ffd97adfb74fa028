use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use log::{debug, info};
use serde::Serialize;
use crate::compare::SimilarityOracle;
use crate::progress::Counters;
use crate::respace::drift::DriftTracker;
use crate::respace::realloc::{Adjustment, Reallocator};
use crate::respace::threshold::AdaptiveThreshold;
use crate::respace::window::{Representative, Window};
use crate::sink::FrameSink;
use crate::source::{FrameSource, SourceFrame};
use crate::{Args, Error};

pub mod drift;
pub mod realloc;
pub mod threshold;
pub mod window;

/// Shared stop request, checked once per cycle
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Positions of the main flow. `counters` mirrors them for progress reporting only.
#[derive(Debug, Default)]
pub struct ProcessingContext {
    pub counters: Arc<Counters>,
    pub cancel: CancelToken,
    frames_read: usize,
    frames_written: usize,
}

impl ProcessingContext {
    pub fn new(counters: Arc<Counters>, cancel: CancelToken) -> Self {
        Self { counters, cancel, frames_read: 0, frames_written: 0 }
    }

    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Reads the next frame together with its position in the input
    fn read<S: FrameSource>(&mut self, source: &mut S) -> Result<Option<(SourceFrame<S::Frame>, usize)>, Error> {
        let Some(frame) = source.next_frame()? else { return Ok(None) };
        let index = self.frames_read;
        self.frames_read += 1;
        self.counters.add_read(1);
        Ok(Some((frame, index)))
    }

    fn emit<F, K: FrameSink<F>>(&mut self, representative: &Representative<F>, sink: &mut K) -> Result<(), Error> {
        for _ in 0..representative.count {
            sink.write_frame(&representative.full)?;
            self.frames_written += 1;
            self.counters.add_written(1);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames_read: usize,
    pub frames_written: usize,
    pub representatives: usize,
    pub donated: usize,
    pub trimmed: usize,
    pub padded: usize,
    pub final_drift: i64,
    pub cancelled: bool,
    pub elapsed_secs: f64,
    pub args: Args,
}

impl RunSummary {
    fn record(&mut self, adjustment: &Adjustment) {
        self.donated += adjustment.donated;
        self.trimmed += adjustment.trimmed;
        self.padded += adjustment.padded;
    }
}

enum Fill<F> {
    /// The window is full, `seed` is the first frame of the next representative
    Full { seed: Representative<F> },
    Exhausted,
}

/// Re-times a stream of frames so each distinct frame gets written `duplicate_count` times
pub struct Respacer<O> {
    args: Args,
    oracle: O,
    threshold: AdaptiveThreshold,
    reallocator: Reallocator,
    drift: DriftTracker,
}

impl<O: SimilarityOracle> Respacer<O> {
    pub fn new(args: &Args, oracle: O) -> Self {
        Self {
            args: args.clone(),
            oracle,
            threshold: AdaptiveThreshold::new(args.threshold_strict, args.threshold_relaxed),
            reallocator: Reallocator::new(args.duplicate_count, args.adjustment_bound),
            drift: DriftTracker::new(args.buffer_size),
        }
    }

    pub fn drift(&self) -> i64 {
        self.drift.drift()
    }

    /// Processes the whole source, or until cancelled, and drains everything that was read into `sink`
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K, ctx: &mut ProcessingContext) -> Result<RunSummary, Error>
    where
        S: FrameSource,
        K: FrameSink<S::Frame>,
    {
        let start = Instant::now();
        let mut window = Window::new(self.args.buffer_size);
        let mut summary = RunSummary { args: self.args.clone(), ..RunSummary::default() };

        loop {
            if ctx.cancel.is_cancelled() {
                info!("Interrupted, writing {} buffered frames", window.len());
                summary.cancelled = true;
                break;
            }

            let seed = match self.fill(&mut window, source, ctx, &mut summary)? {
                Fill::Full { seed } => seed,
                Fill::Exhausted => break,
            };

            if let Some(head) = window.head() {
                if self.drift.tick(ctx.frames_written(), head.source_index) {
                    debug!("Drift {} at frame #{}", self.drift.drift(), head.source_index);
                }
            }
            let adjustment = self.reallocator.adjust(&mut window, &mut self.drift);
            if adjustment.trimmed > 0 || adjustment.padded > 0 {
                debug!(
                    "Corrected drift: trimmed {}, padded {}, now {}",
                    adjustment.trimmed, adjustment.padded, self.drift.drift()
                );
            }
            summary.record(&adjustment);

            if let Some(head) = window.rotate(seed) {
                ctx.emit(&head, sink)?;
            }
        }

        for representative in window.drain() {
            ctx.emit(&representative, sink)?;
        }

        summary.frames_read = ctx.frames_read();
        summary.frames_written = ctx.frames_written();
        summary.final_drift = self.drift.drift();
        summary.elapsed_secs = start.elapsed().as_secs_f64();
        Ok(summary)
    }

    /// Reads frames into the window until it is full or the source ends
    fn fill<S: FrameSource>(
        &mut self,
        window: &mut Window<S::Frame>,
        source: &mut S,
        ctx: &mut ProcessingContext,
        summary: &mut RunSummary,
    ) -> Result<Fill<S::Frame>, Error> {
        loop {
            let Some((frame, index)) = ctx.read(source)? else {
                return Ok(Fill::Exhausted);
            };

            let score = window.tail()
                .map(|tail| self.oracle.dissimilarity(&tail.proxy, &frame.proxy));

            if let (Some(score), Some(tail)) = (score, window.tail_mut()) {
                if self.threshold.matches(score) {
                    tail.count += 1;
                    self.threshold.on_match(tail.count, self.args.duplicate_count);
                    continue;
                }
            }

            self.threshold.on_new_frame();
            summary.representatives += 1;
            let representative = Representative::new(frame.full, frame.proxy, score.unwrap_or(0.0), index);
            if let Err(seed) = window.try_push(representative) {
                return Ok(Fill::Full { seed });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::StdDevOracle;
    use crate::source::IterSource;
    use image::{GrayImage, Luma};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    type TestFrame = (usize, usize);

    /// Proxy with a single lit pixel, any two different contents have the same dissimilarity
    fn proxy(content: usize) -> GrayImage {
        let mut proxy = GrayImage::new(8, 8);
        let i = (content % 64) as u32;
        proxy.put_pixel(i % 8, i / 8, Luma([255]));
        proxy
    }

    fn frames(contents: &[usize]) -> IterSource<impl Iterator<Item = SourceFrame<TestFrame>>> {
        let frames: Vec<_> = contents.iter().enumerate()
            .map(|(i, c)| SourceFrame { full: (*c, i), proxy: proxy(*c) })
            .collect();
        IterSource::new(frames.into_iter())
    }

    /// Expands run lengths into frame contents, content `i` for run `i`
    fn runs(lengths: &[usize]) -> Vec<usize> {
        lengths.iter().enumerate()
            .flat_map(|(content, length)| std::iter::repeat(content).take(*length))
            .collect()
    }

    fn test_args(buffer_size: usize, duplicate_count: usize, adjustment_bound: usize) -> Args {
        Args { buffer_size, duplicate_count, adjustment_bound, ..Args::default() }
    }

    fn respace(contents: &[usize], args: &Args) -> (Vec<TestFrame>, RunSummary) {
        let mut sink = Vec::new();
        let mut ctx = ProcessingContext::default();
        let summary = Respacer::new(args, StdDevOracle)
            .run(&mut frames(contents), &mut sink, &mut ctx)
            .unwrap();
        (sink, summary)
    }

    fn contents(output: &[TestFrame]) -> Vec<usize> {
        output.iter().map(|(content, _)| *content).collect()
    }

    #[test]
    fn pairs_pass_through() {
        let input = [1, 1, 2, 2, 3, 3];
        let (output, summary) = respace(&input, &test_args(3, 2, 5));
        assert_eq!(contents(&output), input);
        assert_eq!(summary.representatives, 3);
        assert_eq!(summary.final_drift, 0);
        assert_eq!(summary.frames_written, 6);
    }

    #[test]
    fn end_of_stream_drains_without_adjusting() {
        // The stream ends before the window ever fills, so counts are written as read
        let input = [1, 1, 1, 2, 2, 3];
        let (output, summary) = respace(&input, &test_args(3, 2, 5));
        assert_eq!(contents(&output), input);
        assert_eq!(summary.donated, 0);
    }

    #[test]
    fn surplus_fills_deficient_frame() {
        let (output, summary) = respace(&[1, 1, 1, 2, 3, 3, 4, 4], &test_args(3, 2, 5));
        assert_eq!(contents(&output), [1, 1, 2, 2, 3, 3, 4, 4]);
        assert_eq!(summary.donated, 1);
        assert_eq!(summary.frames_written, summary.frames_read);
    }

    #[test]
    fn correctly_spaced_input_is_unchanged() {
        let input = runs(&[2; 20]);
        let (output, summary) = respace(&input, &test_args(3, 2, 5));
        assert_eq!(contents(&output), input);
        assert_eq!(summary.donated + summary.trimmed + summary.padded, 0);
        assert_eq!(summary.final_drift, 0);

        let input = runs(&[3; 15]);
        let (output, _) = respace(&input, &test_args(7, 3, 5));
        assert_eq!(contents(&output), input);
    }

    #[test]
    fn distinct_frames_without_donors_are_kept_once() {
        let input: Vec<_> = (0..20).collect();
        let (output, summary) = respace(&input, &test_args(3, 2, 5));
        assert_eq!(contents(&output), input);
        assert_eq!(summary.representatives, 20);
        assert_eq!(summary.donated, 0);
        assert_eq!(summary.final_drift, 0);
    }

    #[test]
    fn positive_drift_is_trimmed() {
        // Run 2 takes a copy from run 3 before it is written, putting the output one frame ahead
        let input = runs(&[2, 2, 1, 3, 2, 3, 2, 2]);
        let (output, summary) = respace(&input, &test_args(3, 2, 1));
        assert_eq!(contents(&output), runs(&[2; 8]));
        assert_eq!(summary.donated, 1);
        assert_eq!(summary.trimmed, 1);
        assert_eq!(summary.frames_read, 17);
        assert_eq!(summary.frames_written, 16);
        assert_eq!(summary.final_drift, 0);
    }

    #[test]
    fn negative_drift_is_padded() {
        // Run 2 gives a copy to run 3, putting the output one frame behind
        let input = runs(&[2, 2, 3, 1, 1, 2, 2]);
        let (output, summary) = respace(&input, &test_args(3, 2, 1));
        assert_eq!(contents(&output), runs(&[2; 7]));
        assert_eq!(summary.donated, 1);
        assert_eq!(summary.padded, 1);
        assert_eq!(summary.frames_read, 13);
        assert_eq!(summary.frames_written, 14);
    }

    #[test]
    fn threshold_relaxes_after_duplicate_target() {
        // Scores between the relaxed and strict threshold only match until the target is reached
        let oracle = |a: &GrayImage, b: &GrayImage| if a == b { 0.0 } else { 0.4 };
        let mut sink = Vec::new();
        let mut ctx = ProcessingContext::default();
        let proxies = [0u8, 1, 2, 3];
        let source = proxies.iter().enumerate().map(|(i, p)| SourceFrame {
            full: i,
            proxy: GrayImage::from_pixel(1, 1, Luma([*p])),
        });
        let summary = Respacer::new(&test_args(7, 2, 5), oracle)
            .run(&mut IterSource::new(source), &mut sink, &mut ctx)
            .unwrap();
        // 1 matches 0 under the strict threshold, 2 is new under the relaxed one, 3 matches 2 again
        assert_eq!(sink, [0, 0, 2, 2]);
        assert_eq!(summary.representatives, 2);
    }

    #[test]
    fn first_frame_has_no_priority() {
        let mut window = Window::new(4);
        let mut respacer = Respacer::new(&test_args(4, 2, 5), StdDevOracle);
        let mut ctx = ProcessingContext::default();
        let mut summary = RunSummary::default();
        let fill = respacer.fill(&mut window, &mut frames(&[5, 6, 6]), &mut ctx, &mut summary).unwrap();
        assert!(matches!(fill, Fill::Exhausted));
        assert_eq!(window.get(0).map(|r| r.priority), Some(0.0));
        assert!(window.get(1).is_some_and(|r| r.priority > 0.0 && r.count == 2));
    }

    #[test]
    fn pending_seed_starts_next_representative() {
        let mut window = Window::new(2);
        let mut respacer = Respacer::new(&test_args(2, 2, 5), StdDevOracle);
        let mut ctx = ProcessingContext::default();
        let mut summary = RunSummary::default();
        let mut source = frames(&[1, 2, 3, 3]);
        let Fill::Full { seed } = respacer.fill(&mut window, &mut source, &mut ctx, &mut summary).unwrap() else {
            panic!("window should be full");
        };
        assert_eq!(seed.full, (3, 2));
        assert_eq!(seed.count, 1);
        assert_eq!(window.len(), 2);

        window.rotate(seed);
        let fill = respacer.fill(&mut window, &mut source, &mut ctx, &mut summary).unwrap();
        assert!(matches!(fill, Fill::Exhausted));
        assert_eq!(window.tail().map(|r| (r.full, r.count)), Some(((3, 2), 2)));
    }

    struct CancelAfter<S> {
        inner: S,
        token: CancelToken,
        remaining: usize,
    }

    impl<S: FrameSource> FrameSource for CancelAfter<S> {
        type Frame = S::Frame;

        fn next_frame(&mut self) -> Result<Option<SourceFrame<S::Frame>>, Error> {
            if self.remaining == 0 {
                self.token.cancel();
            } else {
                self.remaining -= 1;
            }
            self.inner.next_frame()
        }
    }

    #[test]
    fn cancellation_drains_everything_read() {
        let input = runs(&[2; 40]);
        let mut ctx = ProcessingContext::default();
        let mut source = CancelAfter { inner: frames(&input), token: ctx.cancel.clone(), remaining: 10 };
        let mut sink = Vec::new();
        let summary = Respacer::new(&test_args(3, 2, 5), StdDevOracle)
            .run(&mut source, &mut sink, &mut ctx)
            .unwrap();

        assert!(summary.cancelled);
        assert!(summary.frames_read < input.len());
        assert_eq!(summary.frames_written, summary.frames_read);
        assert_eq!(contents(&sink), input[..sink.len()]);
        assert_eq!(ctx.counters.frames_written(), sink.len());
    }

    #[test]
    fn cancelled_before_start_writes_nothing() {
        let mut ctx = ProcessingContext::default();
        ctx.cancel.cancel();
        let mut sink = Vec::new();
        let summary = Respacer::new(&Args::default(), StdDevOracle)
            .run(&mut frames(&[1, 2, 3]), &mut sink, &mut ctx)
            .unwrap();
        assert!(sink.is_empty());
        assert!(summary.cancelled);
    }

    #[test]
    fn empty_source() {
        let (output, summary) = respace(&[], &Args::default());
        assert!(output.is_empty());
        assert_eq!((summary.frames_read, summary.frames_written, summary.representatives), (0, 0, 0));
        assert!(!summary.cancelled);
        assert_eq!(summary.args, Args::default());
    }

    #[test]
    fn random_streams_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let lengths: Vec<usize> = (0..rng.random_range(1..120))
                .map(|_| rng.random_range(1..=5))
                .collect();
            let input = runs(&lengths);
            let args = test_args(
                rng.random_range(1..=9),
                rng.random_range(1..=3),
                rng.random_range(1..=6),
            );
            let (output, summary) = respace(&input, &args);

            // Every representative is written in one contiguous block, at least once, in input order
            let mut blocks: Vec<(TestFrame, usize)> = Vec::new();
            for frame in &output {
                match blocks.last_mut() {
                    Some((last, n)) if last == frame => *n += 1,
                    _ => blocks.push((*frame, 1)),
                }
            }
            assert_eq!(blocks.len(), summary.representatives);
            assert_eq!(blocks.len(), lengths.len());
            assert!(blocks.windows(2).all(|w| (w[0].0).1 < (w[1].0).1));
            assert!(blocks.iter().all(|(_, n)| *n >= 1));

            assert_eq!(summary.frames_read, input.len());
            assert_eq!(summary.frames_written, output.len());
            assert_eq!(summary.frames_written + summary.trimmed, summary.frames_read + summary.padded);
        }
    }
}
