use serde::Serialize;

pub mod compare;
pub mod config;
pub mod error;
pub mod progress;
pub mod respace;
pub mod sink;
pub mod source;
pub mod utils;

pub use error::Error;


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Args {
    /// Number of distinct (representative) frames held in the adjustment window
    /// Range: 1.. (higher = more lookahead for reallocating duplicates)
    pub buffer_size: usize,
    /// Divisor applied to both frame dimensions to build the comparison proxy
    /// Range: 1.. (1 = compare at full resolution)
    pub comparison_scale: u32,
    /// Allowed distance between written and read frames before counts get corrected
    /// Keeps audio in sync with the re-timed video
    /// Range: 1..
    pub adjustment_bound: usize,
    /// Number of times each distinct frame should be written so downsampling does not lose it
    /// Range: 1.. (2 = 60fps -> 30fps)
    pub duplicate_count: usize,
    /// Standard deviation of the proxy difference below which a frame repeats the previous one
    /// Used for frames that just started a new representative
    /// Range: 0.0..
    pub threshold_strict: f64,
    /// Lower threshold used once the current representative reached `duplicate_count`,
    /// so smaller changes already start a new representative
    /// Range: 0.0.. (equal to `threshold_strict` disables relaxing)
    pub threshold_relaxed: f64,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            buffer_size: 7,
            comparison_scale: 4,
            adjustment_bound: 5,
            duplicate_count: 2,
            threshold_strict: 0.5,
            threshold_relaxed: 0.25,
        }
    }
}

pub const VIDEO_DECODE_ARGS: [&str; 5] = [
    "-f", "rawvideo",
    "-pix_fmt", "rgb24",
    "-"
];
