use log::warn;
use crate::Args;

#[derive(Debug, Clone, Copy)]
enum Setting {
    BufferSize,
    ComparisonScale,
    AdjustmentBound,
    DuplicateCount,
    ThresholdStrict,
    ThresholdRelaxed,
}

impl Setting {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim_start_matches('-') {
            "buffer_size" => Some(Setting::BufferSize),
            "comparison_scale" => Some(Setting::ComparisonScale),
            "adjustment_bound" => Some(Setting::AdjustmentBound),
            "duplicate_count" => Some(Setting::DuplicateCount),
            "threshold_strict" => Some(Setting::ThresholdStrict),
            "threshold_relaxed" => Some(Setting::ThresholdRelaxed),
            _ => None,
        }
    }
}

/// Usage lines for the trailing option pairs, shown in the `--help` output
pub const OPTIONS_HELP: &str = "\
Options are given as trailing `-name value` pairs:
  -buffer_size <integer>        distinct frames considered when adjusting (default 7)
  -comparison_scale <integer>   factor by which frames are reduced for matching (default 4, disable with 1)
  -adjustment_bound <integer>   bounds the adjustment distance to keep audio synced (default 5)
  -duplicate_count <integer>    times a frame should repeat to avoid being lost (default 2)
  -threshold_strict <float>     standard deviation threshold when matching frames (default 0.5)
  -threshold_relaxed <float>    relaxed threshold (default strict/2, disable with equal to strict)";

/// Builds [Args] from `-name value` pairs.
///
/// Never fails: invalid values keep their default and unknown names are skipped, both with a warning.
pub fn parse_options<I, S>(options: I) -> Args
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = Args::default();
    let mut relaxed = None;
    let mut options = options.into_iter();

    while let Some(name) = options.next() {
        let name = name.as_ref();
        let Some(value) = options.next() else {
            warn!("Option {} has no value, ignoring", name);
            break;
        };
        let Some(setting) = Setting::from_name(name) else {
            warn!("Unrecognized option {}, ignoring", name);
            continue;
        };
        let Some(value) = parse_positive(value.as_ref()) else {
            warn!("All options must be positive values, using default value for {}", name);
            continue;
        };

        match setting {
            Setting::BufferSize => set_integer(&mut args.buffer_size, value, name),
            Setting::ComparisonScale => {
                let mut scale = args.comparison_scale as usize;
                set_integer(&mut scale, value, name);
                args.comparison_scale = u32::try_from(scale).unwrap_or(u32::MAX);
            }
            Setting::AdjustmentBound => set_integer(&mut args.adjustment_bound, value, name),
            Setting::DuplicateCount => set_integer(&mut args.duplicate_count, value, name),
            Setting::ThresholdStrict => args.threshold_strict = value,
            Setting::ThresholdRelaxed => relaxed = Some(value),
        }
    }

    args.threshold_relaxed = relaxed.unwrap_or(args.threshold_strict / 2.0);
    args
}

fn parse_positive(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

// Integer options truncate like a C cast, so "0.5" is not positive
fn set_integer(target: &mut usize, value: f64, name: &str) {
    let truncated = value.trunc();
    if truncated < 1.0 {
        warn!("All options must be positive values, using default value for {}", name);
        return;
    }
    *target = truncated.min(usize::MAX as f64) as usize;
}
