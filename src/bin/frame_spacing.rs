use std::path::{Path, PathBuf};
use std::sync::Arc;
use clap::{CommandFactory, FromArgMatches, Parser};
use fern::Dispatch;
use log::{error, info, warn};
use mimalloc::MiMalloc;
use frame_spacing::compare::StdDevOracle;
use frame_spacing::progress::{Counters, ProgressReporter, REPORT_INTERVAL};
use frame_spacing::respace::{CancelToken, ProcessingContext, Respacer, RunSummary};
use frame_spacing::sink::{FfmpegSink, RenderArgs};
use frame_spacing::source::FfmpegSource;
use frame_spacing::utils::{self, VideoParams};
use frame_spacing::{config, Args, Error};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;


/// Re-times recordings with uneven frame pacing so every distinct frame is shown equally long.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None, after_help = config::OPTIONS_HELP)]
struct Cli {
    /// The input video file path
    input_path: PathBuf,
    /// The output video file path
    output_path: PathBuf,

    /// Space seperated output args passed to ffmpeg
    /// Defaults to the codec and pixel format of the input
    #[arg(short, long, verbatim_doc_comment)]
    render_args: Option<String>,
    /// Write a JSON summary of the run to this path
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Werther to enable debug logging
    #[arg(short, long, action)]
    verbose: bool,

    /// Processing options as `-name value` pairs
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    options: Vec<String>,
}

fn setup_logging(verbose: bool) {
    let result = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(if verbose {log::LevelFilter::Debug} else {log::LevelFilter::Info})
        .chain(std::io::stdout())
        .apply();
    if let Err(e) = result {
        eprintln!("Error: could not set up logging: {e}");
    }
}

fn report_start(cli_args: &Cli, args: &Args, params: &VideoParams) {
    info!("Processing: \"{}\" to \"{}\"", cli_args.input_path.display(), cli_args.output_path.display());
    let length = params.duration
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "unknown".to_string());
    let frames = params.total_frames()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("Length: {length}, frames: {frames}, fps: {:.3} ({})", params.framerate, params.framerate_raw);
    info!("Dimensions: {}x{}, codec: {}, pixel format: {}", params.width, params.height, params.codec, params.pix_fmt);
    info!(
        "Settings: buffer_size={} comparison_scale={} adjustment_bound={} duplicate_count={} threshold_strict={} threshold_relaxed={}",
        args.buffer_size, args.comparison_scale, args.adjustment_bound,
        args.duplicate_count, args.threshold_strict, args.threshold_relaxed
    );
}

fn report_summary(summary: &RunSummary) {
    info!(
        "Wrote {} frames from {} read ({} distinct), donated {}, trimmed {}, padded {}, final drift {}",
        summary.frames_written, summary.frames_read, summary.representatives,
        summary.donated, summary.trimmed, summary.padded, summary.final_drift
    );
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(summary).map_err(std::io::Error::from)?;
    std::fs::write(path, json)?;
    info!("Summary written to \"{}\"", path.display());
    Ok(())
}

fn run(cli_args: &Cli, args: &Args) -> Result<RunSummary, Error> {
    if cli_args.input_path == cli_args.output_path {
        return Err(Error::Usage("input and output must be different files".to_string()));
    }
    let params = utils::get_video_params(&cli_args.input_path)?;
    report_start(cli_args, args, &params);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Could not install interrupt handler: {e}");
    }

    let mut source = FfmpegSource::open(&cli_args.input_path, args.comparison_scale)?;
    let render_args = cli_args.render_args.as_deref()
        .map(|render_args| RenderArgs::new(render_args.split(' ')))
        .unwrap_or_default();
    let sink = FfmpegSink::start(&cli_args.output_path, &params, &render_args)?;

    let counters = Arc::new(Counters::default());
    let reporter = ProgressReporter::start(counters.clone(), params.framerate, params.total_frames(), REPORT_INTERVAL);
    let mut ctx = ProcessingContext::new(counters, cancel);
    let summary = sink.finish_after(|sink| {
        let result = Respacer::new(args, StdDevOracle).run(&mut source, sink, &mut ctx);
        reporter.stop();
        result
    })?;
    report_summary(&summary);
    if let Some(path) = &cli_args.summary {
        write_summary(path, &summary)?;
    }
    Ok(summary)
}

fn main() {
    let full_template = "\
{before-help}{name} v{version} by {author}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}";
    let cli_args = Cli::command()
        .help_template(full_template)
        .try_get_matches()
        .and_then(|mut matches| Cli::from_arg_matches_mut(&mut matches));
    let cli_args = match cli_args {
        Ok(cli_args) => cli_args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };
    setup_logging(cli_args.verbose);
    let args = config::parse_options(&cli_args.options);

    match run(&cli_args, &args) {
        Ok(summary) if summary.cancelled => {
            info!("Stopped early after {:.2}s", summary.elapsed_secs);
            std::process::exit(1);
        }
        Ok(summary) => info!("Finished in {:.2}s", summary.elapsed_secs),
        Err(e) => {
            error!("{e}");
            std::process::exit(e.exit_code());
        }
    }
}
