use std::path::Path;
use std::process::Command;
use std::time::Duration;
use crate::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoParams {
    pub framerate: f64,
    /// Frame rate as reported by ffprobe (e.g. "60000/1001"), passed on to the encoder unchanged
    pub framerate_raw: String,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub frame_count: Option<usize>,
    pub duration: Option<Duration>,
}

impl VideoParams {
    /// Reported frame count, or an estimate from duration and frame rate
    pub fn total_frames(&self) -> Option<usize> {
        self.frame_count.or_else(|| {
            self.duration.map(|d| (d.as_secs_f64() * self.framerate).round() as usize)
        })
    }
}

pub fn get_video_params(file_path: impl AsRef<Path>) -> Result<VideoParams, Error> {
    let file_path = file_path.as_ref();
    let source_error = |reason: String| Error::SourceOpen { path: file_path.to_path_buf(), reason };
    if !file_path.is_file() {
        return Err(source_error("file does not exist".to_string()));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate,codec_name,pix_fmt,nb_frames",
            "-show_entries", "format=duration",
            "-of", "default=noprint_wrappers=1:nokey=0",
        ])
        .arg(file_path)
        .output()
        .map_err(|e| source_error(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(source_error(stderr.trim().to_string()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&stdout).map_err(|e| source_error(e.to_string()))
}

/// Moves a child into its own process group, so a terminal interrupt only reaches this process.
/// The encoder then stays alive while buffered frames are drained.
pub fn own_process_group(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd
}

fn parse_probe_output(stdout: &str) -> Result<VideoParams, Error> {
    let mut width = None;
    let mut height = None;
    let mut framerate = None;
    let mut codec = None;
    let mut pix_fmt = None;
    let mut frame_count = None;
    let mut duration = None;

    let invalid = |key: &str, val: &str| Error::Probe(format!("invalid {} \"{}\"", key, val));

    for line in stdout.lines() {
        let Some((key, val)) = line.trim().split_once('=') else { continue };
        match key {
            "width" => width = Some(val.parse::<u32>().map_err(|_| invalid(key, val))?),
            "height" => height = Some(val.parse::<u32>().map_err(|_| invalid(key, val))?),
            "r_frame_rate" => {
                let (num, den) = val.split_once('/').unwrap_or((val, "1"));
                let num: f64 = num.parse().map_err(|_| invalid(key, val))?;
                let den: f64 = den.parse().map_err(|_| invalid(key, val))?;
                let fps = if den != 0.0 { num / den } else { 0.0 };
                framerate = Some((fps, val.to_string()));
            }
            "codec_name" => codec = Some(val.to_string()),
            "pix_fmt" => pix_fmt = Some(val.to_string()),
            // Containers without an index report N/A
            "nb_frames" => frame_count = val.parse::<usize>().ok(),
            "duration" => duration = val.parse::<f64>().ok()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64),
            _ => {}
        }
    }

    let missing = |key: &str| Error::Probe(format!("missing {}", key));
    let (framerate, framerate_raw) = framerate.ok_or_else(|| missing("frame rate"))?;
    if framerate <= 0.0 {
        return Err(Error::Probe(format!("unusable frame rate {}", framerate_raw)));
    }
    Ok(VideoParams {
        width: width.ok_or_else(|| missing("width"))?,
        height: height.ok_or_else(|| missing("height"))?,
        framerate,
        framerate_raw,
        codec: codec.ok_or_else(|| missing("codec"))?,
        pix_fmt: pix_fmt.unwrap_or_else(|| "yuv420p".to_string()),
        frame_count,
        duration,
    })
}
