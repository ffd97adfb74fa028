use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use image::RgbImage;
use log::debug;
use crate::utils::{own_process_group, VideoParams};
use crate::Error;

/// Append only, order preserving output. Called once per emitted copy.
pub trait FrameSink<F> {
    fn write_frame(&mut self, frame: &F) -> Result<(), Error>;
}

impl<F: Clone> FrameSink<F> for Vec<F> {
    fn write_frame(&mut self, frame: &F) -> Result<(), Error> {
        self.push(frame.clone());
        Ok(())
    }
}

/// Encoder arguments for a run. Defaults to re-encoding with the source codec and pixel format.
#[derive(Debug, Clone, Default)]
pub struct RenderArgs {
    output_args: Option<Vec<String>>,
}

impl RenderArgs {
    pub fn new<S: ToString>(output_args: impl IntoIterator<Item = S>) -> Self {
        let output_args: Vec<String> = output_args.into_iter()
            .map(|arg| arg.to_string())
            .filter(|arg| !arg.is_empty())
            .collect();
        Self {
            output_args: if output_args.is_empty() { None } else { Some(output_args) },
        }
    }

    fn to_args(&self, params: &VideoParams) -> Vec<String> {
        match &self.output_args {
            Some(args) => args.clone(),
            None => vec![
                "-c:v".to_string(), params.codec.clone(),
                "-pix_fmt".to_string(), params.pix_fmt.clone(),
            ],
        }
    }
}

/// Pipes rgb24 frames into an ffmpeg encoder
pub struct FfmpegSink {
    child: Child,
    stdin: BufWriter<ChildStdin>,
}

impl FfmpegSink {
    pub fn start(output_path: impl AsRef<Path>, params: &VideoParams, render_args: &RenderArgs) -> Result<Self, Error> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y");
        cmd.arg("-loglevel").arg("error");
        cmd.arg("-f").arg("rawvideo");
        cmd.arg("-framerate").arg(&params.framerate_raw);
        cmd.arg("-pixel_format").arg("rgb24");
        cmd.arg("-video_size").arg(format!("{}x{}", params.width, params.height));
        cmd.arg("-i").arg("-");
        cmd.args(render_args.to_args(params));
        cmd.arg(output_path.as_ref());
        debug!("Running: {:?}", cmd);
        Self::spawn(cmd)
    }

    fn spawn(mut cmd: Command) -> Result<Self, Error> {
        own_process_group(&mut cmd).stdin(Stdio::piped());
        let mut child = cmd.spawn()
            .map_err(|e| Error::Encoder(format!("ffmpeg could not be started: {}", e)))?;
        let stdin = child.stdin.take()
            .ok_or_else(|| Error::Encoder("ffmpeg stdin is not piped".to_string()))?;
        Ok(Self { child, stdin: BufWriter::new(stdin) })
    }

    /// Runs `write` and closes the encoder afterwards, also when `write` failed.
    /// An error from `write` is returned over one from closing.
    pub fn finish_after<T>(mut self, write: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        let result = write(&mut self);
        let finished = self.finish();
        match result {
            Ok(value) => finished.map(|()| value),
            Err(e) => {
                if let Err(finish_error) = finished {
                    debug!("Encoder closed after failed run: {}", finish_error);
                }
                Err(e)
            }
        }
    }

    /// Flushes the remaining frames and waits for the encoder to exit
    pub fn finish(self) -> Result<(), Error> {
        let Self { mut child, stdin } = self;
        // Closing stdin ends the encoder's input, it has to be dropped before waiting
        let flushed = stdin.into_inner()
            .map(drop)
            .map_err(|e| Error::Sink(e.into_error()));
        let status = child.wait()?;
        flushed?;
        debug!("ffmpeg exited with: {}", status);
        if !status.success() {
            return Err(Error::Encoder(status.to_string()));
        }
        Ok(())
    }
}

impl FrameSink<RgbImage> for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), Error> {
        self.stdin.write_all(frame.as_raw())?;
        Ok(())
    }
}
