use std::path::Path;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::OutputVideoFrame;
use image::{GrayImage, RgbImage};
use crate::compare::build_proxy;
use crate::utils::own_process_group;
use crate::{Error, VIDEO_DECODE_ARGS};

/// A decoded frame together with its comparison proxy
pub struct SourceFrame<F> {
    pub full: F,
    pub proxy: GrayImage,
}

/// Forward only, read once sequence of frames. `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    type Frame;

    fn next_frame(&mut self) -> Result<Option<SourceFrame<Self::Frame>>, Error>;
}

/// Adapts any iterator of frames, mostly useful for tests and in-memory pipelines
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I> {
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<F, I> FrameSource for IterSource<I>
where
    I: Iterator<Item = SourceFrame<F>>,
{
    type Frame = F;

    fn next_frame(&mut self) -> Result<Option<SourceFrame<F>>, Error> {
        Ok(self.iter.next())
    }
}

/// Decodes a video with ffmpeg into rgb24 frames
pub struct FfmpegSource {
    frames: Box<dyn Iterator<Item = OutputVideoFrame>>,
    comparison_scale: u32,
    /// Size of the first frame, every later frame has to match it
    dimensions: Option<(u32, u32)>,
}

impl FfmpegSource {
    pub fn open(input_path: impl AsRef<Path>, comparison_scale: u32) -> Result<Self, Error> {
        let input_path = input_path.as_ref();
        let open_error = |reason: String| Error::SourceOpen { path: input_path.to_path_buf(), reason };

        let mut command = FfmpegCommand::new();
        command.input(input_path.display().to_string());
        command.args(VIDEO_DECODE_ARGS);
        own_process_group(command.as_inner_mut());
        let frames = command
            .spawn().map_err(|e| open_error(format!("ffmpeg should spawn: {}", e)))?
            .iter().map_err(|e| open_error(e.to_string()))?
            .filter_frames();

        Ok(Self {
            frames: Box::new(frames),
            comparison_scale,
            dimensions: None,
        })
    }
}

/// Proxies are only comparable at one size, so a stream changing resolution can not be processed
fn check_dimensions(expected: &mut Option<(u32, u32)>, width: u32, height: u32, frame_num: u32) -> Result<(), Error> {
    let (expected_width, expected_height) = *expected.get_or_insert((width, height));
    if (expected_width, expected_height) != (width, height) {
        return Err(Error::Decode(format!(
            "frame #{} is {}x{}, expected {}x{}",
            frame_num, width, height, expected_width, expected_height
        )));
    }
    Ok(())
}

fn frame_to_image(width: u32, height: u32, data: Vec<u8>, frame_num: u32) -> Result<RgbImage, Error> {
    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| Error::Decode(format!("frame #{} is truncated", frame_num)))
}

impl FrameSource for FfmpegSource {
    type Frame = RgbImage;

    fn next_frame(&mut self) -> Result<Option<SourceFrame<RgbImage>>, Error> {
        let Some(frame) = self.frames.next() else { return Ok(None) };
        check_dimensions(&mut self.dimensions, frame.width, frame.height, frame.frame_num)?;
        let proxy = build_proxy(&frame.data, frame.width, frame.height, self.comparison_scale)?;
        let full = frame_to_image(frame.width, frame.height, frame.data, frame.frame_num)?;
        Ok(Some(SourceFrame { full, proxy }))
    }
}
