//! Frame acquisition.
//!
//! `FrameSource` is the decoder capability (one frame per call, `None` at end
//! of stream). `FrameSampler` wraps a source and paces it to a fixed interval.

mod ffmpeg;
mod image_sequence;
mod sampler;

use std::path::Path;

use anyhow::{bail, Result};
use image::RgbImage;

pub use ffmpeg::{parse_dimensions, FfmpegSource};
pub use image_sequence::ImageSequenceSource;
pub use sampler::{FrameSampler, SampledFrame};

/// A decoded frame and its position in the source stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

pub trait FrameSource: Send {
    /// Decodes the next frame, or returns `None` once the stream is exhausted.
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;
}

pub trait SourceOpener: Send + Sync {
    fn open(&self, locator: &str) -> Result<Box<dyn FrameSource>>;
}

/// Opens directories as image sequences and everything else through ffmpeg.
#[derive(Debug, Clone)]
pub struct DefaultSourceOpener {
    ffmpeg_cmd: String,
    ffprobe_cmd: String,
}

impl DefaultSourceOpener {
    pub fn new(ffmpeg_cmd: impl Into<String>, ffprobe_cmd: impl Into<String>) -> Self {
        Self {
            ffmpeg_cmd: ffmpeg_cmd.into(),
            ffprobe_cmd: ffprobe_cmd.into(),
        }
    }
}

impl Default for DefaultSourceOpener {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl SourceOpener for DefaultSourceOpener {
    fn open(&self, locator: &str) -> Result<Box<dyn FrameSource>> {
        let path = Path::new(locator);
        if !path.exists() {
            bail!("{} does not exist", path.display());
        }

        if path.is_dir() {
            Ok(Box::new(ImageSequenceSource::open(path)?))
        } else {
            Ok(Box::new(FfmpegSource::open(
                path,
                &self.ffmpeg_cmd,
                &self.ffprobe_cmd,
            )?))
        }
    }
}
