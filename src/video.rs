//! FFmpeg-backed frame source.

use std::path::Path;

use image::RgbImage;

use crate::error::{Error, Result};
use crate::scanner::{FrameSource, VideoInfo};

pub struct FfmpegSource {
    reader: ffmpeg_bus::VideoReader,
    info: VideoInfo,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        let open_error = |e: anyhow::Error| Error::VideoOpen {
            path: path.display().to_string(),
            reason: format!("{:#}", e),
        };
        ffmpeg_bus::init().map_err(open_error)?;
        let reader = ffmpeg_bus::VideoReader::open(path).map_err(open_error)?;

        let summary = reader.summary();
        Ok(Self {
            info: VideoInfo {
                total_frames: summary.total_frames,
                fps: summary.fps,
                width: summary.width,
                height: summary.height,
            },
            reader,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = match self.reader.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(e) => return Err(Error::VideoRead(1, format!("{:#}", e))),
        };
        let (width, height) = (frame.width, frame.height);
        RgbImage::from_raw(width, height, frame.data.to_vec())
            .map(Some)
            .ok_or_else(|| Error::VideoRead(1, format!("frame buffer does not match {}x{}", width, height)))
    }
}
