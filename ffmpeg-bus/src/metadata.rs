//! Video file metadata used to size progress reports.

use std::fmt;
use std::path::Path;

use crate::input::AvInput;
use crate::stream::AvStream;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoSummary {
    /// Declared or estimated; `None` if the container gives neither.
    pub total_frames: Option<u64>,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub duration_sec: Option<f64>,
}

impl VideoSummary {
    pub fn from_stream(stream: &AvStream) -> Self {
        Self {
            total_frames: stream.frame_count(),
            fps: stream.fps(),
            width: stream.width(),
            height: stream.height(),
            duration_sec: stream.duration_sec(),
        }
    }
}

impl fmt::Display for VideoSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {:.2} fps", self.width, self.height, self.fps)?;
        match self.total_frames {
            Some(n) => write!(f, ", {} frames", n)?,
            None => write!(f, ", frame count unknown")?,
        }
        if let Some(d) = self.duration_sec {
            write!(f, ", {:.3}s", d)?;
        }
        Ok(())
    }
}

/// Opens `path` and summarises its best video stream.
pub fn probe_video(path: &Path) -> anyhow::Result<VideoSummary> {
    let input = AvInput::new(path)?;
    let stream = input.best_video_stream()?;
    Ok(VideoSummary::from_stream(&stream))
}
