#![allow(dead_code)]

/// Registers FFmpeg components. Call once before opening any input.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod decoder;
pub mod frame;
pub mod input;
pub mod metadata;
pub mod reader;
pub mod scaler;
pub mod stream;

pub use frame::RgbFrame;
pub use metadata::{VideoSummary, probe_video};
pub use reader::VideoReader;
