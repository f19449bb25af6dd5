use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// Tightly packed RGB24 picture (no row padding).
#[derive(Debug, Clone, Default)]
pub struct RgbFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub pts: Option<i64>,
}

impl RgbFrame {
    /// Copies plane 0 of an RGB24 frame, dropping the stride padding.
    pub fn from_rgb24(frame: &ffmpeg_next::frame::Video) -> anyhow::Result<Self> {
        if frame.format() != ffmpeg_next::format::Pixel::RGB24 {
            anyhow::bail!("expected rgb24, got {:?}", frame.format());
        }
        let width = frame.width();
        let height = frame.height();
        let row = width as usize * 3;
        let stride = frame.stride(0);
        let plane = frame.data(0);
        if stride < row || plane.len() < stride * height.saturating_sub(1) as usize + row {
            anyhow::bail!("rgb plane too small for {}x{}", width, height);
        }

        let mut data = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            data.extend_from_slice(&plane[y * stride..y * stride + row]);
        }
        Ok(Self {
            data: Bytes::from(data),
            width,
            height,
            pts: frame.pts(),
        })
    }
}

impl Display for RgbFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "RgbFrame data_len: {}, width: {}, height: {}, pts: {:?}",
            self.data.len(),
            self.width,
            self.height,
            self.pts
        )
    }
}
