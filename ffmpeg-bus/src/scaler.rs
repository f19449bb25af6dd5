use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context, flag::Flags};

/// Converts decoded frames to packed RGB24 at their own size. The context is
/// rebuilt whenever the source format or size changes mid-stream.
pub struct Scaler {
    context: Option<Context>,
    source: (Pixel, u32, u32),
}

unsafe impl Send for Scaler {}

impl Default for Scaler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scaler {
    pub fn new() -> Self {
        Self {
            context: None,
            source: (Pixel::None, 0, 0),
        }
    }

    pub fn to_rgb(&mut self, frame: &ffmpeg_next::frame::Video) -> anyhow::Result<ffmpeg_next::frame::Video> {
        let source = (frame.format(), frame.width(), frame.height());
        if self.context.is_none() || self.source != source {
            self.context = Some(Context::get(
                source.0,
                source.1,
                source.2,
                Pixel::RGB24,
                source.1,
                source.2,
                Flags::BILINEAR,
            )?);
            self.source = source;
        }

        let mut converted = ffmpeg_next::frame::Video::empty();
        if let Some(context) = self.context.as_mut() {
            context.run(frame, &mut converted)?;
        }
        converted.set_pts(frame.pts());
        Ok(converted)
    }
}
