use std::collections::HashMap;
use std::path::Path;

use crate::stream::AvStream;

/// A demuxed media file.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    streams: HashMap<usize, AvStream>,
}

unsafe impl Send for AvInput {}

impl AvInput {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let input = ffmpeg_next::format::input(path)
            .map_err(|e| anyhow::anyhow!("open {}: {}", path.display(), e))?;

        let mut streams = HashMap::new();
        for stream in input.streams() {
            streams.insert(stream.index(), AvStream::from(stream));
        }

        Ok(Self {
            inner: input,
            streams,
        })
    }

    /// The stream FFmpeg ranks best among the video streams.
    pub fn best_video_stream(&self) -> anyhow::Result<AvStream> {
        let best = self
            .inner
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("no video stream"))?;
        self.streams
            .get(&best.index())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("video stream {} not indexed", best.index()))
    }

    /// Next packet with its stream index, `None` at end of file.
    pub fn read_packet(&mut self) -> Option<(usize, ffmpeg_next::Packet)> {
        self.inner
            .packets()
            .next()
            .map(|(stream, packet)| (stream.index(), packet))
    }
}
