//! Blocking, pull-based frame reader: demux, decode and convert to RGB24
//! one frame at a time on the caller's thread.

use std::path::Path;

use crate::decoder::Decoder;
use crate::frame::RgbFrame;
use crate::input::AvInput;
use crate::metadata::VideoSummary;
use crate::scaler::Scaler;

pub struct VideoReader {
    input: AvInput,
    decoder: Decoder,
    scaler: Scaler,
    summary: VideoSummary,
    eof_sent: bool,
    frames_out: u64,
}

impl VideoReader {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let input = AvInput::new(path)?;
        let stream = input.best_video_stream()?;
        let decoder = Decoder::new(&stream)?;
        let summary = VideoSummary::from_stream(&stream);
        log::debug!(
            "opened {}: video stream {} ({})",
            path.display(),
            stream.index(),
            summary
        );

        Ok(Self {
            input,
            decoder,
            scaler: Scaler::new(),
            summary,
            eof_sent: false,
            frames_out: 0,
        })
    }

    pub fn summary(&self) -> VideoSummary {
        self.summary
    }

    pub fn frames_out(&self) -> u64 {
        self.frames_out
    }

    /// Next decoded frame in RGB24, `Ok(None)` once the stream is drained.
    /// A packet the decoder rejects is returned as an error; the next call
    /// continues with the following packet.
    pub fn next_frame(&mut self) -> anyhow::Result<Option<RgbFrame>> {
        loop {
            if let Some(frame) = self.decoder.receive_frame()? {
                let rgb = self.scaler.to_rgb(&frame)?;
                self.frames_out += 1;
                return RgbFrame::from_rgb24(&rgb).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            match self.input.read_packet() {
                Some((index, mut packet)) => {
                    if index != self.decoder.stream_index() {
                        continue;
                    }
                    self.decoder.send_packet(&mut packet)?;
                }
                None => {
                    log::debug!("end of input after {} frames", self.frames_out);
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

impl Iterator for VideoReader {
    type Item = anyhow::Result<RgbFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

#[cfg(test)]
#[path = "reader_test.rs"]
mod reader_test;
