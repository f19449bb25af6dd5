//! Samples video frames and collects every unique barcode text they show.

use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use indexmap::IndexSet;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::codec::BarcodeDecoder;
use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::preprocess::Preprocessor;

/// Below this, barcodes are rarely readable.
const MIN_WIDTH: u32 = 320;
const MIN_HEIGHT: u32 = 240;

/// Frames up to this index are always dumped when a debug dir is set.
const DEBUG_HEAD_FRAMES: u64 = 10;
const DEBUG_EVERY: u64 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct VideoInfo {
    /// `None` when the container does not say.
    pub total_frames: Option<u64>,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl Display for VideoInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.total_frames {
            Some(total) => write!(f, "{} frames", total)?,
            None => write!(f, "unknown frame count")?,
        }
        write!(f, ", {:.2} fps, {}x{}", self.fps, self.width, self.height)
    }
}

/// A sequential, already-opened source of RGB frames. Dropping it releases
/// the underlying video resource.
pub trait FrameSource {
    fn info(&self) -> VideoInfo;

    /// `Ok(None)` once the stream is exhausted. An error covers one failed
    /// read; the scanner may call again.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// `Opened -> Scanning -> {Completed | Failed}`, published through
/// `VideoScanner::subscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Opened,
    Scanning,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanReport {
    /// Unique texts in first-seen order.
    pub texts: Vec<String>,
    pub frames_read: u64,
    pub frames_sampled: u64,
}

#[derive(Clone)]
pub struct VideoScanner {
    decoder: Arc<dyn BarcodeDecoder>,
    config: ScanConfig,
    preprocessor: Preprocessor,
    cancel: CancellationToken,
    state: Arc<watch::Sender<ScanState>>,
}

impl VideoScanner {
    pub fn new(decoder: Arc<dyn BarcodeDecoder>, config: ScanConfig) -> Self {
        let (state, _) = watch::channel(ScanState::Opened);
        Self {
            preprocessor: Preprocessor::from_config(&config),
            decoder,
            config,
            cancel: CancellationToken::new(),
            state: Arc::new(state),
        }
    }

    /// Follows the state of this scanner's scans, clones included.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ScanState) {
        let previous = self.state.send_replace(state);
        log::debug!("scan state {:?} -> {:?}", previous, state);
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn scan<S: FrameSource>(&self, source: S) -> Result<Vec<String>> {
        self.scan_with_report(source).map(|report| report.texts)
    }

    pub fn scan_with_report<S: FrameSource>(&self, source: S) -> Result<ScanReport> {
        self.set_state(ScanState::Opened);
        let result = self.run(source);
        self.set_state(match result {
            Ok(_) => ScanState::Completed,
            Err(_) => ScanState::Failed,
        });
        result
    }

    /// Marks a scan that failed before its source could be opened.
    pub fn fail(&self) {
        self.set_state(ScanState::Failed);
    }

    fn run<S: FrameSource>(&self, mut source: S) -> Result<ScanReport> {
        let info = source.info();
        log::info!("scanning video: {}", info);
        if info.width < MIN_WIDTH || info.height < MIN_HEIGHT {
            log::warn!(
                "resolution {}x{} is below {}x{}, barcodes may not decode",
                info.width,
                info.height,
                MIN_WIDTH,
                MIN_HEIGHT
            );
        }

        let interval = self.config.sampling_interval.max(1);
        let budget = self.config.budget();
        let started = Instant::now();
        self.set_state(ScanState::Scanning);

        let mut seen: IndexSet<String> = IndexSet::new();
        let mut frame_index = 0u64;
        let mut sampled = 0u64;
        let mut read_errors = 0usize;

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => {
                    read_errors = 0;
                    frame
                }
                Ok(None) => break,
                Err(e) => {
                    read_errors += 1;
                    if read_errors > self.config.max_read_errors {
                        return Err(Error::VideoRead(read_errors, e.to_string()));
                    }
                    log::warn!("frame read failed after frame {}: {}", frame_index, e);
                    continue;
                }
            };
            frame_index += 1;

            if self.config.progress_every > 0 && frame_index % self.config.progress_every == 0 {
                self.log_progress(&info, frame_index, seen.len());
            }
            if frame_index % interval != 0 {
                continue;
            }

            if self.cancel.is_cancelled() {
                log::info!("scan cancelled at frame {}", frame_index);
                return Err(Error::Cancelled);
            }
            if let Some(budget) = budget {
                if started.elapsed() >= budget {
                    log::warn!("scan budget of {:?} exhausted at frame {}", budget, frame_index);
                    return Err(Error::Timeout(budget));
                }
            }

            sampled += 1;
            self.dump_debug(frame_index, &frame);
            self.decode_frame(frame_index, &frame, &mut seen);
        }

        log::info!(
            "scan complete: {} frames read, {} sampled, {} unique barcodes in {:.1}s",
            frame_index,
            sampled,
            seen.len(),
            started.elapsed().as_secs_f64()
        );
        if seen.is_empty() {
            log::warn!("no barcodes found in the video");
        }

        Ok(ScanReport {
            texts: seen.into_iter().collect(),
            frames_read: frame_index,
            frames_sampled: sampled,
        })
    }

    fn decode_frame(&self, frame_index: u64, frame: &RgbImage, seen: &mut IndexSet<String>) {
        for variant in &self.config.variants {
            let image = self.preprocessor.apply(*variant, frame);
            match self.decoder.decode(&image) {
                Ok(texts) => {
                    for text in texts {
                        if seen.contains(&text) {
                            continue;
                        }
                        log::info!(
                            "frame {} ({}): new barcode #{}, {} chars",
                            frame_index,
                            variant.as_str(),
                            seen.len() + 1,
                            text.len()
                        );
                        seen.insert(text);
                    }
                }
                Err(e) => {
                    log::warn!(
                        "frame {} ({}): decode failed: {}",
                        frame_index,
                        variant.as_str(),
                        e
                    )
                }
            }
        }
    }

    fn log_progress(&self, info: &VideoInfo, frame_index: u64, unique: usize) {
        match info.total_frames.filter(|t| *t > 0) {
            Some(total) => log::info!(
                "progress {:.1}% ({}/{} frames), {} unique barcodes",
                frame_index as f64 * 100.0 / total as f64,
                frame_index,
                total,
                unique
            ),
            None => log::info!("progress: {} frames, {} unique barcodes", frame_index, unique),
        }
    }

    fn dump_debug(&self, frame_index: u64, frame: &RgbImage) {
        let Some(dir) = &self.config.debug_dir else {
            return;
        };
        if frame_index > DEBUG_HEAD_FRAMES && frame_index % DEBUG_EVERY != 0 {
            return;
        }
        let path = dir.join(format!("frame_{:06}.jpg", frame_index));
        if let Err(e) = write_jpeg(&path, frame) {
            log::warn!("cannot write debug frame {}: {}", path.display(), e);
        }
    }
}

fn write_jpeg(path: &Path, frame: &RgbImage) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let width = u16::try_from(frame.width())?;
    let height = u16::try_from(frame.height())?;
    let encoder = jpeg_encoder::Encoder::new_file(path, 85)?;
    encoder.encode(frame.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)?;
    Ok(())
}

#[cfg(test)]
#[path = "scanner_test.rs"]
mod scanner_test;
