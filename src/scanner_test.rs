use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, Rgb, RgbImage};
use tokio_util::sync::CancellationToken;

use super::{FrameSource, ScanState, VideoInfo, VideoScanner};
use crate::codec::{BarcodeDecoder, QrCodec};
use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::preprocess::Variant;

/// Frames tagged by the red value of their top-left pixel.
struct TaggedFrames {
    frames: VecDeque<Result<Option<RgbImage>>>,
}

impl TaggedFrames {
    fn new(tags: &[u8]) -> Self {
        Self {
            frames: tags.iter().map(|t| Ok(Some(tagged(*t)))).collect(),
        }
    }
}

fn tagged(tag: u8) -> RgbImage {
    RgbImage::from_pixel(4, 4, Rgb([tag, 0, 0]))
}

impl FrameSource for TaggedFrames {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            total_frames: Some(self.frames.len() as u64),
            fps: 10.0,
            width: 4,
            height: 4,
        }
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        self.frames.pop_front().unwrap_or(Ok(None))
    }
}

/// Tag 0 shows nothing, tag 255 fails to decode, any other tag `n` shows
/// the text `chunk-n`.
#[derive(Default)]
struct TagDecoder {
    calls: AtomicUsize,
}

impl BarcodeDecoder for TagDecoder {
    fn decode(&self, image: &DynamicImage) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match image.to_rgb8().get_pixel(0, 0).0[0] {
            0 => Ok(vec![]),
            255 => Err(Error::Codec("unreadable".into())),
            n => Ok(vec![format!("chunk-{}", n)]),
        }
    }
}

fn raw_only(interval: u64) -> ScanConfig {
    ScanConfig {
        sampling_interval: interval,
        variants: vec![Variant::Raw],
        ..ScanConfig::default()
    }
}

#[test]
fn test_repeated_text_reported_once_at_first_position() -> anyhow::Result<()> {
    // "chunk-7" appears in frames 1, 5 and 9
    let source = TaggedFrames::new(&[7, 0, 3, 0, 7, 0, 0, 4, 7, 0]);
    let scanner = VideoScanner::new(Arc::new(TagDecoder::default()), raw_only(1));
    let report = scanner.scan_with_report(source)?;

    assert_eq!(report.texts, vec!["chunk-7", "chunk-3", "chunk-4"]);
    assert_eq!(report.frames_read, 10);
    assert_eq!(report.frames_sampled, 10);
    assert_eq!(*scanner.subscribe().borrow(), ScanState::Completed);
    Ok(())
}

#[test]
fn test_sampling_interval_skips_frames() -> anyhow::Result<()> {
    let decoder = Arc::new(TagDecoder::default());
    let source = TaggedFrames::new(&[1, 2, 3, 4, 5, 6, 7]);
    let report = VideoScanner::new(decoder.clone(), raw_only(2)).scan_with_report(source)?;

    // 1-based frame index, every second frame
    assert_eq!(report.texts, vec!["chunk-2", "chunk-4", "chunk-6"]);
    assert_eq!(report.frames_sampled, 3);
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn test_every_variant_is_tried() -> anyhow::Result<()> {
    let decoder = Arc::new(TagDecoder::default());
    let config = ScanConfig {
        sampling_interval: 1,
        ..ScanConfig::default()
    };
    VideoScanner::new(decoder.clone(), config).scan(TaggedFrames::new(&[0, 0, 0]))?;
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 3 * Variant::ALL.len());
    Ok(())
}

#[test]
fn test_decode_failures_do_not_stop_the_scan() -> anyhow::Result<()> {
    let source = TaggedFrames::new(&[255, 9, 255, 255, 8]);
    let texts = VideoScanner::new(Arc::new(TagDecoder::default()), raw_only(1)).scan(source)?;
    assert_eq!(texts, vec!["chunk-9", "chunk-8"]);
    Ok(())
}

#[test]
fn test_empty_video_is_not_an_error() -> anyhow::Result<()> {
    let texts = VideoScanner::new(Arc::new(TagDecoder::default()), raw_only(1))
        .scan(TaggedFrames::new(&[]))?;
    assert!(texts.is_empty());
    Ok(())
}

#[test]
fn test_read_errors_are_skipped_until_limit() -> anyhow::Result<()> {
    let config = ScanConfig {
        max_read_errors: 2,
        ..raw_only(1)
    };
    let scanner = VideoScanner::new(Arc::new(TagDecoder::default()), config);

    let mut flaky = TaggedFrames::new(&[5]);
    flaky.frames.push_front(Err(Error::Codec("corrupt packet".into())));
    flaky.frames.push_front(Err(Error::Codec("corrupt packet".into())));
    assert_eq!(scanner.scan(flaky)?, vec!["chunk-5"]);

    let mut broken = TaggedFrames::new(&[5]);
    for _ in 0..3 {
        broken.frames.push_front(Err(Error::Codec("corrupt packet".into())));
    }
    assert!(matches!(scanner.scan(broken), Err(Error::VideoRead(3, _))));
    Ok(())
}

#[test]
fn test_cancellation_and_budget() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let scanner = VideoScanner::new(Arc::new(TagDecoder::default()), raw_only(1)).with_cancel(cancel);
    let state = scanner.subscribe();
    assert_eq!(*state.borrow(), ScanState::Opened);
    assert!(matches!(scanner.scan(TaggedFrames::new(&[1, 2])), Err(Error::Cancelled)));
    assert_eq!(*state.borrow(), ScanState::Failed);

    let config = ScanConfig {
        budget_secs: Some(0),
        ..raw_only(1)
    };
    let scanner = VideoScanner::new(Arc::new(TagDecoder::default()), config);
    assert!(matches!(scanner.scan(TaggedFrames::new(&[1, 2])), Err(Error::Timeout(_))));
}

#[test]
fn test_debug_frames_are_dumped() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = ScanConfig {
        debug_dir: Some(dir.path().join("frames")),
        ..raw_only(1)
    };
    let tags = vec![0u8; 31];
    VideoScanner::new(Arc::new(TagDecoder::default()), config).scan(TaggedFrames::new(&tags))?;

    let mut names: Vec<String> = std::fs::read_dir(dir.path().join("frames"))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    assert_eq!(names.len(), 11);
    assert_eq!(names.first().map(String::as_str), Some("frame_000001.jpg"));
    assert_eq!(names.last().map(String::as_str), Some("frame_000030.jpg"));
    Ok(())
}

/// Real QR symbols pasted onto a noisy background, through all variants.
struct PosterFrames {
    frames: VecDeque<RgbImage>,
}

impl FrameSource for PosterFrames {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            total_frames: Some(self.frames.len() as u64),
            fps: 30.0,
            width: 640,
            height: 480,
        }
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

fn poster(text: Option<&str>) -> anyhow::Result<RgbImage> {
    let mut frame = RgbImage::from_pixel(640, 480, Rgb([90, 110, 90]));
    if let Some(text) = text {
        let symbol = QrCodec::default().with_annotation(false).render(text, None)?;
        for (x, y, p) in symbol.enumerate_pixels() {
            if x < 640 && y < 480 {
                frame.put_pixel(x, y, Rgb([p.0[0], p.0[0], p.0[0]]));
            }
        }
    }
    Ok(frame)
}

#[test]
fn test_scan_real_symbols() -> anyhow::Result<()> {
    let first = "QR:1/2|v8|file|AAAA";
    let second = "QR:2/2|v8|file|BBBB";
    let frames = vec![
        poster(None)?,
        poster(Some(first))?,
        poster(None)?,
        poster(Some(first))?,
        poster(None)?,
        poster(Some(second))?,
    ];
    let source = PosterFrames {
        frames: frames.into(),
    };
    let texts = VideoScanner::new(Arc::new(QrCodec::default()), ScanConfig::default()).scan(source)?;
    assert_eq!(texts, vec![first, second]);
    Ok(())
}
