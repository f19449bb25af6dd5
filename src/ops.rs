//! The six end-to-end operations, as plain functions over a `Config`.
//!
//! Serialized payloads are stored as `<output_dir>/<session_id>.data`;
//! generated images go to `<output_dir>/<session_id>/<name>.png`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::chunk::ChunkEncoder;
use crate::codec::{BarcodeDecoder, QrCodec};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::{CompressedFrame, PayloadMode};
use crate::reassemble::{Reassembler, ReconstructedFile, split_text_input};
use crate::scanner::ScanReport;
use crate::serializer::Serializer;
use crate::workbook;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv"];

const SESSION_EXT: &str = "data";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub mode: PayloadMode,
    /// Bytes of the sealed frame on disk.
    pub data_size: usize,
    pub path: PathBuf,
}

pub fn serialize_file(config: &Config, bytes: &[u8]) -> Result<Session> {
    if bytes.len() > config.max_file_size {
        return Err(Error::Serialization(format!(
            "file is {} bytes, the limit is {}",
            bytes.len(),
            config.max_file_size
        )));
    }
    let frame = Serializer::new(config.format_version).serialize_file(bytes)?;
    store_session(config, &frame)
}

pub fn serialize_excel(
    config: &Config,
    bytes: &[u8],
    region: &str,
    sheet: Option<&str>,
    source_name: Option<&str>,
) -> Result<Session> {
    let mut serializer =
        Serializer::new(config.format_version).with_max_region_cells(config.max_region_cells);
    if let Some(name) = source_name {
        serializer = serializer.with_source_name(name);
    }
    let frame = serializer.serialize_region(bytes, region, sheet)?;
    store_session(config, &frame)
}

pub fn list_sheets(bytes: &[u8]) -> Result<Vec<String>> {
    let book = workbook::load(bytes)?;
    Ok(workbook::sheet_names(&book))
}

fn store_session(config: &Config, frame: &CompressedFrame) -> Result<Session> {
    std::fs::create_dir_all(&config.output_dir)?;
    let session_id = uuid::Uuid::new_v4().to_string();
    let path = session_path(config, &session_id);
    let bytes = frame.to_bytes();
    std::fs::write(&path, &bytes)?;
    log::info!(
        "session {}: {} payload, {} bytes stored",
        session_id,
        frame.mode,
        bytes.len()
    );
    Ok(Session {
        session_id,
        mode: frame.mode,
        data_size: bytes.len(),
        path,
    })
}

fn session_path(config: &Config, session_id: &str) -> PathBuf {
    config
        .output_dir
        .join(format!("{}.{}", session_id, SESSION_EXT))
}

/// Session ids are UUIDs; anything else never reaches the filesystem.
fn load_session(config: &Config, session_id: &str) -> Result<Vec<u8>> {
    if uuid::Uuid::parse_str(session_id).is_err() {
        return Err(Error::UnknownSession(session_id.to_string()));
    }
    match std::fs::read(session_path(config, session_id)) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::UnknownSession(session_id.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Renders a stored session as PNG barcodes. `chunk_size` overrides the
/// configured symbol capacity.
pub fn generate_barcodes(
    config: &Config,
    session_id: &str,
    chunk_size: Option<usize>,
) -> Result<Vec<PathBuf>> {
    let bytes = load_session(config, session_id)?;
    let mode = PayloadMode::detect(&bytes);

    let encoder = ChunkEncoder::new(chunk_size.unwrap_or(config.encoder.max_symbol_capacity))
        .with_min_raw_chunk(config.encoder.min_raw_chunk);
    let codec = QrCodec::from_config(&config.encoder);
    let planned = encoder.plan_bytes(&bytes, mode, config.format_version)?;
    let images = encoder.render(planned, &codec)?;

    let dir = config.output_dir.join(session_id);
    std::fs::create_dir_all(&dir)?;
    let mut paths = Vec::with_capacity(images.len());
    for image in images {
        let path = dir.join(format!("{}.png", image.name));
        std::fs::write(&path, &image.image)?;
        paths.push(path);
    }
    log::info!(
        "session {}: {} barcodes written to {}",
        session_id,
        paths.len(),
        dir.display()
    );
    Ok(paths)
}

fn reassembler(config: &Config) -> Reassembler {
    Reassembler::new(&config.output_dir).with_min_supported_version(config.min_supported_version)
}

/// Decodes still images and restores their payload. Unreadable images are
/// skipped.
pub fn scan_restore<P: AsRef<Path>>(config: &Config, image_paths: &[P]) -> Result<ReconstructedFile> {
    let codec = QrCodec::from_config(&config.encoder);
    let mut texts = Vec::new();
    for path in image_paths {
        let path = path.as_ref();
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("skip image {}: {}", path.display(), e);
                continue;
            }
        };
        match codec.decode(&image) {
            Ok(found) if found.is_empty() => log::warn!("no barcode in {}", path.display()),
            Ok(found) => texts.extend(found),
            Err(e) => log::warn!("decode failed for {}: {}", path.display(), e),
        }
    }
    if texts.is_empty() {
        return Err(Error::NoBarcodes);
    }
    log::info!("{} barcode texts decoded from {} images", texts.len(), image_paths.len());
    reassembler(config).restore_texts(&texts)
}

pub fn restore_from_text(config: &Config, text: &str) -> Result<ReconstructedFile> {
    let texts = split_text_input(text);
    if texts.is_empty() {
        return Err(Error::NoBarcodes);
    }
    reassembler(config).restore_texts(&texts)
}

pub fn check_video_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(Error::UnsupportedVideo(path.display().to_string()))
    }
}

/// Scans a video on a blocking worker and restores what it found.
pub async fn scan_video(
    config: &Config,
    path: &Path,
    cancel: CancellationToken,
) -> Result<ReconstructedFile> {
    check_video_extension(path)?;
    let report = scan_video_report(config, path, cancel).await?;
    if report.texts.is_empty() {
        return Err(Error::NoBarcodes);
    }
    reassembler(config).restore_texts(&report.texts)
}

#[cfg(feature = "ffmpeg")]
pub async fn scan_video_report(
    config: &Config,
    path: &Path,
    cancel: CancellationToken,
) -> Result<ScanReport> {
    use std::sync::Arc;

    use crate::scanner::VideoScanner;
    use crate::video::FfmpegSource;
    use crate::worker::ScanWorker;

    let scanner = VideoScanner::new(
        Arc::new(QrCodec::from_config(&config.encoder)),
        config.scan.clone(),
    );
    let path = path.to_path_buf();
    ScanWorker::new(cancel)
        .run(scanner, move || FfmpegSource::open(&path))
        .await
}

#[cfg(not(feature = "ffmpeg"))]
pub async fn scan_video_report(
    _config: &Config,
    path: &Path,
    _cancel: CancellationToken,
) -> Result<ScanReport> {
    Err(Error::VideoOpen {
        path: path.display().to_string(),
        reason: "built without the ffmpeg feature".to_string(),
    })
}

#[cfg(test)]
#[path = "ops_test.rs"]
mod ops_test;
