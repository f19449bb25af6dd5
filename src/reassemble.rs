//! Collects decoded chunk texts back into a frame and restores its payload.

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::frame::{CompressedFrame, MIN_SUPPORTED_VERSION, PayloadMode};
use crate::region::RegionPayload;
use crate::workbook;

/// Separator of the manual text-recovery input.
pub const TEXT_SEPARATOR: char = ';';

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconstructedFile {
    pub output_path: PathBuf,
    pub filename: String,
    pub mode: PayloadMode,
    pub size: u64,
}

/// Splits `"text1;text2;..."` into trimmed, non-empty segments.
pub fn split_text_input(input: &str) -> Vec<String> {
    input
        .split(TEXT_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// At most this many absent indices are listed in `IncompleteData`.
pub const MISSING_LISTED: usize = 32;

/// Distinct bodies kept per chunk index; later variants are dropped.
pub const MAX_COPIES: usize = 4;

/// Chunk bodies of one batch. Every index in `1..=total` holds at least one
/// body; an index seen with differing bodies keeps each distinct copy in
/// arrival order.
#[derive(Clone, Debug)]
pub struct ChunkBatch {
    total: usize,
    bodies: BTreeMap<usize, Vec<String>>,
}

impl ChunkBatch {
    /// Sorts decoded barcode texts into a batch, in any order.
    ///
    /// Headerless texts are whole single-symbol payloads; when headed chunks
    /// are present, stray headerless texts and unreadable chunks are skipped
    /// with a warning.
    pub fn collect<S: AsRef<str>>(texts: &[S]) -> Result<Self> {
        let texts: Vec<&str> = texts
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            return Err(Error::NoBarcodes);
        }

        let (headed, bare): (Vec<&str>, Vec<&str>) =
            texts.into_iter().partition(|t| Chunk::is_chunk_text(t));

        let mut bodies: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        if headed.is_empty() {
            if bare.len() > 1 {
                log::warn!(
                    "{} headerless texts found, restoring from the first one that verifies",
                    bare.len()
                );
            }
            for text in bare {
                add_copy(&mut bodies, 1, text);
            }
            return Ok(Self { total: 1, bodies });
        }
        if !bare.is_empty() {
            log::warn!("ignoring {} texts without a chunk header", bare.len());
        }

        let mut total: Option<usize> = None;
        for text in headed {
            let chunk = match Chunk::parse(text) {
                Ok(chunk) => chunk,
                Err(e) => {
                    log::warn!("skip chunk: {}", e);
                    continue;
                }
            };
            match total {
                None => total = Some(chunk.total),
                Some(first) if first != chunk.total => {
                    return Err(Error::InconsistentTotal {
                        first,
                        found: chunk.total,
                    });
                }
                Some(_) => {}
            }
            add_copy(&mut bodies, chunk.index, &chunk.body);
        }

        let total = total.ok_or_else(|| Error::MalformedChunk("no readable chunk header".into()))?;
        let mut missing = Vec::new();
        let mut missing_count = 0;
        for index in (1..=total).filter(|i| !bodies.contains_key(i)) {
            missing_count += 1;
            if missing.len() < MISSING_LISTED {
                missing.push(index);
            }
        }
        if missing_count > 0 {
            return Err(Error::IncompleteData {
                missing,
                missing_count,
                total,
            });
        }
        Ok(Self { total, bodies })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Decodes the first copy of every chunk, except at `swap.0` where copy
    /// `swap.1` is used.
    pub fn assemble(&self, swap: Option<(usize, usize)>) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for (index, copies) in &self.bodies {
            let copy = match swap {
                Some((at, copy)) if at == *index => copy,
                _ => 0,
            };
            let body = copies.get(copy).ok_or_else(|| {
                Error::MalformedChunk(format!("chunk {} has no copy {}", index, copy))
            })?;
            let slice = STANDARD
                .decode(body)
                .inspect_err(|e| log::warn!("chunk {} body is not base64: {}", index, e))?;
            bytes.extend_from_slice(&slice);
        }
        log::debug!("combined {} chunks into {} bytes", self.total, bytes.len());
        Ok(bytes)
    }

    /// Every `(index, copy)` swap worth trying after the first copies failed.
    pub fn alternatives(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.bodies
            .iter()
            .flat_map(|(index, copies)| (1..copies.len()).map(move |copy| (*index, copy)))
    }

    /// Assembles and opens the frame, falling back to alternate copies one
    /// index at a time. Reports the failure of the first copies when none
    /// of the alternates verify either.
    pub fn open(&self) -> Result<(PayloadMode, Vec<u8>)> {
        let first = self.assemble(None).and_then(|bytes| open_frame(&bytes));
        let err = match first {
            Ok(opened) => return Ok(opened),
            Err(e) => e,
        };
        for (index, copy) in self.alternatives() {
            if let Ok(opened) = self.assemble(Some((index, copy))).and_then(|b| open_frame(&b)) {
                log::info!("frame verified with copy {} of chunk {}", copy + 1, index);
                return Ok(opened);
            }
        }
        Err(err)
    }
}

fn add_copy(bodies: &mut BTreeMap<usize, Vec<String>>, index: usize, body: &str) {
    let copies = bodies.entry(index).or_default();
    if copies.iter().any(|c| c == body) {
        return;
    }
    if copies.len() >= MAX_COPIES {
        log::debug!("chunk {}: dropping copy beyond {}", index, MAX_COPIES);
        return;
    }
    if !copies.is_empty() {
        log::warn!("chunk {} seen with {} different bodies", index, copies.len() + 1);
    }
    copies.push(body.to_string());
}

/// Rebuilds frame bytes from decoded barcode texts, in any order, using the
/// first copy of each chunk.
pub fn combine<S: AsRef<str>>(texts: &[S]) -> Result<Vec<u8>> {
    ChunkBatch::collect(texts)?.assemble(None)
}

/// Verifies and unpacks a frame, without writing anything.
pub fn open_frame(bytes: &[u8]) -> Result<(PayloadMode, Vec<u8>)> {
    let frame = CompressedFrame::from_bytes(bytes)?;
    let raw = frame.decompress()?;
    Ok((frame.mode, raw))
}

#[derive(Clone, Debug)]
pub struct Reassembler {
    output_dir: PathBuf,
    min_supported_version: u32,
}

impl Reassembler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            min_supported_version: MIN_SUPPORTED_VERSION,
        }
    }

    pub fn with_min_supported_version(mut self, version: u32) -> Self {
        self.min_supported_version = version;
        self
    }

    /// Like `restore`, trying alternate copies of a chunk when the first
    /// copies do not verify.
    pub fn restore_texts<S: AsRef<str>>(&self, texts: &[S]) -> Result<ReconstructedFile> {
        let (mode, raw) = ChunkBatch::collect(texts)?.open()?;
        self.write(mode, &raw)
    }

    /// Routes by the file-mode marker, verifies the checksum, decompresses
    /// and writes the restored artifact under the output directory.
    pub fn restore(&self, bytes: &[u8]) -> Result<ReconstructedFile> {
        let (mode, raw) = open_frame(bytes)?;
        self.write(mode, &raw)
    }

    fn write(&self, mode: PayloadMode, raw: &[u8]) -> Result<ReconstructedFile> {
        std::fs::create_dir_all(&self.output_dir)?;
        match mode {
            PayloadMode::File => self.restore_file(raw),
            PayloadMode::Region => self.restore_region(raw),
        }
    }

    fn restore_file(&self, raw: &[u8]) -> Result<ReconstructedFile> {
        let filename = format!("restored_file_{}", unique_suffix());
        let output_path = self.output_dir.join(&filename);
        std::fs::write(&output_path, raw)?;
        log::info!("restored {} bytes to {}", raw.len(), output_path.display());
        Ok(ReconstructedFile {
            output_path,
            filename,
            mode: PayloadMode::File,
            size: raw.len() as u64,
        })
    }

    fn restore_region(&self, raw: &[u8]) -> Result<ReconstructedFile> {
        let payload = RegionPayload::from_json(raw)
            .map_err(|e| Error::PayloadFormat(format!("region payload: {}", e)))?;
        if payload.meta.mode != PayloadMode::Region {
            return Err(Error::ModeMismatch {
                expected: PayloadMode::Region.to_string(),
                found: payload.meta.mode.to_string(),
            });
        }
        if payload.meta.version < self.min_supported_version {
            return Err(Error::UnsupportedVersion {
                found: payload.meta.version,
                minimum: self.min_supported_version,
            });
        }

        let filename = format!("restored_excel_{}.xlsx", unique_suffix());
        let output_path = self.output_dir.join(&filename);
        workbook::write_region(&payload, &output_path)?;
        let size = std::fs::metadata(&output_path)?.len();
        log::info!(
            "restored region {} of sheet {:?} ({}x{}) to {}",
            payload.meta.region,
            payload.meta.sheet,
            payload.width(),
            payload.height(),
            output_path.display()
        );
        Ok(ReconstructedFile {
            output_path,
            filename,
            mode: PayloadMode::Region,
            size,
        })
    }
}

/// `YYYYmmdd_HHMMSS_xxxxxxxx`: timestamped, random tail against collisions.
fn unique_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"), &id[..8])
}

#[cfg(test)]
#[path = "reassemble_test.rs"]
mod reassemble_test;
