//! Checksummed, compressed frame that travels through the barcodes.
//!
//! Wire layout:
//! ```text
//! ["FILE_MODE:" (file mode only)][crc32 big-endian u32][zlib stream ...]
//! ```

use std::fmt::{Display, Formatter};
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix that marks a file-mode frame.
pub const FILE_MODE_MARKER: &[u8] = b"FILE_MODE:";

/// Format version written by the serializer.
pub const FORMAT_VERSION: u32 = 8;

/// Oldest region payload version the reassembler accepts.
pub const MIN_SUPPORTED_VERSION: u32 = 4;

const CHECKSUM_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMode {
    File,
    Region,
}

impl PayloadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadMode::File => "file",
            PayloadMode::Region => "region",
        }
    }

    /// Routes a serialized frame by its leading marker.
    pub fn detect(frame_bytes: &[u8]) -> Self {
        if frame_bytes.starts_with(FILE_MODE_MARKER) {
            PayloadMode::File
        } else {
            PayloadMode::Region
        }
    }
}

impl Display for PayloadMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(PayloadMode::File),
            "region" => Ok(PayloadMode::Region),
            other => Err(Error::MalformedChunk(format!("unknown mode {:?}", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedFrame {
    pub mode: PayloadMode,
    pub version: u32,
    pub checksum: u32,
    pub compressed: Vec<u8>,
}

impl CompressedFrame {
    /// Compresses `raw` and stamps the checksum of the compressed bytes.
    pub fn seal(mode: PayloadMode, version: u32, raw: &[u8]) -> Result<Self> {
        let compressed = compress(raw)?;
        Ok(Self {
            mode,
            version,
            checksum: checksum(&compressed),
            compressed,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let marker = match self.mode {
            PayloadMode::File => FILE_MODE_MARKER,
            PayloadMode::Region => &[][..],
        };
        let mut out = Vec::with_capacity(marker.len() + CHECKSUM_LEN + self.compressed.len());
        out.extend_from_slice(marker);
        out.extend_from_slice(&self.checksum.to_be_bytes());
        out.extend_from_slice(&self.compressed);
        out
    }

    /// Parses wire bytes and verifies the checksum. The version is not on the
    /// wire; it is filled with `FORMAT_VERSION` and refined by the payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mode = PayloadMode::detect(bytes);
        let body = match mode {
            PayloadMode::File => &bytes[FILE_MODE_MARKER.len()..],
            PayloadMode::Region => bytes,
        };
        if body.len() < CHECKSUM_LEN {
            return Err(Error::TruncatedFrame(body.len()));
        }
        let (head, compressed) = body.split_at(CHECKSUM_LEN);
        let stored = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
        let computed = checksum(compressed);
        if stored != computed {
            return Err(Error::Integrity { stored, computed });
        }
        Ok(Self {
            mode,
            version: FORMAT_VERSION,
            checksum: stored,
            compressed: compressed.to_vec(),
        })
    }

    pub fn decompress(&self) -> Result<Vec<u8>> {
        decompress(&self.compressed)
    }

    pub fn wire_len(&self) -> usize {
        let marker = match self.mode {
            PayloadMode::File => FILE_MODE_MARKER.len(),
            PayloadMode::Region => 0,
        };
        marker + CHECKSUM_LEN + self.compressed.len()
    }
}

/// CRC-32 (IEEE), identical to zlib's `crc32`.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| Error::Serialization(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Serialization(format!("compression failed: {}", e)))
}

fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod frame_test;
