//! Splits a frame into barcode-sized texts.
//!
//! Multi-chunk text layout:
//! ```text
//! QR:{index}/{total}|v{version}|{mode}|{base64 body}
//! ```
//! A frame that fits one symbol is emitted as bare base64 with no header.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::codec::BarcodeEncoder;
use crate::config::EncoderConfig;
use crate::error::{Error, Result};
use crate::frame::{CompressedFrame, PayloadMode};

pub const HEADER_PREFIX: &str = "QR:";
pub const SINGLE_NAME: &str = "single";

/// Upper bound on `total` in a chunk header. Well above what a 10 MiB frame
/// needs at the smallest usable capacity.
pub const MAX_CHUNKS: usize = 65_536;

/// Share of the symbol capacity given to raw bytes; base64 grows them by 4/3.
const RAW_SHARE_NUM: usize = 7;
const RAW_SHARE_DEN: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based.
    pub index: usize,
    pub total: usize,
    pub version: u32,
    pub mode: PayloadMode,
    /// Base64 of this chunk's byte slice.
    pub body: String,
}

impl Chunk {
    pub fn header(&self) -> String {
        format!(
            "{}{}/{}|v{}|{}|",
            HEADER_PREFIX, self.index, self.total, self.version, self.mode
        )
    }

    pub fn to_text(&self) -> String {
        let mut text = self.header();
        text.push_str(&self.body);
        text
    }

    pub fn name(&self) -> String {
        format!("chunk_{}_of_{}", self.index, self.total)
    }

    pub fn is_chunk_text(text: &str) -> bool {
        text.starts_with(HEADER_PREFIX)
    }

    /// Parses a headed chunk text. The body is kept as text; it is only
    /// decoded once every chunk of the batch has been collected.
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = |why: &str| Error::MalformedChunk(format!("{}: {:?}", why, preview(text)));

        let rest = text
            .strip_prefix(HEADER_PREFIX)
            .ok_or_else(|| malformed("missing header"))?;
        let parts: Vec<&str> = rest.splitn(4, '|').collect();
        if parts.len() != 4 {
            return Err(malformed("expected 4 header fields"));
        }

        let (index, total) = parts[0]
            .split_once('/')
            .ok_or_else(|| malformed("bad position field"))?;
        let index: usize = index.parse().map_err(|_| malformed("bad index"))?;
        let total: usize = total.parse().map_err(|_| malformed("bad total"))?;
        if index == 0 || total == 0 || index > total {
            return Err(malformed("index out of range"));
        }
        if total > MAX_CHUNKS {
            return Err(malformed("total exceeds the chunk limit"));
        }

        let version: u32 = parts[1]
            .strip_prefix('v')
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| malformed("bad version field"))?;
        let mode: PayloadMode = parts[2].parse()?;

        Ok(Self {
            index,
            total,
            version,
            mode,
            body: parts[3].to_string(),
        })
    }
}

fn preview(text: &str) -> String {
    text.chars().take(40).collect()
}

/// One planned barcode: its file name, text content and caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChunk {
    pub name: String,
    pub text: String,
    pub annotation: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BarcodeImage {
    pub name: String,
    pub text: String,
    pub image: Bytes,
}

#[derive(Clone, Debug)]
pub struct ChunkEncoder {
    max_symbol_capacity: usize,
    min_raw_chunk: usize,
}

impl ChunkEncoder {
    pub fn new(max_symbol_capacity: usize) -> Self {
        Self {
            max_symbol_capacity,
            min_raw_chunk: EncoderConfig::default().min_raw_chunk,
        }
    }

    pub fn with_min_raw_chunk(mut self, floor: usize) -> Self {
        self.min_raw_chunk = floor.max(1);
        self
    }

    pub fn plan(&self, frame: &CompressedFrame) -> Result<Vec<EncodedChunk>> {
        self.plan_bytes(&frame.to_bytes(), frame.mode, frame.version)
    }

    /// Lays `bytes` out as barcode texts that each fit the symbol capacity.
    ///
    /// Starts at 70% of the capacity per raw slice and, whenever one headed
    /// text overflows, restarts the whole batch with a slice at least 10%
    /// smaller. Fails once the slice would drop under `min_raw_chunk`.
    pub fn plan_bytes(
        &self,
        bytes: &[u8],
        mode: PayloadMode,
        version: u32,
    ) -> Result<Vec<EncodedChunk>> {
        let capacity = self.max_symbol_capacity;
        let mut max_raw = capacity * RAW_SHARE_NUM / RAW_SHARE_DEN;

        if bytes.len() <= max_raw {
            let text = STANDARD.encode(bytes);
            if text.len() <= capacity {
                log::debug!("{} bytes fit a single symbol", bytes.len());
                return Ok(vec![EncodedChunk {
                    name: SINGLE_NAME.to_string(),
                    text,
                    annotation: Some(mode.to_string()),
                }]);
            }
        }

        loop {
            if max_raw < self.min_raw_chunk {
                return Err(Error::ChunkingImpossible {
                    capacity,
                    floor: self.min_raw_chunk,
                });
            }
            match self.try_split(bytes, max_raw, mode, version)? {
                Some(chunks) => {
                    log::debug!(
                        "{} bytes split into {} chunks of up to {} bytes",
                        bytes.len(),
                        chunks.len(),
                        max_raw
                    );
                    return Ok(chunks);
                }
                None => {
                    let next = (max_raw * 9 / 10).min(max_raw - 1);
                    log::debug!(
                        "chunk text overflows capacity {} at {} raw bytes, retrying with {}",
                        capacity,
                        max_raw,
                        next
                    );
                    max_raw = next;
                }
            }
        }
    }

    /// `None` as soon as one text exceeds the capacity.
    fn try_split(
        &self,
        bytes: &[u8],
        max_raw: usize,
        mode: PayloadMode,
        version: u32,
    ) -> Result<Option<Vec<EncodedChunk>>> {
        let total = bytes.len().div_ceil(max_raw);
        if total > MAX_CHUNKS {
            return Err(Error::TooManyChunks {
                needed: total,
                limit: MAX_CHUNKS,
            });
        }
        let mut out = Vec::with_capacity(total);
        for (i, slice) in bytes.chunks(max_raw).enumerate() {
            let chunk = Chunk {
                index: i + 1,
                total,
                version,
                mode,
                body: STANDARD.encode(slice),
            };
            let text = chunk.to_text();
            if text.len() > self.max_symbol_capacity {
                return Ok(None);
            }
            out.push(EncodedChunk {
                name: chunk.name(),
                text,
                annotation: Some(format!("{}/{}", chunk.index, chunk.total)),
            });
        }
        Ok(Some(out))
    }

    /// Plans the frame and renders one image per chunk.
    pub fn encode(
        &self,
        frame: &CompressedFrame,
        encoder: &dyn BarcodeEncoder,
    ) -> Result<Vec<BarcodeImage>> {
        self.render(self.plan(frame)?, encoder)
    }

    pub fn render(
        &self,
        planned: Vec<EncodedChunk>,
        encoder: &dyn BarcodeEncoder,
    ) -> Result<Vec<BarcodeImage>> {
        let mut images = Vec::with_capacity(planned.len());
        for chunk in planned {
            let image = encoder.encode(&chunk.text, chunk.annotation.as_deref())?;
            images.push(BarcodeImage {
                name: chunk.name,
                text: chunk.text,
                image,
            });
        }
        log::info!("rendered {} barcode images", images.len());
        Ok(images)
    }
}

#[cfg(test)]
#[path = "chunk_test.rs"]
mod chunk_test;
