//! Error taxonomy shared by every stage of the barcode transport.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // ------------------------------------------------------------------------
    // Serializer
    // ------------------------------------------------------------------------
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid range reference {0:?}: expected letters followed by digits, e.g. \"A1:C10\"")]
    InvalidRange(String),

    #[error("workbook operation failed: {0}")]
    Workbook(String),

    // ------------------------------------------------------------------------
    // Chunk encoder
    // ------------------------------------------------------------------------
    #[error(
        "cannot fit payload into symbols of capacity {capacity}: chunk size fell below {floor} bytes"
    )]
    ChunkingImpossible { capacity: usize, floor: usize },

    #[error("payload needs {needed} chunks, at most {limit} are supported")]
    TooManyChunks { needed: usize, limit: usize },

    #[error("barcode codec failed: {0}")]
    Codec(String),

    // ------------------------------------------------------------------------
    // Reassembler
    // ------------------------------------------------------------------------
    #[error("no barcode data to restore from")]
    NoBarcodes,

    #[error("malformed chunk: {0}")]
    MalformedChunk(String),

    #[error("chunks disagree on batch size: saw total {first}, then {found}")]
    InconsistentTotal { first: usize, found: usize },

    /// `missing` lists the first few absent indices; `missing_count` counts all.
    #[error("incomplete data: missing chunks {} of {total}", missing_list(.missing, *.missing_count))]
    IncompleteData {
        missing: Vec<usize>,
        missing_count: usize,
        total: usize,
    },

    #[error("checksum mismatch: stored {stored} != computed {computed}")]
    Integrity { stored: u32, computed: u32 },

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("payload is too short to restore ({0} bytes)")]
    TruncatedFrame(usize),

    #[error("payload format error: {0}")]
    PayloadFormat(String),

    #[error("payload mode mismatch: expected {expected}, found {found}")]
    ModeMismatch { expected: String, found: String },

    #[error("unsupported payload version {found} (requires {minimum}+)")]
    UnsupportedVersion { found: u32, minimum: u32 },

    // ------------------------------------------------------------------------
    // Video frame scanner
    // ------------------------------------------------------------------------
    #[error("cannot open video {path}: {reason}")]
    VideoOpen { path: String, reason: String },

    #[error("video read failed after {0} consecutive errors: {1}")]
    VideoRead(usize, String),

    #[error("unsupported video format {0:?}")]
    UnsupportedVideo(String),

    #[error("scan exceeded its time budget of {0:?}")]
    Timeout(std::time::Duration),

    #[error("scan cancelled")]
    Cancelled,

    #[error("background worker failed: {0}")]
    Worker(String),

    #[error("unknown session {0:?}")]
    UnknownSession(String),

    // ------------------------------------------------------------------------
    // External error wrappers
    // ------------------------------------------------------------------------
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

fn missing_list(listed: &[usize], count: usize) -> String {
    if count > listed.len() {
        format!("{:?} and {} more", listed, count - listed.len())
    } else {
        format!("{:?}", listed)
    }
}
