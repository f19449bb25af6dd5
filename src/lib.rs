//! Chunked, checksum-verified file transport over QR barcodes.
//!
//! A file (or a rectangle of an xlsx sheet) is sealed into a compressed,
//! CRC-stamped frame, split into barcode-sized texts, rendered as images, and
//! later rebuilt from whatever barcodes a camera, a scanner or a video
//! recording recovered.

pub mod chunk;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod ops;
pub mod preprocess;
pub mod range;
pub mod reassemble;
pub mod region;
pub mod scanner;
pub mod serializer;
#[cfg(feature = "ffmpeg")]
pub mod video;
pub mod workbook;
pub mod worker;

#[cfg(test)]
mod test_fixtures;

pub use error::{Error, Result};
