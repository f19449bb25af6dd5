//! Barcode codec seam and the default QR implementation.
//!
//! Encoding builds and rasterises the symbol with `qrcode`, adds the quiet
//! zone and caption strip, and writes an 8-bit greyscale PNG; decoding runs
//! `rqrr` over any `image::DynamicImage`.

use std::fmt::{Display, Formatter};
use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use serde::{Deserialize, Serialize};

use crate::config::EncoderConfig;
use crate::error::{Error, Result};

const WHITE: Luma<u8> = Luma([255]);
const BLACK: Luma<u8> = Luma([0]);

/// Renders one text into one barcode image.
pub trait BarcodeEncoder: Send + Sync {
    /// Returns encoded image bytes (PNG for the default codec).
    fn encode(&self, text: &str, annotation: Option<&str>) -> Result<Bytes>;
}

/// Finds every barcode text in an image. An image without barcodes yields an
/// empty list, not an error.
pub trait BarcodeDecoder: Send + Sync {
    fn decode(&self, image: &DynamicImage) -> Result<Vec<String>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcLevel {
    #[default]
    Low,
    Medium,
    Quartile,
    High,
}

impl EcLevel {
    /// Text capacity this crate assumes per symbol at the level.
    pub fn nominal_capacity(&self) -> usize {
        match self {
            EcLevel::Low => 1800,
            EcLevel::Medium => 1400,
            EcLevel::Quartile => 1000,
            EcLevel::High => 200,
        }
    }

    fn to_qr(self) -> qrcode::EcLevel {
        match self {
            EcLevel::Low => qrcode::EcLevel::L,
            EcLevel::Medium => qrcode::EcLevel::M,
            EcLevel::Quartile => qrcode::EcLevel::Q,
            EcLevel::High => qrcode::EcLevel::H,
        }
    }
}

impl Display for EcLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EcLevel::Low => "low",
            EcLevel::Medium => "medium",
            EcLevel::Quartile => "quartile",
            EcLevel::High => "high",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub struct QrCodec {
    ec_level: EcLevel,
    module_px: u32,
    quiet_zone: u32,
    annotate: bool,
}

impl Default for QrCodec {
    fn default() -> Self {
        Self::from_config(&EncoderConfig::default())
    }
}

impl QrCodec {
    pub fn from_config(config: &EncoderConfig) -> Self {
        Self {
            ec_level: config.error_correction,
            module_px: config.module_px.max(1),
            quiet_zone: config.quiet_zone,
            annotate: config.annotate,
        }
    }

    pub fn with_ec_level(mut self, ec_level: EcLevel) -> Self {
        self.ec_level = ec_level;
        self
    }

    pub fn with_annotation(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Rasterises `text` as a QR symbol, optionally with a caption strip.
    pub fn render(&self, text: &str, annotation: Option<&str>) -> Result<GrayImage> {
        let code = qrcode::QrCode::with_error_correction_level(text.as_bytes(), self.ec_level.to_qr())
            .map_err(|e| Error::Codec(format!("cannot build QR symbol for {} chars: {}", text.len(), e)))?;
        let symbol = code
            .render::<Luma<u8>>()
            .dark_color(BLACK)
            .light_color(WHITE)
            .quiet_zone(false)
            .module_dimensions(self.module_px, self.module_px)
            .build();

        let margin = self.quiet_zone * self.module_px;
        let side = symbol.width() + 2 * margin;
        let caption = annotation.filter(|a| self.annotate && !a.is_empty());
        let scale = (self.module_px / 2).max(2);
        let strip = if caption.is_some() { GLYPH_H * scale + 2 * scale } else { 0 };

        let mut img = GrayImage::from_pixel(side, side + strip, WHITE);
        image::imageops::replace(&mut img, &symbol, margin as i64, margin as i64);

        if let Some(caption) = caption {
            let text_w = caption.chars().count() as u32 * (GLYPH_W + 1) * scale;
            let x = side.saturating_sub(text_w + margin / 2);
            draw_text(&mut img, caption, x, side + scale, scale);
        }
        Ok(img)
    }
}

impl BarcodeEncoder for QrCodec {
    fn encode(&self, text: &str, annotation: Option<&str>) -> Result<Bytes> {
        let img = self.render(text, annotation)?;
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(Bytes::from(png))
    }
}

impl BarcodeDecoder for QrCodec {
    fn decode(&self, image: &DynamicImage) -> Result<Vec<String>> {
        let grey = image.to_luma8();
        let (w, h) = (grey.width() as usize, grey.height() as usize);
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| grey.get_pixel(x as u32, y as u32).0[0]);

        let mut texts = Vec::new();
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => texts.push(content),
                Err(e) => log::debug!("grid found but not decodable: {}", e),
            }
        }
        Ok(texts)
    }
}

fn fill_rect(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32) {
    for py in y..(y + h).min(img.height()) {
        for px in x..(x + w).min(img.width()) {
            img.put_pixel(px, py, BLACK);
        }
    }
}

// ============================================================================
// Caption font
// ============================================================================

const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;

/// 3x5 bitmap, one row per byte, most significant of the low 3 bits leftmost.
/// Covers batch counters ("3/7") and the mode names.
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_lowercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        'e' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'i' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'l' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'n' => [0b000, 0b110, 0b101, 0b101, 0b101],
        'o' => [0b000, 0b111, 0b101, 0b101, 0b111],
        'r' => [0b000, 0b111, 0b100, 0b100, 0b100],
        _ => [0; 5],
    }
}

fn draw_text(img: &mut GrayImage, text: &str, x: u32, y: u32, scale: u32) {
    let mut cursor = x;
    for c in text.chars() {
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) != 0 {
                    fill_rect(img, cursor + col * scale, y + row as u32 * scale, scale, scale);
                }
            }
        }
        cursor += (GLYPH_W + 1) * scale;
    }
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
