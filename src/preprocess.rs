//! Image variants tried on every sampled frame to raise the decode rate.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// The decoded frame as-is.
    Raw,
    /// `alpha * p + beta` per channel, saturated to 0..=255.
    Contrast,
    /// BT.601 luma.
    Grayscale,
    /// Luma above the threshold becomes white, the rest black.
    Binary,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Raw,
        Variant::Contrast,
        Variant::Grayscale,
        Variant::Binary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Raw => "raw",
            Variant::Contrast => "contrast",
            Variant::Grayscale => "grayscale",
            Variant::Binary => "binary",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Preprocessor {
    alpha: f32,
    beta: f32,
    threshold: u8,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl Preprocessor {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            alpha: config.contrast_alpha,
            beta: config.brightness_beta,
            threshold: config.binary_threshold,
        }
    }

    pub fn apply(&self, variant: Variant, frame: &RgbImage) -> DynamicImage {
        match variant {
            Variant::Raw => DynamicImage::ImageRgb8(frame.clone()),
            Variant::Contrast => DynamicImage::ImageRgb8(self.contrast(frame)),
            Variant::Grayscale => DynamicImage::ImageLuma8(grayscale(frame)),
            Variant::Binary => DynamicImage::ImageLuma8(self.binary(frame)),
        }
    }

    fn contrast(&self, frame: &RgbImage) -> RgbImage {
        let scale = |v: u8| -> u8 { (self.alpha * v as f32 + self.beta).abs().round().min(255.0) as u8 };
        RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
            let Rgb([r, g, b]) = *frame.get_pixel(x, y);
            Rgb([scale(r), scale(g), scale(b)])
        })
    }

    fn binary(&self, frame: &RgbImage) -> GrayImage {
        let mut gray = grayscale(frame);
        for pixel in gray.pixels_mut() {
            pixel.0[0] = if pixel.0[0] > self.threshold { 255 } else { 0 };
        }
        gray
    }
}

pub fn grayscale(frame: &RgbImage) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let Rgb([r, g, b]) = *frame.get_pixel(x, y);
        let luma = (77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8;
        Luma([luma.min(255) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RgbImage {
        RgbImage::from_fn(4, 1, |x, _| match x {
            0 => Rgb([0, 0, 0]),
            1 => Rgb([100, 100, 100]),
            2 => Rgb([200, 10, 10]),
            _ => Rgb([255, 255, 255]),
        })
    }

    #[test]
    fn test_contrast_saturates() {
        let out = Preprocessor::default().apply(Variant::Contrast, &sample()).to_rgb8();
        assert_eq!(out.get_pixel(0, 0), &Rgb([10, 10, 10]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([160, 160, 160]));
        assert_eq!(out.get_pixel(2, 0), &Rgb([255, 25, 25]));
        assert_eq!(out.get_pixel(3, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_grayscale_and_binary() {
        let frame = sample();
        let gray = grayscale(&frame);
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
        assert_eq!(gray.get_pixel(1, 0).0[0], 100);
        assert_eq!(gray.get_pixel(3, 0).0[0], 255);

        let binary = Preprocessor::default().apply(Variant::Binary, &frame).to_luma8();
        let values: Vec<u8> = binary.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 0, 0, 255]);
    }

    #[test]
    fn test_raw_is_untouched() {
        let frame = sample();
        assert_eq!(Preprocessor::default().apply(Variant::Raw, &frame).to_rgb8(), frame);
    }
}
