use super::{BarcodeDecoder, BarcodeEncoder, EcLevel, QrCodec};
use image::{DynamicImage, GrayImage, Luma};

#[test]
fn test_encode_decode_chunk_text() -> anyhow::Result<()> {
    let codec = QrCodec::default();
    let text = "QR:2/7|v8|file|SGVsbG8sIGJhcmNvZGUh";
    let png = codec.encode(text, Some("2/7"))?;
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

    let image = image::load_from_memory(&png)?;
    assert_eq!(codec.decode(&image)?, vec![text.to_string()]);
    Ok(())
}

#[test]
fn test_caption_adds_strip_below_symbol() -> anyhow::Result<()> {
    let codec = QrCodec::default();
    let plain = codec.render("abc", None)?;
    let captioned = codec.render("abc", Some("region"))?;
    assert_eq!(plain.width(), captioned.width());
    assert!(captioned.height() > plain.height());
    assert!(captioned.pixels().filter(|p| p.0[0] == 0).count() > plain.pixels().filter(|p| p.0[0] == 0).count());

    let silent = codec.clone().with_annotation(false).render("abc", Some("region"))?;
    assert_eq!(silent.dimensions(), plain.dimensions());
    Ok(())
}

#[test]
fn test_high_ec_rejects_oversized_text() {
    let codec = QrCodec::default().with_ec_level(EcLevel::High);
    let too_long = "x".repeat(2000);
    assert!(codec.encode(&too_long, None).is_err());
}

#[test]
fn test_blank_image_decodes_to_nothing() -> anyhow::Result<()> {
    let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 120, Luma([255])));
    assert!(QrCodec::default().decode(&blank)?.is_empty());
    Ok(())
}

#[test]
fn test_large_low_ec_symbol_round_trips() -> anyhow::Result<()> {
    let codec = QrCodec::default();
    let text = format!("QR:1/2|v8|region|{}", "QUJD".repeat(300));
    let image = DynamicImage::ImageLuma8(codec.render(&text, Some("1/2"))?);
    assert_eq!(codec.decode(&image)?, vec![text]);
    Ok(())
}

#[test]
fn test_quiet_zone_and_module_size() -> anyhow::Result<()> {
    let codec = QrCodec::default().with_annotation(false);
    let img = codec.render("abc", None)?;
    let modules = qrcode::QrCode::with_error_correction_level(b"abc", qrcode::EcLevel::L)?.width() as u32;
    // 10 px modules, 4 module quiet zone on every side
    assert_eq!(img.width(), (modules + 8) * 10);
    assert_eq!(img.height(), img.width());
    assert_eq!(img.get_pixel(39, 39).0[0], 255);
    // top-left finder pattern starts right after the margin
    assert_eq!(img.get_pixel(40, 40).0[0], 0);
    Ok(())
}
