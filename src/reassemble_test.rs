use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{ChunkBatch, MISSING_LISTED, Reassembler, combine, open_frame, split_text_input};
use crate::chunk::{Chunk, ChunkEncoder};
use crate::codec::{BarcodeDecoder, QrCodec};
use crate::error::Error;
use crate::frame::{CompressedFrame, FORMAT_VERSION, PayloadMode};
use crate::range::CellRange;
use crate::region::{CellValue, RegionPayload};
use crate::serializer::Serializer;
use crate::test_fixtures::{FIXTURE_SHEET, noise, styled_workbook_bytes};
use crate::workbook;

fn texts_for(data: &[u8], capacity: usize) -> Vec<String> {
    let frame = Serializer::default().serialize_file(data).unwrap();
    ChunkEncoder::new(capacity)
        .plan(&frame)
        .unwrap()
        .into_iter()
        .map(|c| c.text)
        .collect()
}

#[test]
fn test_file_round_trip_across_sizes_and_capacities() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let reassembler = Reassembler::new(dir.path());
    for len in [10usize, 1000, 1_000_000] {
        let data = noise(len, len as u64);
        for capacity in [64usize, 200, 1800] {
            let texts = texts_for(&data, capacity);
            if len == 10 {
                assert_eq!(texts.len(), 1, "10 bytes fit one symbol at {}", capacity);
            } else if len == 1_000_000 {
                assert!(texts.len() > 1);
            }
            assert!(texts.iter().all(|t| t.len() <= capacity));

            let restored = reassembler.restore_texts(&texts)?;
            assert_eq!(restored.mode, PayloadMode::File);
            assert!(restored.filename.starts_with("restored_file_"));
            assert_eq!(std::fs::read(&restored.output_path)?, data, "len {} capacity {}", len, capacity);
        }
    }
    Ok(())
}

#[test]
fn test_order_does_not_matter() -> anyhow::Result<()> {
    let data = noise(20_000, 11);
    let texts = texts_for(&data, 300);
    let in_order = combine(&texts)?;

    let mut reversed = texts.clone();
    reversed.reverse();
    assert_eq!(combine(&reversed)?, in_order);

    let mut shuffled = texts.clone();
    shuffled.shuffle(&mut StdRng::seed_from_u64(5));
    assert_eq!(combine(&shuffled)?, in_order);

    let (_, raw) = open_frame(&in_order)?;
    assert_eq!(raw, data);
    Ok(())
}

#[test]
fn test_missing_chunk_is_named() {
    let texts = texts_for(&noise(5000, 1), 400);
    let total = texts.len();
    for drop in [1, total / 2, total] {
        let partial: Vec<&String> = texts
            .iter()
            .filter(|t| Chunk::parse(t).unwrap().index != drop)
            .collect();
        let partial: Vec<&str> = partial.iter().map(|s| s.as_str()).collect();
        match combine(&partial) {
            Err(Error::IncompleteData {
                missing,
                missing_count,
                total: t,
            }) => {
                assert_eq!(missing, vec![drop]);
                assert_eq!(missing_count, 1);
                assert_eq!(t, total);
            }
            other => panic!("expected IncompleteData, got {:?}", other.map(|b| b.len())),
        }
    }
}

#[test]
fn test_huge_declared_total_is_rejected_cheaply() {
    // a lone stray header claiming hundreds of millions of chunks
    assert!(matches!(
        combine(&["QR:1/400000000|v8|file|AAAA"]),
        Err(Error::MalformedChunk(_))
    ));

    match combine(&["QR:1/65536|v8|file|AAAA"]) {
        Err(Error::IncompleteData {
            missing,
            missing_count,
            total,
        }) => {
            assert_eq!(total, 65536);
            assert_eq!(missing_count, 65535);
            assert_eq!(missing.len(), MISSING_LISTED);
            assert_eq!(missing[0], 2);
        }
        other => panic!("expected IncompleteData, got {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn test_good_second_copy_rescues_a_corrupted_first() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = noise(3000, 13);
    let texts = texts_for(&data, 500);
    assert!(texts.len() > 2);

    // same index, valid base64, different bytes: only the checksum can tell
    let good = Chunk::parse(&texts[1])?;
    let mut body = good.body.clone().into_bytes();
    body[0] = if body[0] == b'A' { b'B' } else { b'A' };
    let corrupted = Chunk {
        body: String::from_utf8(body)?,
        ..good
    }
    .to_text();

    let mut batch_texts = vec![corrupted.clone()];
    batch_texts.extend(texts.iter().cloned());
    let batch = ChunkBatch::collect(&batch_texts)?;
    assert_eq!(batch.total(), texts.len());
    assert_eq!(batch.alternatives().collect::<Vec<_>>(), vec![(2, 1)]);
    assert!(matches!(
        open_frame(&combine(&batch_texts)?),
        Err(Error::Integrity { .. })
    ));

    let restored = Reassembler::new(dir.path()).restore_texts(&batch_texts)?;
    assert_eq!(std::fs::read(&restored.output_path)?, data);

    // with no good copy the first failure is reported
    let mut only_bad: Vec<String> = texts.clone();
    only_bad[1] = corrupted;
    assert!(matches!(
        Reassembler::new(dir.path()).restore_texts(&only_bad),
        Err(Error::Integrity { .. })
    ));
    Ok(())
}

#[test]
fn test_duplicates_and_noise_are_tolerated() -> anyhow::Result<()> {
    let data = noise(3000, 2);
    let texts = texts_for(&data, 500);
    let mut noisy = vec!["https://example.com/not-a-chunk".to_string()];
    noisy.extend(texts.iter().cloned());
    noisy.push(texts[0].clone());
    noisy.push("QR:garbage".to_string());
    noisy.push("   ".to_string());

    let (_, raw) = open_frame(&combine(&noisy)?)?;
    assert_eq!(raw, data);
    Ok(())
}

#[test]
fn test_inconsistent_total_is_rejected() {
    let mut texts = texts_for(&noise(3000, 4), 500);
    texts.push("QR:1/99|v8|file|AAAA".to_string());
    assert!(matches!(
        combine(&texts),
        Err(Error::InconsistentTotal { found: 99, .. })
    ));
}

#[test]
fn test_single_and_empty_inputs() -> anyhow::Result<()> {
    let texts = texts_for(b"tiny", 1800);
    assert_eq!(texts.len(), 1);
    let decoded = combine(&[texts[0].clone(), "something else".to_string()])?;
    assert_eq!(open_frame(&decoded)?.1, b"tiny");

    let empty: [&str; 0] = [];
    assert!(matches!(combine(&empty), Err(Error::NoBarcodes)));
    assert!(matches!(combine(&["", "  "]), Err(Error::NoBarcodes)));
    assert!(matches!(combine(&["not*base64"]), Err(Error::Base64(_))));
    Ok(())
}

#[test]
fn test_text_input_splitting() {
    assert_eq!(split_text_input(" a ;b;; c ;"), vec!["a", "b", "c"]);
    assert!(split_text_input(" ; ;").is_empty());
}

#[test]
fn test_tampering_is_detected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let reassembler = Reassembler::new(dir.path());
    let frame = Serializer::default().serialize_file(&noise(200, 9))?;
    let bytes = frame.to_bytes();
    let marker = crate::frame::FILE_MODE_MARKER.len();

    for byte in marker..bytes.len() {
        for bit in 0..8 {
            let mut tampered = bytes.clone();
            tampered[byte] ^= 1 << bit;
            assert!(
                matches!(reassembler.restore(&tampered), Err(Error::Integrity { .. })),
                "flip at byte {} bit {} went unnoticed",
                byte,
                bit
            );
        }
    }
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_region_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let source = styled_workbook_bytes();
    let frame = Serializer::default().serialize_region(&source, "A1:C2", Some(FIXTURE_SHEET))?;
    let texts: Vec<String> = ChunkEncoder::new(200)
        .plan(&frame)?
        .into_iter()
        .map(|c| c.text)
        .collect();

    let restored = Reassembler::new(dir.path()).restore_texts(&texts)?;
    assert_eq!(restored.mode, PayloadMode::Region);
    assert!(restored.filename.starts_with("restored_excel_"));
    assert!(restored.filename.ends_with(".xlsx"));

    let range = CellRange::parse("A1:C2")?;
    let original_book = workbook::load(&source)?;
    let original = workbook::read_region(workbook::select_sheet(&original_book, Some(FIXTURE_SHEET)), &range);
    let restored_book = workbook::load(&std::fs::read(&restored.output_path)?)?;
    let rebuilt = workbook::read_region(workbook::select_sheet(&restored_book, Some(FIXTURE_SHEET)), &range);

    assert_eq!(rebuilt.data, original.data);
    assert_eq!(rebuilt.merged, original.merged);
    assert_eq!(rebuilt.styles, original.styles);
    assert_eq!(rebuilt.data[0][0], CellValue::Text("Item".into()));
    assert_eq!(rebuilt.data[1][2], CellValue::Formula("B1*3".into()));
    Ok(())
}

fn region_frame_with(edit: impl FnOnce(&mut RegionPayload)) -> Vec<u8> {
    let frame = Serializer::default()
        .serialize_region(&styled_workbook_bytes(), "A1:B2", Some(FIXTURE_SHEET))
        .unwrap();
    let mut payload = RegionPayload::from_json(&frame.decompress().unwrap()).unwrap();
    edit(&mut payload);
    CompressedFrame::seal(PayloadMode::Region, FORMAT_VERSION, &payload.to_json().unwrap())
        .unwrap()
        .to_bytes()
}

#[test]
fn test_region_payload_checks() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let reassembler = Reassembler::new(dir.path());

    let wrong_mode = region_frame_with(|p| p.meta.mode = PayloadMode::File);
    assert!(matches!(
        reassembler.restore(&wrong_mode),
        Err(Error::ModeMismatch { .. })
    ));

    let old = region_frame_with(|p| p.meta.version = 3);
    match reassembler.restore(&old) {
        Err(Error::UnsupportedVersion { found, minimum }) => assert_eq!((found, minimum), (3, 4)),
        other => panic!("expected UnsupportedVersion, got {:?}", other),
    }
    let oldest_accepted = region_frame_with(|p| p.meta.version = 4);
    assert!(reassembler.restore(&oldest_accepted).is_ok());

    let garbage = CompressedFrame::seal(PayloadMode::Region, FORMAT_VERSION, b"{not json")?.to_bytes();
    assert!(matches!(reassembler.restore(&garbage), Err(Error::PayloadFormat(_))));

    assert!(matches!(reassembler.restore(b"ab"), Err(Error::TruncatedFrame(2))));
    Ok(())
}

#[test]
fn test_round_trip_through_rendered_images() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = noise(1000, 21);
    let frame = Serializer::default().serialize_file(&data)?;
    let codec = QrCodec::default();
    let images = ChunkEncoder::new(400).encode(&frame, &codec)?;
    assert!(images.len() > 1);

    let mut texts = Vec::new();
    for img in images.iter().rev() {
        texts.extend(codec.decode(&image::load_from_memory(&img.image)?)?);
    }
    let restored = Reassembler::new(dir.path()).restore_texts(&texts)?;
    assert_eq!(std::fs::read(restored.output_path)?, data);
    Ok(())
}
