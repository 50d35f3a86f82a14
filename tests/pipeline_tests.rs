//! End-to-end conversion tests: single pages, multi-page scores, batches
//! and debug artifacts.

mod common;

use pretty_assertions::assert_eq;
use common::{onsets, Score};
use scorescan::{
    convert, convert_batch, convert_pages, convert_with_json, BinaryImage, ConvertOptions,
    KeySignature, OmrError, Page, StaffReading, TimeSignature,
};

fn scale_page() -> BinaryImage {
    let mut score = Score::new(1);
    score
        .time_signature(0, 70, 4, 4)
        .quarter(0, 150, -2)
        .quarter(0, 210, -1)
        .quarter(0, 270, 0)
        .quarter(0, 330, 1);
    score.image()
}

fn halves_page() -> BinaryImage {
    let mut score = Score::new(1);
    score.half(0, 150, 2).half(0, 230, 4);
    score.image()
}

// ═══════════════════════════════════════════════════════════════════════
// Single page
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn scale_round_trip() {
    let result = convert(&scale_page(), &ConvertOptions::default()).expect("converted");

    assert_eq!(onsets(&result.midi), vec![(0, 60), (480, 62), (960, 64), (1440, 65)]);
    let report = &result.report;
    assert_eq!(report.staff_count, 1);
    assert_eq!(report.total_ticks, 1920);
    assert_eq!(
        report.detected_time_signature,
        Some(TimeSignature { numerator: 4, denominator: 4 })
    );
    assert!(report.time_signature_consistent);
    assert_eq!(report.unrecognized_symbol_count, 0);
    assert!(result.artifacts.is_empty());
    println!("✓ scale: {} bytes of MIDI", result.midi.len());
}

#[test]
fn beamed_eighths_fill_a_beat() {
    let mut score = Score::new(1);
    score.beamed(0, &[(150, 2), (210, 4)], 1).quarter(0, 290, 2);
    let result = convert(&score.image(), &ConvertOptions::default()).expect("converted");

    assert_eq!(onsets(&result.midi), vec![(0, 67), (240, 71), (480, 67)]);
    assert_eq!(result.report.total_ticks, 960);
}

#[test]
fn chord_sounds_at_once() {
    let mut score = Score::new(1);
    score.chord(0, 150, &[0, 2, 4]).quarter(0, 230, 2);
    let result = convert(&score.image(), &ConvertOptions::default()).expect("converted");

    assert_eq!(onsets(&result.midi), vec![(0, 64), (0, 67), (0, 71), (480, 67)]);
}

#[test]
fn rest_leaves_silence() {
    let mut score = Score::new(1);
    score.quarter(0, 150, 2).quarter_rest(0, 200).quarter(0, 270, 4);
    let result = convert(&score.image(), &ConvertOptions::default()).expect("converted");

    assert_eq!(onsets(&result.midi), vec![(0, 67), (960, 71)]);
    assert_eq!(result.report.total_ticks, 1440);
}

#[test]
fn key_signature_is_reported() {
    let mut score = Score::new(1);
    score.sharp(0, 30, 8).quarter(0, 150, 1);
    let result = convert(&score.image(), &ConvertOptions::default()).expect("converted");

    assert_eq!(onsets(&result.midi), vec![(0, 66)]);
    assert_eq!(result.report.detected_key_signature, Some(KeySignature::new(1)));
}

#[test]
fn conversion_is_idempotent() {
    let page = scale_page();
    let opts = ConvertOptions::default();
    let a = convert(&page, &opts).expect("converted");
    let b = convert(&page, &opts).expect("converted");
    assert_eq!(a.midi, b.midi);
    assert_eq!(a.report, b.report);
}

#[test]
fn tempo_does_not_move_notes() {
    let page = scale_page();
    let slow = convert(&page, &ConvertOptions { tempo_bpm: 60, ..Default::default() }).expect("slow");
    let fast = convert(&page, &ConvertOptions { tempo_bpm: 180, ..Default::default() }).expect("fast");
    assert_eq!(onsets(&slow.midi), onsets(&fast.midi));
    assert_ne!(slow.midi, fast.midi);
}

#[test]
fn options_from_json() {
    let result = convert_with_json(&scale_page(), r#"{ "tempo_bpm": 90, "velocity": 100 }"#)
        .expect("converted");
    assert_eq!(result.report.total_ticks, 1920);

    let err = convert_with_json(&scale_page(), r#"{ "channel": 16 }"#).unwrap_err();
    assert!(matches!(err, OmrError::InvalidOptions(_)));
}

#[test]
fn settings_that_would_break_playback_are_rejected() {
    // A zero velocity turns every note-on into a note-off
    let err = convert_with_json(&scale_page(), r#"{ "velocity": 0 }"#).unwrap_err();
    assert!(matches!(err, OmrError::InvalidOptions(_)));

    // 60_000_000 / 3 does not fit the three-byte tempo field
    let err = convert(&scale_page(), &ConvertOptions { tempo_bpm: 3, ..Default::default() }).unwrap_err();
    assert!(matches!(err, OmrError::InvalidOptions(_)));

    let slowest = convert(&scale_page(), &ConvertOptions { tempo_bpm: 4, ..Default::default() })
        .expect("converted");
    assert_eq!(onsets(&slowest.midi).len(), 4);
}

// ═══════════════════════════════════════════════════════════════════════
// Multi-staff and multi-page
// ═══════════════════════════════════════════════════════════════════════

fn two_staff_page() -> BinaryImage {
    let mut score = Score::new(2);
    score.quarter(0, 150, 2).quarter(0, 210, 4);
    score.half(1, 150, 0);
    score.image()
}

#[test]
fn staves_read_in_order() {
    let result = convert(&two_staff_page(), &ConvertOptions::default()).expect("converted");
    assert_eq!(onsets(&result.midi), vec![(0, 67), (480, 71), (960, 64)]);
    assert_eq!(result.report.staff_count, 2);
    assert_eq!(result.report.total_ticks, 1920);
}

#[test]
fn staves_played_together() {
    let opts = ConvertOptions { staff_reading: StaffReading::Simultaneous, ..Default::default() };
    let result = convert(&two_staff_page(), &opts).expect("converted");

    let notes = common::heard_notes(&result.midi);
    assert_eq!(
        notes.iter().map(|n| (n.tick, n.key, n.channel)).collect::<Vec<_>>(),
        vec![(0, 64, 1), (0, 67, 0), (480, 71, 0)]
    );
    assert_eq!(result.report.total_ticks, 960);
}

#[test]
fn pages_continue_where_the_last_ended() {
    let pages = [Page::new("p1", scale_page()), Page::new("p2", halves_page())];
    let result = convert_pages(&pages, &ConvertOptions::default()).expect("converted");

    assert_eq!(
        onsets(&result.midi),
        vec![(0, 60), (480, 62), (960, 64), (1440, 65), (1920, 67), (2880, 71)]
    );
    assert_eq!(result.report.total_ticks, 3840);
    assert_eq!(result.report.staff_count, 2);
    println!("✓ two pages, {} ticks", result.report.total_ticks);
}

#[test]
fn page_order_only_shifts_offsets() {
    let opts = ConvertOptions::default();
    let forward = [Page::new("a", scale_page()), Page::new("b", halves_page())];
    let reverse = [Page::new("b", halves_page()), Page::new("a", scale_page())];

    let f = onsets(&convert_pages(&forward, &opts).expect("forward").midi);
    let r = onsets(&convert_pages(&reverse, &opts).expect("reverse").midi);

    // Each page keeps its internal timing; only its origin changes.
    let shift = |notes: &[(u32, u8)], from: u32, by: i64| -> Vec<(i64, u8)> {
        notes
            .iter()
            .filter(|(t, _)| *t >= from)
            .map(|&(t, k)| (t as i64 + by, k))
            .collect()
    };
    assert_eq!(shift(&f[4..], 1920, -1920), shift(&r[..2], 0, 0));
    assert_eq!(shift(&f[..4], 0, 1920), shift(&r[2..], 1920, 0));
}

#[test]
fn single_page_list_matches_convert() {
    let opts = ConvertOptions::default();
    let one = convert(&scale_page(), &opts).expect("convert");
    let many = convert_pages(&[Page::new("only", scale_page())], &opts).expect("convert_pages");
    assert_eq!(one.midi, many.midi);
}

#[test]
fn bad_page_fails_the_score() {
    let pages = [Page::new("p1", scale_page()), Page::new("p2", BinaryImage::new(300, 200))];
    let err = convert_pages(&pages, &ConvertOptions::default()).unwrap_err();
    assert_eq!(err, OmrError::NoStaffDetected);
}

// ═══════════════════════════════════════════════════════════════════════
// Batch
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn batch_survives_a_failing_image() {
    let pages = vec![
        Page::new("scale", scale_page()),
        Page::new("blank", BinaryImage::new(300, 200)),
        Page::new("halves", halves_page()),
    ];
    let items = convert_batch(&pages, &ConvertOptions::default(), 2).expect("pool");

    assert_eq!(items.len(), 3);
    assert_eq!(
        items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        vec!["scale", "blank", "halves"]
    );
    assert_eq!(items[0].result.as_ref().map(|c| c.report.total_ticks), Ok(1920));
    assert_eq!(items[1].result.as_ref().err(), Some(&OmrError::NoStaffDetected));
    assert_eq!(items[2].result.as_ref().map(|c| c.report.total_ticks), Ok(1920));
    println!("✓ batch: 2 converted, 1 failed");
}

#[test]
fn batch_results_match_single_conversions() {
    let pages = vec![Page::new("scale", scale_page()), Page::new("halves", halves_page())];
    let opts = ConvertOptions::default();
    let items = convert_batch(&pages, &opts, 4).expect("pool");

    for (item, page) in items.iter().zip(&pages) {
        let single = convert(&page.image, &opts).expect("single");
        let batched = item.result.as_ref().expect("batched");
        assert_eq!(batched.midi, single.midi, "{}", item.id);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Artifacts
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn artifacts_only_when_asked() {
    let page = scale_page();
    let opts = ConvertOptions { collect_artifacts: true, ..Default::default() };
    let result = convert(&page, &opts).expect("converted");

    assert_eq!(result.artifacts.len(), 1);
    let artifacts = &result.artifacts[0];
    assert_eq!(artifacts.staff_mask.width(), page.width());
    assert!(artifacts.staff_mask.count_ink() > 0);
    assert!(artifacts.staff_mask.count_ink() < page.count_ink());

    let heads = artifacts
        .symbol_boxes
        .iter()
        .filter(|b| b.label == "notehead-filled")
        .count();
    assert_eq!(heads, 4);
    assert!(artifacts.symbol_boxes.iter().any(|b| b.label == "time-signature"));

    // Artifacts never change the music
    let plain = convert(&page, &ConvertOptions::default()).expect("converted");
    assert_eq!(plain.midi, result.midi);
}
