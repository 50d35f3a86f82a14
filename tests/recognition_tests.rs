//! Recognition tests: synthetic pages through the staff, detection and
//! association stages.

mod common;

use pretty_assertions::assert_eq;
use common::{Score, SPACE};
use scorescan::staff::extract_staves;
use scorescan::{
    recognize, ConvertOptions, Duration, KeySignature, MusicalSymbol, OmrError,
    SymbolKind, TimeSignature,
};

fn notes(symbols: &[MusicalSymbol]) -> Vec<&MusicalSymbol> {
    symbols.iter().filter(|s| s.kind == SymbolKind::Note).collect()
}

fn pitches(symbols: &[MusicalSymbol]) -> Vec<i32> {
    notes(symbols).iter().filter_map(|s| s.midi_pitch()).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Staff extraction
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn staves_found_top_to_bottom() {
    let page = Score::new(3).image();
    let staves = extract_staves(&page, &ConvertOptions::default()).expect("three staves");

    assert_eq!(staves.len(), 3);
    for (i, staff) in staves.iter().enumerate() {
        assert_eq!(staff.index, i);
        assert!((staff.space - SPACE as f64).abs() < 0.5, "staff {i} space {}", staff.space);
        assert_eq!(staff.lines[0].row, Score::top(i as u32));
        assert_eq!(staff.lines[0].thickness, 2);
        assert!(staff.x_start <= 20 && staff.x_end >= 570);
    }
    for pair in staves.windows(2) {
        assert!(pair[0].band_bottom <= pair[1].band_top, "bands overlap");
    }
    println!("✓ three staves with 20 px spacing");
}

// ═══════════════════════════════════════════════════════════════════════
// Pitch, duration and signatures
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn scale_with_time_signature() {
    let mut score = Score::new(1);
    score
        .time_signature(0, 70, 4, 4)
        .quarter(0, 150, -2)
        .quarter(0, 210, -1)
        .quarter(0, 270, 0)
        .quarter(0, 330, 1);

    let page = recognize(&score.image(), &ConvertOptions::default()).expect("recognized");

    assert_eq!(pitches(&page.association.symbols), vec![60, 62, 64, 65]);
    assert!(notes(&page.association.symbols)
        .iter()
        .all(|n| n.duration == Some(Duration::Quarter)));
    assert_eq!(
        page.association.time_signature,
        Some(TimeSignature { numerator: 4, denominator: 4 })
    );
    assert_eq!((page.unrecognized, page.ambiguous, page.unresolved), (0, 0, 0));
    println!("✓ C4 D4 E4 F4 in 4/4");
}

#[test]
fn bass_clef_shifts_pitches() {
    let mut score = Score::new(1);
    score.quarter(0, 150, 0).quarter(0, 210, 6);

    let opts = ConvertOptions { clef: scorescan::Clef::Bass, ..Default::default() };
    let page = recognize(&score.image(), &opts).expect("recognized");
    // Bottom line G2, fourth line F3
    assert_eq!(pitches(&page.association.symbols), vec![43, 53]);
}

#[test]
fn key_signature_and_natural_override() {
    let mut score = Score::new(1);
    score
        .sharp(0, 30, 8)
        .quarter(0, 150, 1)
        .natural(0, 210 - 32, 1)
        .quarter(0, 210, 1)
        .quarter(0, 270, 1)
        .quarter(0, 330, 2);

    let page = recognize(&score.image(), &ConvertOptions::default()).expect("recognized");

    assert_eq!(page.association.key_signatures, vec![KeySignature::new(1)]);
    // F#4 from the key, then the natural holds for the rest of the staff
    assert_eq!(pitches(&page.association.symbols), vec![66, 65, 65, 67]);
    assert_eq!(page.unresolved, 0);
    println!("✓ key of G with a local natural");
}

#[test]
fn beams_shorten_notes() {
    let mut score = Score::new(1);
    score
        .beamed(0, &[(150, 2), (210, 4)], 1)
        .beamed(0, &[(290, 2), (350, 4)], 2)
        .quarter(0, 430, 2);

    let page = recognize(&score.image(), &ConvertOptions::default()).expect("recognized");
    let durations: Vec<_> = notes(&page.association.symbols).iter().map(|n| n.duration).collect();
    assert_eq!(
        durations,
        vec![
            Some(Duration::Eighth),
            Some(Duration::Eighth),
            Some(Duration::Sixteenth),
            Some(Duration::Sixteenth),
            Some(Duration::Quarter),
        ]
    );
    assert_eq!(pitches(&page.association.symbols), vec![67, 71, 67, 71, 67]);
    assert_eq!(page.unresolved, 0);
    println!("✓ eighths and sixteenths from beams");
}

#[test]
fn chord_notes_share_a_group() {
    let mut score = Score::new(1);
    score.chord(0, 150, &[0, 2, 4]).quarter(0, 230, 2);

    let page = recognize(&score.image(), &ConvertOptions::default()).expect("recognized");
    let notes = notes(&page.association.symbols);

    assert_eq!(notes.len(), 4);
    let chord: Vec<_> = notes.iter().filter(|n| n.group == notes[0].group).collect();
    assert_eq!(chord.len(), 3);
    // Within a chord, higher pitches come first
    assert_eq!(pitches(&page.association.symbols), vec![71, 67, 64, 67]);
}

#[test]
fn half_whole_and_rest() {
    let mut score = Score::new(1);
    score.half(0, 150, 1).quarter_rest(0, 200).whole(0, 270, 3);

    let page = recognize(&score.image(), &ConvertOptions::default()).expect("recognized");
    let timed: Vec<_> = page
        .association
        .symbols
        .iter()
        .filter(|s| s.is_timed())
        .map(|s| (s.kind, s.duration))
        .collect();
    assert_eq!(
        timed,
        vec![
            (SymbolKind::Note, Some(Duration::Half)),
            (SymbolKind::Rest, Some(Duration::Quarter)),
            (SymbolKind::Note, Some(Duration::Whole)),
        ]
    );
}

#[test]
fn staff_without_notes_fails_the_page() {
    let mut score = Score::new(1);
    score.time_signature(0, 70, 3, 4);
    let err = recognize(&score.image(), &ConvertOptions::default()).unwrap_err();
    assert_eq!(err, OmrError::NoSymbolsDetected);
}

#[test]
fn stray_specks_are_ignored() {
    let mut score = Score::new(1);
    score.quarter(0, 150, 2);
    let mut page = score.image();
    page.set(300, 30, true);
    page.set(301, 150, true);

    let recognized = recognize(&page, &ConvertOptions::default()).expect("recognized");
    assert_eq!(pitches(&recognized.association.symbols), vec![67]);
    assert_eq!(recognized.unrecognized, 0);
}
