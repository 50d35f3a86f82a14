//! Classifier thresholds. Lengths are in staff-spaces unless noted.

// ── Noise ───────────────────────────────────────────────────────────
pub(super) const SPECK_MAX: f64 = 0.2; // both dimensions below → ignored

// ── Clef ────────────────────────────────────────────────────────────
pub(super) const CLEF_MIN_HEIGHT: f64 = 4.5;
pub(super) const CLEF_MIN_WIDTH: f64 = 1.0;

// ── Stems & bar lines ───────────────────────────────────────────────
pub(super) const STEM_MIN_LENGTH: f64 = 2.5;
pub(super) const STEM_MAX_WIDTH: f64 = 0.3;
pub(super) const BARLINE_MIN_HEIGHT: f64 = 3.6;
pub(super) const BARLINE_MAX_HEIGHT: f64 = 4.6;

// ── Noteheads ───────────────────────────────────────────────────────
pub(super) const HEAD_MIN_WIDTH: f64 = 0.9;
pub(super) const HEAD_MAX_WIDTH: f64 = 2.0;
pub(super) const HEAD_MIN_HEIGHT: f64 = 0.55;
pub(super) const HEAD_MAX_HEIGHT: f64 = 1.4;
pub(super) const HEAD_MIN_ASPECT: f64 = 1.05; // noteheads are wider than tall
pub(super) const HEAD_MIN_FILL: f64 = 0.3;
pub(super) const STACK_MAX_HEIGHT: f64 = 4.5; // tallest blob split into stacked heads
pub(super) const FILLED_MIN_INTERIOR: f64 = 0.6;
pub(super) const HOLLOW_MAX_INTERIOR: f64 = 0.4;

// ── Beams ───────────────────────────────────────────────────────────
pub(super) const BEAM_MIN_WIDTH: f64 = 1.2;
pub(super) const BEAM_MIN_HEIGHT: f64 = 0.2;
pub(super) const BEAM_MAX_HEIGHT: f64 = 1.5;
pub(super) const BEAM_MIN_ASPECT: f64 = 2.0;
pub(super) const BEAM_MIN_FILL: f64 = 0.5;

// ── Whole / half rest blocks ────────────────────────────────────────
pub(super) const BLOCK_MIN_FILL: f64 = 0.85;
pub(super) const BLOCK_WIDTH: (f64, f64) = (0.6, 1.6);
pub(super) const BLOCK_HEIGHT: (f64, f64) = (0.25, 0.75);

// ── Accidentals ─────────────────────────────────────────────────────
pub(super) const SHARP_HEIGHT: (f64, f64) = (2.0, 3.6);
pub(super) const SHARP_WIDTH: (f64, f64) = (0.6, 1.5);
pub(super) const NATURAL_WIDTH: (f64, f64) = (0.4, 1.2);
pub(super) const FLAT_HEIGHT: (f64, f64) = (1.8, 3.4);
pub(super) const FLAT_WIDTH: (f64, f64) = (0.4, 1.1);
pub(super) const DOUBLE_FLAT_WIDTH: (f64, f64) = (0.9, 2.0);
pub(super) const DOUBLE_SHARP_SIZE: (f64, f64) = (0.6, 1.3);
/// Flats are read at their bowl: this fraction of the glyph height from the top.
pub(super) const FLAT_ANCHOR: f64 = 0.7;

// ── Rests ───────────────────────────────────────────────────────────
pub(super) const QUARTER_REST_HEIGHT: (f64, f64) = (2.0, 3.4);
pub(super) const QUARTER_REST_WIDTH: (f64, f64) = (0.5, 1.3);
pub(super) const QUARTER_REST_FILL: (f64, f64) = (0.15, 0.6);
pub(super) const EIGHTH_REST_HEIGHT: (f64, f64) = (1.1, 2.2);
pub(super) const EIGHTH_REST_WIDTH: (f64, f64) = (0.5, 1.3);

// ── Digits ──────────────────────────────────────────────────────────
pub(super) const DIGIT_HEIGHT: (f64, f64) = (1.4, 2.6);
pub(super) const DIGIT_WIDTH: (f64, f64) = (0.7, 1.8);
pub(super) const DIGIT_MAX_DISTANCE: u32 = 2;

// ── Accidental → notehead attachment ────────────────────────────────
pub(super) const ATTACH_MAX_GAP: f64 = 1.5; // accidental → notehead
pub(super) const ATTACH_MAX_DY: f64 = 0.6;
