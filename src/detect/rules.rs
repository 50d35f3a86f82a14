//! Shape rules.
//!
//! Two entry points: [`decompose_note_complex`] splits a component that
//! contains stems into stems, noteheads and beams; [`classify_glyph`]
//! runs a whole glyph through the prioritized rule table. Rules only look
//! at geometry measured in staff-spaces; the first rule that answers wins.

use crate::components::label;
use crate::model::{Accidental, BoundingBox, CandidateKind, Duration, ShapeDescriptor};

use super::constants::*;
use super::glyph::{Glyph, Stroke};

/// Result of classifying one shape.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Shape {
    Kind(CandidateKind),
    Digit(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Verdict {
    NoMatch,
    Match(Shape),
    Ambiguous(String),
}

/// One piece of a decomposed note complex.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Piece {
    Found(CandidateKind, BoundingBox, ShapeDescriptor),
    Ambiguous(String),
    Unrecognized,
}

type Rule = fn(&Glyph) -> Verdict;

/// Priority order matters: earlier rules shadow later ones.
const RULES: &[(&str, Rule)] = &[
    ("barline", barline),
    ("double-sharp", double_sharp),
    ("rest-block", rest_block),
    ("notehead", notehead),
    ("sharp", sharp),
    ("natural", natural),
    ("flat", flat),
    ("double-flat", double_flat),
    ("quarter-rest", quarter_rest),
    ("eighth-rest", eighth_rest),
    ("digit", digit),
    ("stem", lone_stem),
];

pub(super) fn classify_glyph(g: &Glyph) -> Verdict {
    for (name, rule) in RULES {
        let verdict = rule(g);
        if verdict != Verdict::NoMatch {
            log::trace!("glyph at ({}, {}) -> {name}: {verdict:?}", g.bbox.x0, g.bbox.y0);
            return verdict;
        }
    }
    Verdict::NoMatch
}

pub(super) fn is_speck(g: &Glyph) -> bool {
    g.wu() < SPECK_MAX && g.hu() < SPECK_MAX
}

pub(super) fn is_clef(g: &Glyph) -> bool {
    g.hu() >= CLEF_MIN_HEIGHT && g.wu() >= CLEF_MIN_WIDTH
}

fn stem_max_px(g: &Glyph) -> f64 {
    (STEM_MAX_WIDTH * g.staff.space).max(2.0).ceil()
}

fn is_thin(g: &Glyph) -> bool {
    g.w() as f64 <= stem_max_px(g)
}

// ═══════════════════════════════════════════════════════════════════════
// Note complexes
// ═══════════════════════════════════════════════════════════════════════

/// Split a component into stems, noteheads and beams. `None` when the
/// component has no stem or no notehead hangs off its stems, in which case
/// the caller classifies it as a whole glyph.
pub(super) fn decompose_note_complex(g: &Glyph) -> Option<Vec<Piece>> {
    let max_w = stem_max_px(g);
    let stems: Vec<Stroke> = g
        .strokes(STEM_MIN_LENGTH * g.staff.space)
        .into_iter()
        .filter(|s| s.width() as f64 <= max_w)
        .collect();
    if stems.is_empty() {
        return None;
    }

    // Remove stem pixels, but only on rows where the stem stands alone.
    let mut residual = g.image.clone();
    for s in &stems {
        for x in s.x0..=s.x1 {
            for y in s.y0..=s.y1 {
                if g.image.get(x, y) && g.image.horizontal_run_len(x, y) as f64 <= max_w + 2.0 {
                    residual.set(x, y, false);
                }
            }
        }
    }

    let mut pieces = Vec::new();
    let mut head_count = 0;
    for part in label(&residual, 0..residual.height()) {
        let bbox = part.bbox.offset(g.bbox.x0, g.bbox.y0);
        let pg = Glyph::new(part.to_image(), bbox, g.staff);
        if is_speck(&pg) {
            continue;
        }
        if is_head_shape(&pg) {
            head_count += 1;
            pieces.push(head_piece(&pg));
        } else if is_stacked_heads(&pg) {
            for slab in split_stack(&pg) {
                head_count += 1;
                pieces.push(head_piece(&slab));
            }
        } else if is_beam_shape(&pg) && spanned_stems(&part.bbox, &stems) >= 2 {
            pieces.push(Piece::Found(CandidateKind::Beam, bbox, pg.descriptor()));
        } else {
            log::trace!("unrecognized part in note complex at ({}, {})", bbox.x0, bbox.y0);
            pieces.push(Piece::Unrecognized);
        }
    }
    if head_count == 0 {
        return None;
    }

    for s in &stems {
        let local = BoundingBox { x0: s.x0, y0: s.y0, x1: s.x1, y1: s.y1 };
        let sg = Glyph::new(g.image.crop(&local), local.offset(g.bbox.x0, g.bbox.y0), g.staff);
        pieces.push(Piece::Found(CandidateKind::Stem, sg.bbox, sg.descriptor()));
    }
    Some(pieces)
}

fn head_piece(g: &Glyph) -> Piece {
    match head_fill(g) {
        Some(filled) => Piece::Found(CandidateKind::Notehead { filled }, g.bbox, g.descriptor()),
        None => Piece::Ambiguous(format!(
            "notehead at ({}, {}) is neither filled nor hollow",
            g.bbox.x0, g.bbox.y0
        )),
    }
}

pub(super) fn is_head_shape(g: &Glyph) -> bool {
    g.width_in((HEAD_MIN_WIDTH, HEAD_MAX_WIDTH))
        && g.height_in((HEAD_MIN_HEIGHT, HEAD_MAX_HEIGHT))
        && g.descriptor().aspect_ratio >= HEAD_MIN_ASPECT
        && g.fill() >= HEAD_MIN_FILL
}

/// `Some(true)` filled, `Some(false)` hollow, `None` undecidable.
fn head_fill(g: &Glyph) -> Option<bool> {
    let interior = g.region_fill(0.3, 0.3, 0.7, 0.7);
    if interior >= FILLED_MIN_INTERIOR {
        Some(true)
    } else if interior <= HOLLOW_MAX_INTERIOR {
        Some(false)
    } else {
        None
    }
}

fn is_stacked_heads(g: &Glyph) -> bool {
    g.width_in((HEAD_MIN_WIDTH, HEAD_MAX_WIDTH))
        && g.hu() > HEAD_MAX_HEIGHT
        && g.hu() <= STACK_MAX_HEIGHT
        && g.fill() >= HEAD_MIN_FILL
}

/// Cut a column of touching noteheads into one slab per staff-space.
fn split_stack<'a>(g: &Glyph<'a>) -> Vec<Glyph<'a>> {
    let n = (g.hu().round() as u32).max(2);
    let h = g.h();
    (0..n)
        .map(|i| {
            let local = BoundingBox {
                x0: 0,
                y0: i * h / n,
                x1: g.w() - 1,
                y1: ((i + 1) * h / n).max(i * h / n + 1) - 1,
            };
            Glyph::new(
                g.image.crop(&local),
                local.offset(g.bbox.x0, g.bbox.y0),
                g.staff,
            )
        })
        .collect()
}

fn is_beam_shape(g: &Glyph) -> bool {
    g.wu() >= BEAM_MIN_WIDTH
        && g.height_in((BEAM_MIN_HEIGHT, BEAM_MAX_HEIGHT))
        && g.descriptor().aspect_ratio >= BEAM_MIN_ASPECT
        && g.fill() >= BEAM_MIN_FILL
}

/// Stems whose center column falls inside a glyph-local box.
fn spanned_stems(local: &BoundingBox, stems: &[Stroke]) -> usize {
    stems
        .iter()
        .filter(|s| {
            let cx = s.center_x();
            cx + 2.0 >= local.x0 as f64 && cx <= local.x1 as f64 + 2.0
        })
        .count()
}

// ═══════════════════════════════════════════════════════════════════════
// Whole-glyph rules
// ═══════════════════════════════════════════════════════════════════════

fn found(kind: CandidateKind) -> Verdict {
    Verdict::Match(Shape::Kind(kind))
}

fn barline(g: &Glyph) -> Verdict {
    let staff = g.staff;
    let spans_staff = (g.bbox.y0 as f64 - staff.top()).abs() <= 0.5 * staff.space
        && (g.bbox.y1 as f64 - staff.bottom()).abs() <= 0.5 * staff.space;
    if is_thin(g)
        && g.height_in((BARLINE_MIN_HEIGHT, BARLINE_MAX_HEIGHT))
        && spans_staff
        && g.fill() >= 0.8
    {
        found(CandidateKind::BarLine)
    } else {
        Verdict::NoMatch
    }
}

fn notehead(g: &Glyph) -> Verdict {
    if !is_head_shape(g) {
        return Verdict::NoMatch;
    }
    match head_fill(g) {
        Some(filled) => found(CandidateKind::Notehead { filled }),
        None => Verdict::Ambiguous(format!(
            "stemless notehead at ({}, {}) is neither filled nor hollow",
            g.bbox.x0, g.bbox.y0
        )),
    }
}

/// Whole rest hangs from the second line, half rest sits on the middle line.
fn rest_block(g: &Glyph) -> Verdict {
    if g.fill() < BLOCK_MIN_FILL || !g.width_in(BLOCK_WIDTH) || !g.height_in(BLOCK_HEIGHT) {
        return Verdict::NoMatch;
    }
    let lines = &g.staff.lines;
    let hang = (g.bbox.y0 as f64 - lines[1].row as f64).abs();
    let sit = (g.bbox.y1 as f64 - lines[2].bottom_row() as f64).abs();
    if hang.min(sit) > 0.5 * g.staff.space {
        return Verdict::NoMatch;
    }
    let duration = if hang < sit { Duration::Whole } else { Duration::Half };
    found(CandidateKind::Rest(duration))
}

fn sharp(g: &Glyph) -> Verdict {
    if !g.height_in(SHARP_HEIGHT) || !g.width_in(SHARP_WIDTH) {
        return Verdict::NoMatch;
    }
    let h = g.h() as f64;
    let strokes = g.strokes(0.6 * h);
    if strokes.len() == 2
        && (strokes[0].y0 as f64 - strokes[1].y0 as f64).abs() <= 0.1 * h
        && g.bars(0.6 * g.w() as f64) >= 2
    {
        found(CandidateKind::Accidental(Accidental::Sharp))
    } else {
        Verdict::NoMatch
    }
}

/// Two offset strokes: the left one reaches higher, the right one lower.
fn natural(g: &Glyph) -> Verdict {
    if !g.height_in(SHARP_HEIGHT) || !g.width_in(NATURAL_WIDTH) {
        return Verdict::NoMatch;
    }
    let h = g.h() as f64;
    let strokes = g.strokes(0.45 * h);
    if strokes.len() != 2 {
        return Verdict::NoMatch;
    }
    let (left, right) = (strokes[0], strokes[1]);
    if right.y0 as f64 - left.y0 as f64 >= 0.15 * h && right.y1 as f64 - left.y1 as f64 >= 0.15 * h {
        found(CandidateKind::Accidental(Accidental::Natural))
    } else {
        Verdict::NoMatch
    }
}

fn bottom_heavy(g: &Glyph) -> bool {
    g.region_fill(0.0, 0.5, 1.0, 1.0) > 1.5 * g.region_fill(0.0, 0.0, 1.0, 0.5)
}

/// One tall stroke on the left, a bowl on its lower half.
fn flat(g: &Glyph) -> Verdict {
    if !g.height_in(FLAT_HEIGHT) || !g.width_in(FLAT_WIDTH) {
        return Verdict::NoMatch;
    }
    let strokes = g.strokes(0.6 * g.h() as f64);
    if strokes.len() == 1 && strokes[0].x1 as f64 <= 0.45 * g.w() as f64 && bottom_heavy(g) {
        found(CandidateKind::Accidental(Accidental::Flat))
    } else {
        Verdict::NoMatch
    }
}

fn double_flat(g: &Glyph) -> Verdict {
    if !g.height_in(FLAT_HEIGHT) || !g.width_in(DOUBLE_FLAT_WIDTH) {
        return Verdict::NoMatch;
    }
    let h = g.h() as f64;
    let strokes = g.strokes(0.6 * h);
    if strokes.len() == 2
        && (strokes[0].y0 as f64 - strokes[1].y0 as f64).abs() <= 0.1 * h
        && g.bars(0.8 * g.w() as f64) == 0
        && bottom_heavy(g)
    {
        found(CandidateKind::Accidental(Accidental::DoubleFlat))
    } else {
        Verdict::NoMatch
    }
}

/// An X: ink in the corners and center, paper at the edge midpoints.
fn double_sharp(g: &Glyph) -> Verdict {
    let aspect = g.descriptor().aspect_ratio;
    if !g.width_in(DOUBLE_SHARP_SIZE) || !g.height_in(DOUBLE_SHARP_SIZE) || !(0.75..=1.33).contains(&aspect) {
        return Verdict::NoMatch;
    }
    let z = g.zones(3, 3);
    let corners = [z[0], z[2], z[6], z[8]].iter().all(|&f| f >= 0.3);
    let edges = [z[1], z[3], z[5], z[7]].iter().all(|&f| f <= 0.25);
    if corners && edges && z[4] >= 0.3 {
        found(CandidateKind::Accidental(Accidental::DoubleSharp))
    } else {
        Verdict::NoMatch
    }
}

/// Zig-zag: tall, narrow, no long vertical stroke.
fn quarter_rest(g: &Glyph) -> Verdict {
    if g.height_in(QUARTER_REST_HEIGHT)
        && g.width_in(QUARTER_REST_WIDTH)
        && (QUARTER_REST_FILL.0..=QUARTER_REST_FILL.1).contains(&g.fill())
        && (g.longest_column_run_len() as f64) < 0.5 * g.h() as f64
    {
        found(CandidateKind::Rest(Duration::Quarter))
    } else {
        Verdict::NoMatch
    }
}

/// Blob at the top, slanted tail below.
fn eighth_rest(g: &Glyph) -> Verdict {
    if g.height_in(EIGHTH_REST_HEIGHT)
        && g.width_in(EIGHTH_REST_WIDTH)
        && (g.longest_column_run_len() as f64) < 0.5 * g.h() as f64
        && g.region_fill(0.0, 0.0, 1.0, 1.0 / 3.0) >= 1.5 * g.region_fill(0.0, 2.0 / 3.0, 1.0, 1.0)
    {
        found(CandidateKind::Rest(Duration::Eighth))
    } else {
        Verdict::NoMatch
    }
}

/// 5×3 zone signatures of the engraved digits, row-major.
const DIGIT_SIGNATURES: [[u8; 15]; 10] = [
    [1, 1, 1, 1, 0, 1, 1, 0, 1, 1, 0, 1, 1, 1, 1],
    [0, 1, 0, 1, 1, 0, 0, 1, 0, 0, 1, 0, 1, 1, 1],
    [1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 0, 0, 1, 1, 1],
    [1, 1, 1, 0, 0, 1, 1, 1, 1, 0, 0, 1, 1, 1, 1],
    [1, 0, 1, 1, 0, 1, 1, 1, 1, 0, 0, 1, 0, 0, 1],
    [1, 1, 1, 1, 0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 0, 0, 1, 1, 1, 1, 0, 1, 1, 1, 1],
    [1, 1, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1],
    [1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0, 1, 1, 1, 1],
];

fn digit(g: &Glyph) -> Verdict {
    if !g.height_in(DIGIT_HEIGHT) || !g.width_in(DIGIT_WIDTH) {
        return Verdict::NoMatch;
    }
    let bits: Vec<u8> = g.zones(5, 3).iter().map(|&f| u8::from(f >= 0.5)).collect();
    let distances: Vec<u32> = DIGIT_SIGNATURES
        .iter()
        .map(|sig| sig.iter().zip(&bits).filter(|(a, b)| a != b).count() as u32)
        .collect();
    let best = distances.iter().copied().min().unwrap_or(u32::MAX);
    let winners: Vec<usize> = (0..10).filter(|&d| distances[d] == best).collect();

    if best > DIGIT_MAX_DISTANCE {
        Verdict::NoMatch
    } else if winners.len() > 1 || best == DIGIT_MAX_DISTANCE {
        Verdict::Ambiguous(format!(
            "digit at ({}, {}) matches {:?} at distance {best}",
            g.bbox.x0, g.bbox.y0, winners
        ))
    } else {
        Verdict::Match(Shape::Digit(winners[0] as u8))
    }
}

/// A stem standing on its own, e.g. detached from its notehead.
fn lone_stem(g: &Glyph) -> Verdict {
    if is_thin(g) && g.hu() >= STEM_MIN_LENGTH {
        found(CandidateKind::Stem)
    } else {
        Verdict::NoMatch
    }
}
