//! Symbol detector and classifier.
//!
//! Works per staff on the staff-free image. Every connected component in a
//! staff's band is a note complex (stems carrying noteheads and beams), a
//! clef, or a single glyph that goes through the rule table in
//! [`rules`]. A last pass over the left margin turns leading accidentals
//! into the key signature and stacked digits into the time signature.
//!
//! Staves are independent, so they are processed in parallel and merged
//! back in staff order.

mod constants;
mod glyph;
mod rules;

use rayon::prelude::*;

use crate::bitmap::BinaryImage;
use crate::components::label;
use crate::error::OmrError;
use crate::model::{
    Accidental, BoundingBox, CandidateKind, KeySignature, ShapeDescriptor, Staff,
    SymbolCandidate, TimeSignature,
};

use constants::{ATTACH_MAX_DY, ATTACH_MAX_GAP, FLAT_ANCHOR};
use glyph::Glyph;
use rules::{Piece, Shape, Verdict};

/// Classified candidates of a page, plus what could not be classified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolSet {
    /// In staff order, left to right within a staff
    pub candidates: Vec<SymbolCandidate>,
    /// Shapes that matched no rule
    pub unrecognized: usize,
    /// One `AmbiguousGlyph` per shape that matched a rule only partially
    pub ambiguous: Vec<OmrError>,
}

impl SymbolSet {
    pub fn on_staff(&self, staff: usize) -> impl Iterator<Item = &SymbolCandidate> + '_ {
        self.candidates.iter().filter(move |c| c.staff == staff)
    }

    fn push(&mut self, kind: CandidateKind, bbox: BoundingBox, shape: ShapeDescriptor, staff: usize) {
        self.candidates.push(SymbolCandidate { kind, bbox, shape, staff });
    }

    fn absorb(&mut self, other: SymbolSet) {
        self.candidates.extend(other.candidates);
        self.unrecognized += other.unrecognized;
        self.ambiguous.extend(other.ambiguous);
    }
}

/// Detect and classify the symbols of every staff on a staff-free image.
pub fn detect_symbols(image: &BinaryImage, staves: &[Staff]) -> SymbolSet {
    let per_staff: Vec<SymbolSet> = staves.par_iter().map(|s| detect_staff(image, s)).collect();

    let mut set = SymbolSet::default();
    for staff_set in per_staff {
        set.absorb(staff_set);
    }
    log::debug!(
        "detected {} candidates ({} unrecognized, {} ambiguous) on {} staves",
        set.candidates.len(),
        set.unrecognized,
        set.ambiguous.len(),
        staves.len()
    );
    set
}

fn detect_staff(image: &BinaryImage, staff: &Staff) -> SymbolSet {
    let mut set = SymbolSet::default();
    let mut digits: Vec<(u8, BoundingBox, ShapeDescriptor)> = Vec::new();

    for comp in label(image, staff.band_top..staff.band_bottom) {
        let g = Glyph::new(comp.to_image(), comp.bbox, staff);
        if rules::is_speck(&g) {
            continue;
        }

        if let Some(pieces) = rules::decompose_note_complex(&g) {
            for piece in pieces {
                match piece {
                    Piece::Found(kind, bbox, shape) => set.push(kind, bbox, shape, staff.index),
                    Piece::Ambiguous(msg) => set.ambiguous.push(OmrError::AmbiguousGlyph(msg)),
                    Piece::Unrecognized => set.unrecognized += 1,
                }
            }
            continue;
        }

        if rules::is_clef(&g) {
            set.push(CandidateKind::Clef, g.bbox, g.descriptor(), staff.index);
            continue;
        }

        match rules::classify_glyph(&g) {
            Verdict::Match(Shape::Kind(kind)) => set.push(kind, g.bbox, g.descriptor(), staff.index),
            Verdict::Match(Shape::Digit(d)) => digits.push((d, g.bbox, g.descriptor())),
            Verdict::Ambiguous(msg) => {
                log::trace!("staff {}: {msg}", staff.index);
                set.ambiguous.push(OmrError::AmbiguousGlyph(msg));
            }
            Verdict::NoMatch => {
                log::trace!(
                    "staff {}: unrecognized {}x{} glyph at ({}, {})",
                    staff.index,
                    g.w(),
                    g.h(),
                    g.bbox.x0,
                    g.bbox.y0
                );
                set.unrecognized += 1;
            }
        }
    }

    read_margin(staff, &mut set, digits);
    set.candidates.sort_by_key(|c| (c.bbox.x0, c.bbox.y0));
    set
}

// ═══════════════════════════════════════════════════════════════════════
// Left margin: key and time signatures
// ═══════════════════════════════════════════════════════════════════════

/// Everything left of the first notehead or rest is margin. Accidentals
/// there that do not attach to a notehead form the key signature; digits
/// there form the time signature. Digits anywhere else are dropped.
fn read_margin(staff: &Staff, set: &mut SymbolSet, digits: Vec<(u8, BoundingBox, ShapeDescriptor)>) {
    let margin_end = set
        .candidates
        .iter()
        .filter(|c| matches!(c.kind, CandidateKind::Notehead { .. } | CandidateKind::Rest(_)))
        .map(|c| c.bbox.x0)
        .min()
        .unwrap_or(u32::MAX);
    let heads: Vec<BoundingBox> = set
        .candidates
        .iter()
        .filter(|c| matches!(c.kind, CandidateKind::Notehead { .. }))
        .map(|c| c.bbox)
        .collect();

    let mut key_parts: Vec<(Accidental, BoundingBox, ShapeDescriptor)> = Vec::new();
    set.candidates.retain(|c| match c.kind {
        CandidateKind::Accidental(acc)
            if c.bbox.x1 < margin_end
                && !heads.iter().any(|h| attaches(acc, &c.bbox, h, staff.space)) =>
        {
            key_parts.push((acc, c.bbox, c.shape));
            false
        }
        _ => true,
    });

    if !key_parts.is_empty() {
        let n = key_parts.len();
        let all = |want: Accidental| key_parts.iter().all(|(a, _, _)| *a == want);
        let fifths = if n > 7 {
            None
        } else if all(Accidental::Sharp) {
            Some(n as i8)
        } else if all(Accidental::Flat) {
            Some(-(n as i8))
        } else {
            None
        };
        let (bbox, shape) = merged(key_parts.iter().map(|(_, b, s)| (*b, *s)));
        match fifths {
            Some(fifths) => {
                log::debug!("staff {}: key signature with {fifths} fifths", staff.index);
                set.push(CandidateKind::KeySignature(KeySignature::new(fifths)), bbox, shape, staff.index);
            }
            None => set.ambiguous.push(OmrError::AmbiguousGlyph(format!(
                "staff {}: key signature of {n} mixed or excess accidentals",
                staff.index
            ))),
        }
    }

    let (margin, stray): (Vec<_>, Vec<_>) = digits.into_iter().partition(|(_, b, _)| b.x1 < margin_end);
    if !stray.is_empty() {
        log::trace!("staff {}: {} digits outside the margin", staff.index, stray.len());
        set.unrecognized += stray.len();
    }
    if margin.is_empty() {
        return;
    }

    let middle = staff.middle();
    type Digit = (u8, BoundingBox, ShapeDescriptor);
    let (mut upper, mut lower): (Vec<&Digit>, Vec<&Digit>) =
        margin.iter().partition(|(_, b, _)| b.center_y() < middle);
    upper.sort_by_key(|(_, b, _)| b.x0);
    lower.sort_by_key(|(_, b, _)| b.x0);
    let number = |row: &[&Digit]| -> Option<u32> {
        if row.is_empty() || row.len() > 3 {
            return None;
        }
        Some(row.iter().fold(0u32, |acc, (d, _, _)| acc * 10 + *d as u32))
    };

    let (bbox, shape) = merged(margin.iter().map(|(_, b, s)| (*b, *s)));
    match (number(&upper), number(&lower)) {
        (Some(num), Some(den)) if (1..=255).contains(&num) && den.is_power_of_two() && den <= 32 => {
            let ts = TimeSignature { numerator: num as u8, denominator: den as u8 };
            log::debug!("staff {}: time signature {num}/{den}", staff.index);
            set.push(CandidateKind::TimeSignature(ts), bbox, shape, staff.index);
        }
        (num, den) => set.ambiguous.push(OmrError::AmbiguousGlyph(format!(
            "staff {}: time signature digits read as {num:?}/{den:?}",
            staff.index
        ))),
    }
}

fn merged(parts: impl Iterator<Item = (BoundingBox, ShapeDescriptor)>) -> (BoundingBox, ShapeDescriptor) {
    let mut bbox: Option<BoundingBox> = None;
    let mut area = 0;
    for (b, s) in parts {
        bbox = Some(bbox.map_or(b, |acc| acc.union(&b)));
        area += s.area;
    }
    let bbox = bbox.unwrap_or(BoundingBox { x0: 0, y0: 0, x1: 0, y1: 0 });
    let shape = ShapeDescriptor {
        area,
        aspect_ratio: bbox.width() as f64 / bbox.height() as f64,
        fill_ratio: area as f64 / (bbox.width() * bbox.height()) as f64,
    };
    (bbox, shape)
}

// ═══════════════════════════════════════════════════════════════════════
// Accidental placement (shared with the associator)
// ═══════════════════════════════════════════════════════════════════════

/// Row an accidental refers to. Flats are read at their bowl.
pub(crate) fn accidental_anchor(acc: Accidental, bbox: &BoundingBox) -> f64 {
    match acc {
        Accidental::Flat | Accidental::DoubleFlat => {
            bbox.y0 as f64 + FLAT_ANCHOR * (bbox.height() - 1) as f64
        }
        _ => bbox.center_y(),
    }
}

/// Whether an accidental sits immediately left of a notehead at its height.
pub(crate) fn attaches(acc: Accidental, acc_box: &BoundingBox, head: &BoundingBox, space: f64) -> bool {
    acc_box.center_x() < head.center_x()
        && acc_box.gap_x(head) as f64 <= ATTACH_MAX_GAP * space
        && (accidental_anchor(acc, acc_box) - head.center_y()).abs() <= ATTACH_MAX_DY * space
}
