//! Symbol associator.
//!
//! Turns classified candidates into musical symbols: noteheads are hung on
//! stems, stems counted against beams, local accidentals attached to the
//! notehead they precede, and every notehead given a pitch from the clef,
//! the staff's key signature and the accidentals seen so far on the staff.
//!
//! Candidates that cannot be placed are dropped and reported through
//! [`Association::unresolved`] and [`Association::ambiguous`]; they never
//! stop the page.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::config::ConvertOptions;
use crate::detect::{attaches, SymbolSet};
use crate::error::OmrError;
use crate::model::{
    Accidental, BoundingBox, CandidateKind, Duration, KeySignature, MusicalSymbol, Pitch, Staff,
    Step, SymbolCandidate, SymbolKind, TimeSignature,
};

/// Horizontal reach between a notehead and its stem, and between a beam's
/// ends and the stems it covers, in staff-spaces.
const STEM_REACH: f64 = 0.35;
/// Vertical slack when testing a notehead center against a stem's extent.
const STEM_SLACK: f64 = 0.5;

/// Musical symbols of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// Sorted by (staff, x, pitch descending)
    pub symbols: Vec<MusicalSymbol>,
    /// `UnresolvedAssociation` for every dropped stem, beam or accidental
    pub unresolved: Vec<OmrError>,
    /// `AmbiguousGlyph` for every notehead whose duration is undefined
    pub ambiguous: Vec<OmrError>,
    /// First time signature found on the page
    pub time_signature: Option<TimeSignature>,
    /// Key signature in force on each staff, by staff index
    pub key_signatures: Vec<KeySignature>,
}

/// Accidentals in force while walking a staff left to right.
#[derive(Debug, Clone)]
struct AccidentalState {
    key: KeySignature,
    overrides: [Option<Accidental>; 7],
}

impl AccidentalState {
    fn new(key: KeySignature) -> Self {
        Self { key, overrides: [None; 7] }
    }

    /// Record a printed accidental (if any) and return the one in force.
    /// A printed accidental holds for its letter in every octave until the
    /// end of the staff.
    fn resolve(&mut self, step: Step, printed: Option<Accidental>) -> Accidental {
        if let Some(acc) = printed {
            self.overrides[step.index()] = Some(acc);
        }
        self.overrides[step.index()].unwrap_or_else(|| self.key.accidental_for(step))
    }
}

/// Associate the candidates of every staff.
pub fn associate(staves: &[Staff], set: &SymbolSet, options: &ConvertOptions) -> Association {
    let mut out = Association::default();
    let mut next_group = 0;

    for staff in staves {
        let candidates: Vec<&SymbolCandidate> = set.on_staff(staff.index).collect();
        let key = candidates
            .iter()
            .find_map(|c| match c.kind {
                CandidateKind::KeySignature(k) => Some(k),
                _ => None,
            })
            .unwrap_or_default();
        out.key_signatures.push(key);
        if out.time_signature.is_none() {
            out.time_signature = candidates.iter().find_map(|c| match c.kind {
                CandidateKind::TimeSignature(ts) => Some(ts),
                _ => None,
            });
        }

        associate_staff(staff, &candidates, key, options, &mut next_group, &mut out);
    }

    out.symbols.sort_by(|a, b| {
        a.staff
            .cmp(&b.staff)
            .then(a.x.total_cmp(&b.x))
            .then_with(|| Reverse(a.midi_pitch()).cmp(&Reverse(b.midi_pitch())))
    });
    log::debug!(
        "associated {} symbols ({} unresolved, {} ambiguous)",
        out.symbols.len(),
        out.unresolved.len(),
        out.ambiguous.len()
    );
    out
}

fn associate_staff(
    staff: &Staff,
    candidates: &[&SymbolCandidate],
    key: KeySignature,
    options: &ConvertOptions,
    next_group: &mut usize,
    out: &mut Association,
) {
    let space = staff.space;
    let heads = of_kind(candidates, |k| matches!(k, CandidateKind::Notehead { .. }));
    let stems = of_kind(candidates, |k| matches!(k, CandidateKind::Stem));
    let beams = of_kind(candidates, |k| matches!(k, CandidateKind::Beam));

    // Notehead → stem.
    let head_stem: Vec<Option<usize>> = heads
        .iter()
        .map(|h| nearest_stem(&h.bbox, &stems, space))
        .collect();
    for (i, stem) in stems.iter().enumerate() {
        if !head_stem.contains(&Some(i)) {
            out.unresolved.push(OmrError::UnresolvedAssociation(format!(
                "staff {}: stem at x={} has no notehead",
                staff.index, stem.bbox.x0
            )));
        }
    }

    // Beam → stems.
    let mut beam_count = vec![0usize; stems.len()];
    for beam in &beams {
        let spanned: Vec<usize> = (0..stems.len())
            .filter(|&i| beam_spans(&beam.bbox, &stems[i].bbox, space))
            .collect();
        if spanned.len() < 2 {
            out.unresolved.push(OmrError::UnresolvedAssociation(format!(
                "staff {}: beam at x={} spans {} stem(s)",
                staff.index,
                beam.bbox.x0,
                spanned.len()
            )));
            continue;
        }
        for i in spanned {
            beam_count[i] += 1;
        }
        out.symbols.push(symbol(SymbolKind::Beam, beam.bbox.center_x(), staff.index));
    }

    // Local accidental → notehead.
    let mut printed: HashMap<usize, Accidental> = HashMap::new();
    for c in candidates {
        let CandidateKind::Accidental(acc) = c.kind else {
            continue;
        };
        let target = heads
            .iter()
            .enumerate()
            .filter(|(_, h)| attaches(acc, &c.bbox, &h.bbox, space))
            .min_by_key(|(_, h)| c.bbox.gap_x(&h.bbox))
            .map(|(i, _)| i);
        match target {
            Some(i) => {
                printed.insert(i, acc);
                let mut sym = symbol(SymbolKind::Accidental, c.bbox.center_x(), staff.index);
                sym.accidental = acc;
                out.symbols.push(sym);
            }
            None => out.unresolved.push(OmrError::UnresolvedAssociation(format!(
                "staff {}: {acc:?} at x={} precedes no notehead",
                staff.index, c.bbox.x0
            ))),
        }
    }

    // Signatures and rests pass through.
    for c in candidates {
        let sym = match c.kind {
            CandidateKind::Rest(d) => {
                let mut s = symbol(SymbolKind::Rest, c.bbox.center_x(), staff.index);
                s.duration = Some(d);
                s
            }
            CandidateKind::KeySignature(_) => symbol(SymbolKind::KeySignature, c.bbox.center_x(), staff.index),
            CandidateKind::TimeSignature(_) => symbol(SymbolKind::TimeSignature, c.bbox.center_x(), staff.index),
            _ => continue,
        };
        out.symbols.push(sym);
    }

    // Notes, walked left to right (top to bottom within a chord) so the
    // accidental state sees them in reading order.
    let mut order: Vec<usize> = (0..heads.len()).collect();
    order.sort_by(|&a, &b| {
        heads[a]
            .bbox
            .center_x()
            .total_cmp(&heads[b].bbox.center_x())
            .then(heads[a].bbox.y0.cmp(&heads[b].bbox.y0))
    });

    let stem_groups: Vec<usize> = (0..stems.len())
        .map(|_| {
            *next_group += 1;
            *next_group - 1
        })
        .collect();

    // Stemless hollow heads stacked within the chord tolerance share a group.
    let reach = options.chord_tolerance * space;
    let mut stemless_groups: HashMap<usize, usize> = HashMap::new();
    let mut anchor: Option<f64> = None;
    for &i in order.iter().filter(|&&i| {
        head_stem[i].is_none() && matches!(heads[i].kind, CandidateKind::Notehead { filled: false })
    }) {
        let cx = heads[i].bbox.center_x();
        if !anchor.is_some_and(|a| cx - a <= reach) {
            anchor = Some(cx);
            *next_group += 1;
        }
        stemless_groups.insert(i, *next_group - 1);
    }

    let mut state = AccidentalState::new(key);
    let mut seen: HashMap<usize, Vec<i32>> = HashMap::new();

    for i in order {
        let head = heads[i];
        let CandidateKind::Notehead { filled } = head.kind else {
            continue;
        };
        let stem = head_stem[i];
        let duration = match (filled, stem) {
            (false, None) => Duration::Whole,
            (false, Some(_)) => Duration::Half,
            (true, Some(s)) => match beam_count[s] {
                0 => Duration::Quarter,
                1 => Duration::Eighth,
                _ => Duration::Sixteenth,
            },
            (true, None) => {
                out.ambiguous.push(OmrError::AmbiguousGlyph(format!(
                    "staff {}: filled notehead at x={} has no stem",
                    staff.index, head.bbox.x0
                )));
                continue;
            }
        };

        let diatonic = options.clef.bottom_line() + staff.step_at(head.bbox.center_y());
        let step = Step::from_index(diatonic);
        let effective = state.resolve(step, printed.get(&i).copied());
        let pitch = Pitch::from_diatonic(diatonic, effective.alter());

        let group = stem.map(|s| stem_groups[s]).or_else(|| stemless_groups.get(&i).copied());
        if let Some(g) = group {
            let pitches = seen.entry(g).or_default();
            if pitches.contains(&pitch.to_midi()) {
                log::trace!("staff {}: duplicate {pitch} in chord dropped", staff.index);
                continue;
            }
            pitches.push(pitch.to_midi());
        }

        out.symbols.push(MusicalSymbol {
            kind: SymbolKind::Note,
            x: head.bbox.center_x(),
            duration: Some(duration),
            pitch: Some(pitch),
            accidental: effective,
            staff: staff.index,
            group,
        });
    }
}

fn of_kind<'a>(
    candidates: &[&'a SymbolCandidate],
    pred: fn(&CandidateKind) -> bool,
) -> Vec<&'a SymbolCandidate> {
    candidates.iter().copied().filter(|c| pred(&c.kind)).collect()
}

fn symbol(kind: SymbolKind, x: f64, staff: usize) -> MusicalSymbol {
    MusicalSymbol {
        kind,
        x,
        duration: None,
        pitch: None,
        accidental: Accidental::None,
        staff,
        group: None,
    }
}

/// Closest stem beside the notehead whose vertical extent covers its center.
fn nearest_stem(head: &BoundingBox, stems: &[&SymbolCandidate], space: f64) -> Option<usize> {
    let cy = head.center_y();
    stems
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            head.gap_x(&s.bbox) as f64 <= STEM_REACH * space
                && cy >= s.bbox.y0 as f64 - STEM_SLACK * space
                && cy <= s.bbox.y1 as f64 + STEM_SLACK * space
        })
        .min_by(|(_, a), (_, b)| {
            let da = (a.bbox.center_x() - head.center_x()).abs();
            let db = (b.bbox.center_x() - head.center_x()).abs();
            da.total_cmp(&db)
        })
        .map(|(i, _)| i)
}

fn beam_spans(beam: &BoundingBox, stem: &BoundingBox, space: f64) -> bool {
    let reach = STEM_REACH * space;
    let cx = stem.center_x();
    cx >= beam.x0 as f64 - reach
        && cx <= beam.x1 as f64 + reach
        && stem.y0 <= beam.y1
        && stem.y1 >= beam.y0
}
