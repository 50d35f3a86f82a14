//! Data model shared by every pipeline stage.
//!
//! Geometry (staves, bounding boxes, candidates) comes first, then the
//! musical vocabulary (pitches, durations, signatures) and finally the
//! timed events handed to the MIDI writer.

use std::fmt;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════════════════

/// One horizontal staff line as found in the projection profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaffLine {
    /// Top pixel row of the line
    pub row: u32,
    /// Line thickness in pixel rows
    pub thickness: u32,
}

impl StaffLine {
    /// Vertical center of the line (may fall between two rows).
    pub fn center(&self) -> f64 {
        self.row as f64 + (self.thickness.max(1) - 1) as f64 / 2.0
    }

    /// Last pixel row covered by the line.
    pub fn bottom_row(&self) -> u32 {
        self.row + self.thickness.max(1) - 1
    }
}

/// A five-line staff. Created once per image and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    /// Position of the staff on the page, top to bottom (0-based)
    pub index: usize,
    /// The five lines, top to bottom
    pub lines: [StaffLine; 5],
    /// Staff-space: median distance between adjacent line centers
    pub space: f64,
    /// First column with ink on the middle line
    pub x_start: u32,
    /// Last column with ink on the middle line
    pub x_end: u32,
    /// First pixel row of the symbol search band
    pub band_top: u32,
    /// One past the last pixel row of the symbol search band
    pub band_bottom: u32,
}

impl Staff {
    pub fn top(&self) -> f64 {
        self.lines[0].center()
    }

    pub fn bottom(&self) -> f64 {
        self.lines[4].center()
    }

    pub fn middle(&self) -> f64 {
        self.lines[2].center()
    }

    /// Diatonic step of a vertical position, counted in half staff-spaces
    /// upward from the bottom line (bottom line = 0, first space = 1, ...).
    pub fn step_at(&self, y: f64) -> i32 {
        ((self.bottom() - y) / (self.space / 2.0)).round() as i32
    }
}

/// Inclusive pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }

    pub fn center_x(&self) -> f64 {
        (self.x0 + self.x1) as f64 / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.y0 + self.y1) as f64 / 2.0
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Horizontal distance between the boxes, 0 when they overlap.
    pub fn gap_x(&self, other: &BoundingBox) -> u32 {
        if other.x0 > self.x1 {
            other.x0 - self.x1
        } else if self.x0 > other.x1 {
            self.x0 - other.x1
        } else {
            0
        }
    }

    /// Shift by an offset (crop-local to page coordinates).
    pub fn offset(&self, dx: u32, dy: u32) -> BoundingBox {
        BoundingBox {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }
}

/// Scale-free shape summary of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    /// Ink pixel count
    pub area: u32,
    /// width / height
    pub aspect_ratio: f64,
    /// area / (width * height)
    pub fill_ratio: f64,
}

/// What the classifier decided a candidate is, with kind-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CandidateKind {
    Notehead { filled: bool },
    Stem,
    Beam,
    Accidental(Accidental),
    Rest(Duration),
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    BarLine,
    Clef,
}

impl CandidateKind {
    /// Short label used for debug artifacts.
    pub fn label(&self) -> &'static str {
        match self {
            CandidateKind::Notehead { filled: true } => "notehead-filled",
            CandidateKind::Notehead { filled: false } => "notehead-hollow",
            CandidateKind::Stem => "stem",
            CandidateKind::Beam => "beam",
            CandidateKind::Accidental(_) => "accidental",
            CandidateKind::Rest(_) => "rest",
            CandidateKind::TimeSignature(_) => "time-signature",
            CandidateKind::KeySignature(_) => "key-signature",
            CandidateKind::BarLine => "barline",
            CandidateKind::Clef => "clef",
        }
    }
}

/// A classified shape awaiting association. Transient: dropped after the
/// associator has turned it into musical symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolCandidate {
    pub kind: CandidateKind,
    /// Page coordinates
    pub bbox: BoundingBox,
    pub shape: ShapeDescriptor,
    /// Index of the owning staff
    pub staff: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// Musical vocabulary
// ═══════════════════════════════════════════════════════════════════════

/// Note letter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub const ALL: [Step; 7] = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];

    /// Letter for a diatonic index (0 = C). Wraps modulo 7.
    pub fn from_index(index: i32) -> Step {
        Step::ALL[index.rem_euclid(7) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Semitones above C.
    pub fn semitone(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }
}

/// Pitch of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub step: Step,
    /// Octave number (middle C = C4)
    pub octave: i32,
    /// Chromatic alteration in semitones: -1 = flat, 1 = sharp
    pub alter: i32,
}

impl Pitch {
    /// Pitch at a diatonic number (octave * 7 + letter index).
    pub fn from_diatonic(diatonic: i32, alter: i32) -> Self {
        Self {
            step: Step::from_index(diatonic),
            octave: diatonic.div_euclid(7),
            alter,
        }
    }

    /// Convert pitch to MIDI note number.
    /// Middle C (C4) = 60.
    pub fn to_midi(&self) -> i32 {
        (self.octave + 1) * 12 + self.step.semitone() + self.alter
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alter = match self.alter {
            2 => "##",
            1 => "#",
            -1 => "b",
            -2 => "bb",
            _ => "",
        };
        write!(f, "{:?}{}{}", self.step, alter, self.octave)
    }
}

/// Clef used to map staff positions to pitches. Supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    #[default]
    Treble,
    Bass,
}

impl Clef {
    /// Diatonic number of the bottom staff line: E4 for treble, G2 for bass.
    pub fn bottom_line(self) -> i32 {
        match self {
            Clef::Treble => 4 * 7 + Step::E as i32,
            Clef::Bass => 2 * 7 + Step::G as i32,
        }
    }
}

/// Accidental sign, either printed or implied by the key signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Accidental {
    #[default]
    None,
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

impl Accidental {
    /// Semitone alteration.
    pub fn alter(self) -> i32 {
        match self {
            Accidental::None | Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
            Accidental::DoubleSharp => 2,
            Accidental::DoubleFlat => -2,
        }
    }
}

/// Notated duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duration {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl Duration {
    /// Length in ticks at `ppq` pulses per quarter note.
    pub fn ticks(self, ppq: u16) -> u32 {
        let q = ppq as u32;
        match self {
            Duration::Whole => q * 4,
            Duration::Half => q * 2,
            Duration::Quarter => q,
            Duration::Eighth => q / 2,
            Duration::Sixteenth => q / 4,
        }
    }
}

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Numerator (e.g., 3 in 3/4)
    pub numerator: u8,
    /// Denominator (e.g., 4 in 3/4)
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    /// Ticks in one measure.
    pub fn measure_ticks(&self, ppq: u16) -> u32 {
        self.numerator as u32 * ppq as u32 * 4 / self.denominator.max(1) as u32
    }
}

const SHARP_ORDER: [Step; 7] = [Step::F, Step::C, Step::G, Step::D, Step::A, Step::E, Step::B];
const FLAT_ORDER: [Step; 7] = [Step::B, Step::E, Step::A, Step::D, Step::G, Step::C, Step::F];

/// Key signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeySignature {
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i8,
}

impl KeySignature {
    pub fn new(fifths: i8) -> Self {
        Self {
            fifths: fifths.clamp(-7, 7),
        }
    }

    /// Accidental the key applies to a letter name.
    pub fn accidental_for(&self, step: Step) -> Accidental {
        let n = self.fifths.unsigned_abs() as usize;
        if self.fifths > 0 && SHARP_ORDER[..n].contains(&step) {
            Accidental::Sharp
        } else if self.fifths < 0 && FLAT_ORDER[..n].contains(&step) {
            Accidental::Flat
        } else {
            Accidental::None
        }
    }

    /// Full letter → accidental table.
    pub fn table(&self) -> [Accidental; 7] {
        Step::ALL.map(|s| self.accidental_for(s))
    }
}

/// Kind of a recognized musical symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Note,
    Rest,
    Accidental,
    TimeSignature,
    KeySignature,
    Beam,
}

/// A musical symbol produced by the associator. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicalSymbol {
    pub kind: SymbolKind,
    /// Horizontal center in page pixels; the ordering key
    pub x: f64,
    /// `None` for symbols without a duration
    pub duration: Option<Duration>,
    /// Resolved pitch (notes only)
    pub pitch: Option<Pitch>,
    /// Effective accidental: the printed one for accidental symbols, the
    /// one applied after key and local overrides for notes
    pub accidental: Accidental,
    /// Index of the owning staff
    pub staff: usize,
    /// Notes sharing a stem share a group id
    pub group: Option<usize>,
}

impl MusicalSymbol {
    pub fn is_timed(&self) -> bool {
        matches!(self.kind, SymbolKind::Note | SymbolKind::Rest)
    }

    pub fn midi_pitch(&self) -> Option<i32> {
        self.pitch.map(|p| p.to_midi())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Timing
// ═══════════════════════════════════════════════════════════════════════

/// A note with absolute timing, ready for the MIDI writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Absolute onset in ticks
    pub tick: u32,
    /// Length in ticks
    pub duration: u32,
    /// MIDI note number
    pub pitch: u8,
    /// Output track (1-based; track 0 holds tempo)
    pub track: u8,
    pub channel: u8,
}
