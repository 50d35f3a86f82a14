//! Caller-supplied conversion options.
//!
//! Every field has a default, so a JSON document only needs the keys it
//! changes:
//!
//! ```
//! use scorescan::{ConvertOptions, Clef};
//!
//! let opts = ConvertOptions::from_json(r#"{ "tempo_bpm": 90, "clef": "bass" }"#).unwrap();
//! assert_eq!(opts.tempo_bpm, 90);
//! assert_eq!(opts.clef, Clef::Bass);
//! assert_eq!(opts.velocity, 64);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{OmrError, Result};
use crate::model::Clef;

const MIN_TEMPO_BPM: u32 = 4;
const MAX_TEMPO_BPM: u32 = 60_000_000;

/// How the staves of one page relate in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffReading {
    /// Staves are consecutive lines of one melody, read top to bottom.
    #[default]
    Sequential,
    /// Staves sound together (one track per staff, shared origin).
    Simultaneous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Playback tempo in quarter notes per minute. Only written to the
    /// tempo meta-event; tick arithmetic ignores it.
    pub tempo_bpm: u32,
    pub clef: Clef,
    pub staff_reading: StaffReading,
    /// Fraction of the fullest row a row must reach to count as staff line.
    pub line_threshold: f64,
    /// Line rows separated by at most this many rows merge into one line.
    pub line_merge_gap: u32,
    /// Maximum spacing std-dev, relative to the mean, for a 5-line group.
    pub spacing_tolerance: f64,
    /// Notes closer than this many staff-spaces form one chord.
    pub chord_tolerance: f64,
    pub velocity: u8,
    /// General MIDI program for the note tracks.
    pub program: u8,
    /// First MIDI channel; simultaneous staves count up from here.
    pub channel: u8,
    /// Keep the staff mask and symbol boxes for an external debug writer.
    pub collect_artifacts: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            tempo_bpm: 120,
            clef: Clef::Treble,
            staff_reading: StaffReading::Sequential,
            line_threshold: 0.5,
            line_merge_gap: 2,
            spacing_tolerance: 0.2,
            chord_tolerance: 0.5,
            velocity: 64,
            program: 0,
            channel: 0,
            collect_artifacts: false,
        }
    }
}

impl ConvertOptions {
    /// Parse options from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let opts: ConvertOptions = serde_json::from_str(json)
            .map_err(|e| OmrError::InvalidOptions(format!("JSON error: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        // 60_000_000 / bpm must fit the 24-bit set-tempo field and stay nonzero
        if !(MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&self.tempo_bpm) {
            return Err(OmrError::InvalidOptions(format!(
                "tempo_bpm {} is outside {MIN_TEMPO_BPM}..={MAX_TEMPO_BPM}",
                self.tempo_bpm
            )));
        }
        if !(self.line_threshold > 0.0 && self.line_threshold <= 1.0) {
            return Err(OmrError::InvalidOptions(format!(
                "line_threshold {} is outside (0, 1]",
                self.line_threshold
            )));
        }
        if self.spacing_tolerance <= 0.0 || self.chord_tolerance <= 0.0 {
            return Err(OmrError::InvalidOptions("tolerances must be positive".into()));
        }
        // A note-on with velocity 0 is a note-off to every player
        if !(1..=127).contains(&self.velocity) {
            return Err(OmrError::InvalidOptions(format!(
                "velocity {} is outside 1..=127",
                self.velocity
            )));
        }
        if self.program > 127 {
            return Err(OmrError::InvalidOptions(format!(
                "program {} is outside 0..=127",
                self.program
            )));
        }
        if self.channel > 15 {
            return Err(OmrError::InvalidOptions(format!(
                "channel {} is outside 0..=15",
                self.channel
            )));
        }
        Ok(())
    }
}
