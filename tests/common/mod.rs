//! Synthetic engraving for the integration tests.
//!
//! Draws clean pages at a staff-space of 20 px: staff lines two pixels
//! thick, noteheads 27×17, stems three pixels wide rising from the right
//! edge of the head. Pitch positions are diatonic steps above the bottom
//! staff line (treble clef: 0 = E4, 8 = F5).

#![allow(dead_code)]

use scorescan::BinaryImage;

pub const SPACE: u32 = 20;
pub const WIDTH: u32 = 600;
const STAFF_PITCH: u32 = 200;
const FIRST_TOP: u32 = 100;
const STEM_LENGTH: u32 = 70;

/// 5×3 cell patterns of the engraved digits, row-major.
const DIGITS: [[u8; 15]; 10] = [
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

pub struct Score {
    img: BinaryImage,
}

impl Score {
    /// A page with `staves` empty five-line staves.
    pub fn new(staves: u32) -> Self {
        let mut img = BinaryImage::new(WIDTH, FIRST_TOP + STAFF_PITCH * staves);
        for s in 0..staves {
            let top = FIRST_TOP + STAFF_PITCH * s;
            for k in 0..5 {
                img.fill_rect(20, top + SPACE * k, WIDTH - 20, top + SPACE * k + 1, true);
            }
        }
        Self { img }
    }

    pub fn image(&self) -> BinaryImage {
        self.img.clone()
    }

    pub fn top(staff: u32) -> u32 {
        FIRST_TOP + STAFF_PITCH * staff
    }

    /// Row of a notehead center at `step`.
    pub fn center_y(staff: u32, step: i32) -> u32 {
        (Self::top(staff) as i32 + 81 - 10 * step) as u32
    }

    // ── Notes ───────────────────────────────────────────────────────

    pub fn quarter(&mut self, staff: u32, cx: u32, step: i32) -> &mut Self {
        self.head(staff, cx, step, true);
        self.stem(cx, Self::center_y(staff, step) - STEM_LENGTH, Self::center_y(staff, step));
        self
    }

    pub fn half(&mut self, staff: u32, cx: u32, step: i32) -> &mut Self {
        self.head(staff, cx, step, false);
        self.stem(cx, Self::center_y(staff, step) - STEM_LENGTH, Self::center_y(staff, step));
        self
    }

    pub fn whole(&mut self, staff: u32, cx: u32, step: i32) -> &mut Self {
        self.head(staff, cx, step, false);
        self
    }

    /// Filled heads on one stem.
    pub fn chord(&mut self, staff: u32, cx: u32, steps: &[i32]) -> &mut Self {
        for &step in steps {
            self.head(staff, cx, step, true);
        }
        let highest = steps.iter().copied().max().unwrap_or(0);
        let lowest = steps.iter().copied().min().unwrap_or(0);
        self.stem(
            cx,
            Self::center_y(staff, highest) - STEM_LENGTH,
            Self::center_y(staff, lowest),
        );
        self
    }

    /// Filled heads whose stems are joined by `beams` beams at the top.
    pub fn beamed(&mut self, staff: u32, notes: &[(u32, i32)], beams: u32) -> &mut Self {
        let highest = notes.iter().map(|&(_, s)| s).max().unwrap_or(0);
        let beam_top = Self::center_y(staff, highest) - STEM_LENGTH;
        for &(cx, step) in notes {
            self.head(staff, cx, step, true);
            self.stem(cx, beam_top, Self::center_y(staff, step));
        }
        let first = notes.iter().map(|&(cx, _)| cx).min().unwrap_or(0);
        let last = notes.iter().map(|&(cx, _)| cx).max().unwrap_or(0);
        for b in 0..beams {
            let y = beam_top + 15 * b;
            self.img.fill_rect(first + 11, y, last + 13, y + 8, true);
        }
        self
    }

    // ── Accidentals ─────────────────────────────────────────────────

    /// A sharp whose left edge is at `x`, centered on `step`.
    pub fn sharp(&mut self, staff: u32, x: u32, step: i32) -> &mut Self {
        let y0 = Self::center_y(staff, step) - 30;
        self.img.fill_rect(x + 4, y0, x + 6, y0 + 60, true);
        self.img.fill_rect(x + 14, y0, x + 16, y0 + 60, true);
        self.img.fill_rect(x, y0 + 22, x + 20, y0 + 25, true);
        self.img.fill_rect(x, y0 + 35, x + 20, y0 + 38, true);
        self
    }

    pub fn natural(&mut self, staff: u32, x: u32, step: i32) -> &mut Self {
        let y0 = Self::center_y(staff, step) - 28;
        self.img.fill_rect(x, y0, x + 2, y0 + 36, true);
        self.img.fill_rect(x + 11, y0 + 20, x + 13, y0 + 56, true);
        self.img.fill_rect(x, y0 + 20, x + 13, y0 + 23, true);
        self.img.fill_rect(x, y0 + 33, x + 13, y0 + 36, true);
        self
    }

    // ── Rests and signatures ────────────────────────────────────────

    /// Zig-zag quarter rest spanning the middle of the staff.
    pub fn quarter_rest(&mut self, staff: u32, x: u32) -> &mut Self {
        let y0 = Self::top(staff) + 10;
        let path: [(f64, f64); 5] = [(5.0, 0.0), (15.0, 18.0), (5.0, 36.0), (15.0, 50.0), (8.0, 59.0)];
        for pair in path.windows(2) {
            let ((xa, ya), (xb, yb)) = (pair[0], pair[1]);
            for row in ya as u32..=yb as u32 {
                let t = (row as f64 - ya) / (yb - ya);
                let px = (xa + t * (xb - xa)).round() as u32;
                self.img.fill_rect(x + px - 2, y0 + row, x + px + 2, y0 + row, true);
            }
        }
        self
    }

    /// Stacked single-digit time signature with its left edge at `x`.
    pub fn time_signature(&mut self, staff: u32, x: u32, numerator: u8, denominator: u8) -> &mut Self {
        let top = Self::top(staff);
        self.digit(x, top + 3, numerator);
        self.digit(x, top + 43, denominator);
        self
    }

    // ── Primitives ──────────────────────────────────────────────────

    fn head(&mut self, staff: u32, cx: u32, step: i32, filled: bool) {
        let cy = Self::center_y(staff, step);
        let (rx, ry) = (13.5, 8.5);
        for y in 0..17u32 {
            for x in 0..27u32 {
                let dx = (x as f64 + 0.5 - rx) / rx;
                let dy = (y as f64 + 0.5 - ry) / ry;
                let d = dx * dx + dy * dy;
                if d <= 1.0 && (filled || d >= 0.5) {
                    self.img.set(cx - 13 + x, cy - 8 + y, true);
                }
            }
        }

        // Ledger lines below and above the staff
        let mut s = -2;
        while s >= step {
            let row = Self::center_y(staff, s) - 1;
            self.img.fill_rect(cx - 16, row, cx + 16, row + 1, true);
            s -= 2;
        }
        let mut s = 10;
        while s <= step {
            let row = Self::center_y(staff, s) - 1;
            self.img.fill_rect(cx - 16, row, cx + 16, row + 1, true);
            s += 2;
        }
    }

    fn stem(&mut self, cx: u32, y0: u32, y1: u32) {
        self.img.fill_rect(cx + 11, y0, cx + 13, y1, true);
    }

    fn digit(&mut self, x: u32, y: u32, d: u8) {
        let cells = DIGITS[d as usize % 10];
        for (i, &on) in cells.iter().enumerate() {
            if on == 1 {
                let (row, col) = (i as u32 / 3, i as u32 % 3);
                self.img
                    .fill_rect(x + col * 8, y + row * 7, x + col * 8 + 7, y + row * 7 + 6, true);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Reading the output back
// ═══════════════════════════════════════════════════════════════════════

/// A note as a player would hear it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heard {
    pub tick: u32,
    pub key: u8,
    pub length: u32,
    pub channel: u8,
}

/// Parse SMF bytes with an independent reader and pair note-ons with
/// their note-offs. Sorted by (tick, key).
pub fn heard_notes(midi: &[u8]) -> Vec<Heard> {
    use midly::{MidiMessage, Smf, TrackEventKind};

    let smf = Smf::parse(midi).expect("valid SMF");
    let mut notes = Vec::new();
    for track in &smf.tracks {
        let mut tick = 0u32;
        let mut open: Vec<(u8, u8, u32)> = Vec::new(); // (channel, key, onset)
        for event in track {
            tick += event.delta.as_int();
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    open.push((channel, key.as_int(), tick));
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let key = key.as_int();
                    if let Some(i) = open.iter().position(|&(c, k, _)| c == channel && k == key) {
                        let (_, _, onset) = open.remove(i);
                        notes.push(Heard { tick: onset, key, length: tick - onset, channel });
                    }
                }
                _ => {}
            }
        }
        assert!(open.is_empty(), "notes left sounding: {open:?}");
    }
    notes.sort_by_key(|n| (n.tick, n.key));
    notes
}

/// (tick, key) of every heard note.
pub fn onsets(midi: &[u8]) -> Vec<(u32, u8)> {
    heard_notes(midi).iter().map(|n| (n.tick, n.key)).collect()
}
