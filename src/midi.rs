//! MIDI file generation from a note sequence.
//!
//! Produces a Standard MIDI File (SMF) Type 1 as raw bytes.
//! Track 0 is the tempo map (tempo and, when detected, the time
//! signature); the note tracks follow, one per sequence track, each
//! starting with its name and a program change.

use crate::config::ConvertOptions;
use crate::model::TimeSignature;
use crate::sequencer::Sequence;

// ═══════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════

/// Playback parameters that do not affect timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiSettings {
    pub tempo_bpm: u32,
    pub velocity: u8,
    /// General MIDI program for every note track
    pub program: u8,
    /// Channel for tracks that carry no notes
    pub channel: u8,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self::from(&ConvertOptions::default())
    }
}

impl From<&ConvertOptions> for MidiSettings {
    fn from(o: &ConvertOptions) -> Self {
        Self {
            tempo_bpm: o.tempo_bpm,
            velocity: o.velocity,
            program: o.program,
            channel: o.channel,
        }
    }
}

/// A single MIDI event (note on/off, program change, etc.)
#[derive(Debug, Clone)]
pub struct MidiEvent {
    /// Absolute time in ticks from the start of the track
    pub tick: u32,
    /// Raw MIDI message bytes (status + data)
    pub bytes: Vec<u8>,
}

/// Ticks per quarter note in our MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Largest value the three-byte set-tempo field holds.
const MAX_TEMPO_USPQ: u32 = 0xFF_FFFF;

/// Render a sequence as a complete Standard MIDI File (SMF Type 1).
/// The same sequence and settings always give the same bytes.
pub fn render_midi(sequence: &Sequence, settings: &MidiSettings) -> Vec<u8> {
    let mut tracks: Vec<Vec<u8>> = Vec::new();

    // ── Track 0: tempo map ──────────────────────────────────────────
    tracks.push(build_tempo_track(
        settings.tempo_bpm,
        sequence.time_signature,
        sequence.end_tick,
    ));

    // ── Note tracks ─────────────────────────────────────────────────
    for (i, name) in sequence.track_names.iter().enumerate() {
        let track = (i + 1) as u8;
        let notes: Vec<_> = sequence.events.iter().filter(|e| e.track == track).collect();
        let channel = notes.first().map_or(settings.channel, |e| e.channel) & 0x0F;

        let mut events = vec![MidiEvent {
            tick: 0,
            bytes: vec![0xC0 | channel, settings.program & 0x7F],
        }];
        for note in notes {
            let ch = note.channel & 0x0F;
            events.push(MidiEvent {
                tick: note.tick,
                bytes: vec![0x90 | ch, note.pitch, settings.velocity & 0x7F],
            });
            events.push(MidiEvent {
                tick: note.tick + note.duration,
                bytes: vec![0x80 | ch, note.pitch, 0],
            });
        }
        tracks.push(encode_track(&events, name, sequence.end_tick));
    }

    log::debug!(
        "rendered {} MIDI tracks, {} notes, {} ticks",
        tracks.len(),
        sequence.events.len(),
        sequence.end_tick
    );
    build_smf(&tracks)
}

// ═══════════════════════════════════════════════════════════════════════
// SMF byte encoding
// ═══════════════════════════════════════════════════════════════════════

/// Build the complete Standard MIDI File bytes.
fn build_smf(tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();

    // MThd header
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes()); // header length
    out.extend_from_slice(&1u16.to_be_bytes()); // format type 1
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&TICKS_PER_QUARTER.to_be_bytes());

    // Track chunks
    for track_data in tracks {
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        out.extend_from_slice(track_data);
    }

    out
}

/// Build the tempo track (track 0): set-tempo and time-signature meta-events.
fn build_tempo_track(tempo_bpm: u32, time_signature: Option<TimeSignature>, end_tick: u32) -> Vec<u8> {
    // microseconds per quarter, limited to the 24-bit field
    let uspq = (60_000_000 / tempo_bpm.max(1)).clamp(1, MAX_TEMPO_USPQ);
    // Meta event: FF 51 03 tt tt tt
    let mut events = vec![MidiEvent {
        tick: 0,
        bytes: vec![
            0xFF,
            0x51,
            0x03,
            ((uspq >> 16) & 0xFF) as u8,
            ((uspq >> 8) & 0xFF) as u8,
            (uspq & 0xFF) as u8,
        ],
    }];

    if let Some(ts) = time_signature {
        // Meta event: FF 58 04 nn dd cc bb
        events.push(MidiEvent {
            tick: 0,
            bytes: vec![
                0xFF,
                0x58,
                0x04,
                ts.numerator,
                ts.denominator.max(1).trailing_zeros() as u8,
                24,
                8,
            ],
        });
    }

    encode_track(&events, "Tempo", end_tick)
}

/// Order of events sharing a tick: meta and program changes, then
/// note-offs, then note-ons; by key within each.
fn event_rank(event: &MidiEvent) -> (u8, u8) {
    let status = event.bytes.first().copied().unwrap_or(0);
    let key = event.bytes.get(1).copied().unwrap_or(0);
    match status & 0xF0 {
        0x80 => (1, key),
        0x90 => (2, key),
        _ => (0, 0),
    }
}

/// Encode a track's events into raw MTrk bytes (delta-time encoded).
/// The end-of-track event lands on `end_tick` or the last event,
/// whichever is later.
fn encode_track(events: &[MidiEvent], name: &str, end_tick: u32) -> Vec<u8> {
    let mut data = Vec::new();

    // Track name meta event
    let name_bytes = name.as_bytes();
    data.extend_from_slice(&[0x00]); // delta time 0
    data.push(0xFF);
    data.push(0x03); // track name
    write_vlq(&mut data, name_bytes.len() as u32);
    data.extend_from_slice(name_bytes);

    // Stable sort keeps insertion order among equal keys
    let mut sorted: Vec<&MidiEvent> = events.iter().collect();
    sorted.sort_by_key(|e| (e.tick, event_rank(e)));

    let mut last_tick: u32 = 0;
    for event in &sorted {
        let delta = event.tick.saturating_sub(last_tick);
        write_vlq(&mut data, delta);
        data.extend_from_slice(&event.bytes);
        last_tick = event.tick;
    }

    // End of track
    write_vlq(&mut data, end_tick.saturating_sub(last_tick));
    data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    data
}

/// Write a variable-length quantity (VLQ) to a byte vector.
fn write_vlq(out: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        out.push(0);
        return;
    }
    let mut buf = [0u8; 5];
    let mut i = 0;
    while value > 0 {
        buf[i] = (value & 0x7F) as u8;
        value >>= 7;
        if i > 0 {
            buf[i] |= 0x80;
        }
        i += 1;
    }
    // Write in reverse order
    for j in (0..i).rev() {
        out.push(buf[j]);
    }
}
