//! Temporal sequencer: musical symbols → absolute tick timeline.
//!
//! Notes and rests of a staff are read left to right. Notes whose centers
//! lie within `chord_tolerance` staff-spaces of the first note of an open
//! cluster sound together; a rest always stands alone. Each cluster starts
//! at the cursor and moves it by its longest duration.
//!
//! Ticks never depend on the tempo; it only reaches the MIDI tempo
//! meta-event.

use serde::Serialize;

use crate::associate::Association;
use crate::config::{ConvertOptions, StaffReading};
use crate::error::{OmrError, Result};
use crate::midi::TICKS_PER_QUARTER;
use crate::model::{MusicalSymbol, Staff, SymbolKind, TimeSignature, TimedEvent};

/// Timed notes of one or more pages, ready for the MIDI writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    /// Sorted by (tick, track, pitch descending)
    pub events: Vec<TimedEvent>,
    /// Tick at which the last note or rest ends
    pub end_tick: u32,
    /// Time signature written to the tempo track, when one was detected
    pub time_signature: Option<TimeSignature>,
    /// Whether every staff fills a whole number of measures
    pub time_signature_consistent: bool,
    /// Name of each note track; track `n` (1-based) is `track_names[n - 1]`
    pub track_names: Vec<String>,
}

/// Sequence a single page whose first tick is `origin`.
pub fn sequence_page(
    staves: &[Staff],
    association: &Association,
    options: &ConvertOptions,
    origin: u32,
) -> Sequence {
    let meter = association.time_signature.unwrap_or_default();
    let mut events = Vec::new();
    let mut consistent = true;
    let mut cursor = origin;
    let mut end_tick = origin;

    for staff in staves {
        let timed: Vec<&MusicalSymbol> = association
            .symbols
            .iter()
            .filter(|s| s.staff == staff.index && s.is_timed())
            .collect();

        let (start, track, channel) = match options.staff_reading {
            StaffReading::Sequential => (cursor, 1, options.channel),
            StaffReading::Simultaneous => (
                origin,
                track_number(staff.index),
                ((options.channel as usize + staff.index) % 16) as u8,
            ),
        };
        let staff_end = sequence_staff(&timed, staff, options, start, track, channel, &mut events);

        let length = staff_end - start;
        let measure = meter.measure_ticks(TICKS_PER_QUARTER);
        if measure > 0 && length > 0 && length % measure != 0 {
            log::warn!(
                "staff {}: {length} ticks is not a whole number of {}/{} measures",
                staff.index,
                meter.numerator,
                meter.denominator
            );
            consistent = false;
        }

        cursor = staff_end;
        end_tick = end_tick.max(staff_end);
    }

    sort_events(&mut events);
    log::debug!(
        "sequenced {} note events over ticks {origin}..{end_tick}",
        events.len()
    );
    Sequence {
        events,
        end_tick,
        time_signature: association.time_signature,
        time_signature_consistent: consistent,
        track_names: track_names(options.staff_reading, staves.len()),
    }
}

/// Sequence pages back to back in the order given: each page starts at
/// the tick where the previous one ended.
pub fn sequence_pages<'a, I>(pages: I, options: &ConvertOptions) -> Result<Sequence>
where
    I: IntoIterator<Item = (&'a [Staff], &'a Association)>,
{
    let mut out: Option<Sequence> = None;

    for (index, (staves, association)) in pages.into_iter().enumerate() {
        let origin = out.as_ref().map_or(0, |s| s.end_tick);
        let page = sequence_page(staves, association, options, origin);
        log::debug!("page {index} starts at tick {origin}");

        out = Some(match out {
            None => page,
            Some(mut acc) => {
                acc.events.extend(page.events);
                acc.end_tick = page.end_tick;
                acc.time_signature = acc.time_signature.or(page.time_signature);
                acc.time_signature_consistent &= page.time_signature_consistent;
                if page.track_names.len() > acc.track_names.len() {
                    acc.track_names = page.track_names;
                }
                acc
            }
        });
    }

    let mut seq = out.ok_or_else(|| OmrError::MultiPageOrderMismatch("page list is empty".into()))?;
    sort_events(&mut seq.events);
    Ok(seq)
}

fn track_number(staff_index: usize) -> u8 {
    (staff_index + 1).min(u8::MAX as usize) as u8
}

fn track_names(reading: StaffReading, staff_count: usize) -> Vec<String> {
    match reading {
        StaffReading::Sequential => vec!["Melody".to_string()],
        StaffReading::Simultaneous => (1..=staff_count).map(|n| format!("Staff {n}")).collect(),
    }
}

fn sort_events(events: &mut [TimedEvent]) {
    events.sort_by(|a, b| {
        a.tick
            .cmp(&b.tick)
            .then(a.track.cmp(&b.track))
            .then(b.pitch.cmp(&a.pitch))
    });
}

/// A chord in the making.
struct Cluster {
    anchor: f64,
    onset: u32,
    longest: u32,
}

/// Lay out one staff starting at `start`; returns the tick where it ends.
fn sequence_staff(
    timed: &[&MusicalSymbol],
    staff: &Staff,
    options: &ConvertOptions,
    start: u32,
    track: u8,
    channel: u8,
    events: &mut Vec<TimedEvent>,
) -> u32 {
    let tolerance = options.chord_tolerance * staff.space;
    let mut cursor = start;
    let mut open: Option<Cluster> = None;

    for sym in timed {
        let Some(duration) = sym.duration else {
            continue;
        };
        let ticks = duration.ticks(TICKS_PER_QUARTER);

        if sym.kind == SymbolKind::Rest {
            if let Some(c) = open.take() {
                cursor = c.onset + c.longest;
            }
            cursor += ticks;
            continue;
        }

        let joins = matches!(&open, Some(c) if (sym.x - c.anchor).abs() <= tolerance);
        if !joins {
            if let Some(c) = open.take() {
                cursor = c.onset + c.longest;
            }
            open = Some(Cluster { anchor: sym.x, onset: cursor, longest: 0 });
        }
        let onset = match open.as_mut() {
            Some(c) => {
                c.longest = c.longest.max(ticks);
                c.onset
            }
            None => cursor,
        };

        let Some(midi) = sym.midi_pitch() else {
            continue;
        };
        match u8::try_from(midi) {
            Ok(pitch) if pitch <= 127 => events.push(TimedEvent {
                tick: onset,
                duration: ticks,
                pitch,
                track,
                channel,
            }),
            _ => log::warn!("staff {}: pitch {midi} is outside the MIDI range", staff.index),
        }
    }

    if let Some(c) = open {
        cursor = c.onset + c.longest;
    }
    cursor
}
