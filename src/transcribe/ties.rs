//! Tie chain resolution.
//!
//! Walks a voice's chords and rests in score order and turns them into
//! note-on/note-off pairs, merging every chain of tied notes on the same
//! pitch into one sustained note.

use super::duration::resolve_duration;
use crate::midi::ResolvedNoteEvent;
use crate::score::{NotatedEvent, Staff};
use std::collections::HashMap;

/// An unterminated tie chain: where it started and how long it is so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenTie {
    start_tick: u32,
    accumulated: u32,
}

/// Resolution state for one voice.
///
/// Each voice owns its cursor and its open chains; nothing is shared
/// between voices.
#[derive(Debug)]
pub struct VoiceAssembler {
    division: u32,
    current_tick: u32,
    open_ties: HashMap<u8, OpenTie>,
    events: Vec<ResolvedNoteEvent>,
}

impl VoiceAssembler {
    pub fn new(division: u32) -> Self {
        Self {
            division,
            current_tick: 0,
            open_ties: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Absolute tick where the next event of this voice starts.
    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    /// Moves the cursor, e.g. to the start of a measure.
    pub fn seek(&mut self, tick: u32) {
        self.current_tick = tick;
    }

    /// Consumes one chord or rest.
    pub fn push(&mut self, event: &NotatedEvent) {
        let length = resolve_duration(event.duration(), self.division);

        if let NotatedEvent::Chord { notes, .. } = event {
            for note in notes {
                let pitch = note.pitch;
                match (note.tied_from_previous, note.tied_to_next) {
                    (true, to_next) => {
                        let Some(open) = self.open_ties.get_mut(&pitch) else {
                            tracing::debug!(
                                pitch,
                                tick = self.current_tick,
                                "dropping tie continuation without an open chain"
                            );
                            continue;
                        };
                        open.accumulated += length;
                        if !to_next {
                            let OpenTie {
                                start_tick,
                                accumulated,
                            } = *open;
                            self.open_ties.remove(&pitch);
                            self.emit(start_tick, accumulated, pitch);
                        }
                    }
                    (false, true) => {
                        let previous = self.open_ties.insert(
                            pitch,
                            OpenTie {
                                start_tick: self.current_tick,
                                accumulated: length,
                            },
                        );
                        if let Some(previous) = previous {
                            tracing::debug!(
                                pitch,
                                start_tick = previous.start_tick,
                                "discarding re-opened tie chain"
                            );
                        }
                    }
                    (false, false) => self.emit(self.current_tick, length, pitch),
                }
            }
        }

        self.current_tick += length;
    }

    /// Finishes the voice, discarding any chain that never closed.
    pub fn finish(self) -> Vec<ResolvedNoteEvent> {
        for (pitch, open) in &self.open_ties {
            tracing::debug!(
                pitch,
                start_tick = open.start_tick,
                "discarding dangling tie at end of voice"
            );
        }
        self.events
    }

    fn emit(&mut self, start_tick: u32, length: u32, pitch: u8) {
        if length == 0 {
            tracing::warn!(pitch, tick = start_tick, "skipping zero-length note");
            return;
        }
        self.events.push(ResolvedNoteEvent::on(start_tick, pitch));
        self.events
            .push(ResolvedNoteEvent::off(start_tick + length, pitch));
    }
}

/// Resolves one voice, starting at tick 0, into note events in emission
/// order.
pub fn assemble(events: &[NotatedEvent], division: u32) -> Vec<ResolvedNoteEvent> {
    let mut voice = VoiceAssembler::new(division);
    for event in events {
        voice.push(event);
    }
    voice.finish()
}

/// Resolves every voice of a staff and merges them by tick.
///
/// Voices are matched by their position within each measure, so a tie
/// chain may cross barlines within the same voice. Every voice of a
/// measure starts at the measure's start; a measure lasts as long as its
/// longest voice.
pub fn assemble_staff(staff: &Staff, division: u32) -> Vec<ResolvedNoteEvent> {
    let mut voices: Vec<VoiceAssembler> = Vec::new();
    let mut measure_start = 0u32;

    for measure in &staff.measures {
        let mut measure_length = 0u32;
        for (index, events) in measure.voices.iter().enumerate() {
            if voices.len() <= index {
                voices.resize_with(index + 1, || VoiceAssembler::new(division));
            }
            let voice = &mut voices[index];
            voice.seek(measure_start);
            for event in events {
                voice.push(event);
            }
            measure_length = measure_length.max(voice.current_tick() - measure_start);
        }
        measure_start += measure_length;
    }

    let mut merged: Vec<ResolvedNoteEvent> =
        voices.into_iter().flat_map(VoiceAssembler::finish).collect();
    merged.sort_by_key(|e| e.tick);
    merged
}
