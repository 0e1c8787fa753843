//! MIDI data structures shared by the transcription engine.
//!
//! This module provides the timed event types the engine consumes and
//! produces, plus Standard MIDI File import and export.

mod arrangement;
mod midi_export;
mod midi_import;
mod track;

pub use arrangement::Arrangement;
pub use midi_export::encode_smf;
pub use midi_import::{import_source, import_source_file, MidiImportError, SourceMidi, SourceTrack};
pub use track::{OutputTrack, TrackEvent, TrackMessage};

use serde::{Deserialize, Serialize};

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Velocity written for note-off messages.
pub const NOTE_OFF_VELOCITY: u8 = 0;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Examples
///
/// ```
/// use pianohands::midi::note_to_name;
///
/// let name = note_to_name(60); // Middle C
/// assert_eq!(name, "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Converts a note name to MIDI note number.
///
/// # Returns
///
/// MIDI note number (0-127) or None if invalid
pub fn name_to_note(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    // Find where the octave number starts
    let octave_start = name.chars().position(|c| c.is_ascii_digit() || c == '-')?;

    let note_part = &name[..octave_start];
    let octave_part = &name[octave_start..];

    let note_index = NOTE_NAMES.iter().position(|&n| n == note_part)?;
    let octave: i8 = octave_part.parse().ok()?;

    let midi_note = (octave as i16 + 1) * 12 + note_index as i16;
    if (0..=127).contains(&midi_note) {
        Some(midi_note as u8)
    } else {
        None
    }
}

/// One of the two output parts.
///
/// The right hand plays the treble register on channel 0, the left hand the
/// bass register on channel 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Right,
    Left,
}

impl Hand {
    /// Both hands in output order.
    pub const ALL: [Hand; 2] = [Hand::Right, Hand::Left];

    /// MIDI channel carrying this hand.
    pub fn channel(self) -> u8 {
        match self {
            Hand::Right => 0,
            Hand::Left => 1,
        }
    }

    /// Position of this hand in per-hand arrays.
    pub fn index(self) -> usize {
        self.channel() as usize
    }
}

/// Whether a resolved note event starts or ends a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    On,
    Off,
}

/// A note boundary at an absolute tick, produced by the tie chain assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedNoteEvent {
    /// Absolute tick from the start of the staff.
    pub tick: u32,
    pub kind: NoteKind,
    /// MIDI note number (0-127).
    pub pitch: u8,
}

impl ResolvedNoteEvent {
    pub fn on(tick: u32, pitch: u8) -> Self {
        Self {
            tick,
            kind: NoteKind::On,
            pitch,
        }
    }

    pub fn off(tick: u32, pitch: u8) -> Self {
        Self {
            tick,
            kind: NoteKind::Off,
            pitch,
        }
    }
}

/// Channel message carried by a source event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMessage {
    Note {
        kind: NoteKind,
        pitch: u8,
        velocity: u8,
    },
    ProgramChange {
        program: u8,
    },
    ControlChange {
        controller: u8,
        value: u8,
    },
}

/// An absolute-tick channel event entering the track assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Absolute tick position.
    pub tick: u32,
    /// Channel the event was found on in the source (0 for score input).
    pub channel: u8,
    pub message: SourceMessage,
}

impl SourceEvent {
    /// Wraps a resolved score note with the velocity used for note-ons.
    pub fn from_resolved(event: ResolvedNoteEvent, velocity: u8) -> Self {
        let velocity = match event.kind {
            NoteKind::On => velocity,
            NoteKind::Off => NOTE_OFF_VELOCITY,
        };
        Self {
            tick: event.tick,
            channel: 0,
            message: SourceMessage::Note {
                kind: event.kind,
                pitch: event.pitch,
                velocity,
            },
        }
    }

    /// Pitch of a note-on, if this is one.
    pub fn note_on_pitch(&self) -> Option<u8> {
        match self.message {
            SourceMessage::Note {
                kind: NoteKind::On,
                pitch,
                ..
            } => Some(pitch),
            _ => None,
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self.message, SourceMessage::Note { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_name() {
        assert_eq!(note_to_name(60), "C4");
        assert_eq!(note_to_name(69), "A4");
        assert_eq!(note_to_name(0), "C-1");
        assert_eq!(note_to_name(127), "G9");
    }

    #[test]
    fn test_name_to_note() {
        assert_eq!(name_to_note("C4"), Some(60));
        assert_eq!(name_to_note("A4"), Some(69));
        assert_eq!(name_to_note("C-1"), Some(0));
        assert_eq!(name_to_note("G#9"), None);
        assert_eq!(name_to_note("H4"), None);
    }

    #[test]
    fn test_hand_channels() {
        assert_eq!(Hand::Right.channel(), 0);
        assert_eq!(Hand::Left.channel(), 1);
        assert_eq!(Hand::ALL.map(Hand::index), [0, 1]);
    }

    #[test]
    fn test_from_resolved_zeroes_note_off_velocity() {
        let on = SourceEvent::from_resolved(ResolvedNoteEvent::on(0, 60), 90);
        let off = SourceEvent::from_resolved(ResolvedNoteEvent::off(480, 60), 90);
        assert_eq!(on.note_on_pitch(), Some(60));
        assert_eq!(off.note_on_pitch(), None);
        assert!(matches!(
            off.message,
            SourceMessage::Note { velocity: 0, .. }
        ));
    }
}
