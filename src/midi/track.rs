//! Delta-timed output tracks.
//!
//! An output track is the final, serializable form of one part: an ordered
//! list of messages, each carrying the number of ticks elapsed since the
//! previous message on the same track.

use serde::{Deserialize, Serialize};

/// A MIDI or meta message as written to an output track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackMessage {
    /// Track name (meta event)
    TrackName(String),
    /// Copyright notice (meta event)
    Copyright(String),
    /// Key signature: signed count of sharps/flats and minor flag
    KeySignature { fifths: i8, minor: bool },
    /// Set tempo: microseconds per quarter note
    SetTempo { microseconds_per_beat: u32 },
    /// Time signature: numerator and denominator as power of 2
    TimeSignature {
        numerator: u8,
        denominator_power: u8,
    },
    ProgramChange { channel: u8, program: u8 },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    NoteOn {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    /// End of track (meta event)
    EndOfTrack,
}

impl TrackMessage {
    /// Channel of a channel message, None for meta events.
    pub fn channel(&self) -> Option<u8> {
        match self {
            TrackMessage::ProgramChange { channel, .. }
            | TrackMessage::ControlChange { channel, .. }
            | TrackMessage::NoteOn { channel, .. }
            | TrackMessage::NoteOff { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}

/// A message paired with its delta time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEvent {
    /// Ticks since the previous event on this track.
    pub delta: u32,
    pub message: TrackMessage,
}

/// One delta-time-consistent output track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTrack {
    /// Human-readable name, also written as the leading TrackName event.
    pub name: String,

    events: Vec<TrackEvent>,

    /// Absolute tick of the last pushed event.
    #[serde(skip)]
    cursor: u32,
}

impl OutputTrack {
    /// Creates a track whose first event is its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut track = Self {
            name: name.clone(),
            events: Vec::new(),
            cursor: 0,
        };
        track.push_at(0, TrackMessage::TrackName(name));
        track
    }

    /// Appends a message at an absolute tick, converting it to a delta
    /// against this track's own cursor.
    ///
    /// Ticks earlier than the cursor are written with delta 0.
    pub fn push_at(&mut self, tick: u32, message: TrackMessage) {
        let delta = tick.saturating_sub(self.cursor);
        self.cursor = self.cursor.max(tick);
        self.events.push(TrackEvent { delta, message });
    }

    /// Closes the track with an end-of-track event at the current cursor.
    pub fn finish(&mut self) {
        if !matches!(
            self.events.last().map(|e| &e.message),
            Some(TrackMessage::EndOfTrack)
        ) {
            self.push_at(self.cursor, TrackMessage::EndOfTrack);
        }
    }

    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    /// Delta of every event, in order.
    pub fn deltas(&self) -> Vec<u32> {
        self.events.iter().map(|e| e.delta).collect()
    }

    /// Absolute tick of the last event.
    pub fn duration_ticks(&self) -> u32 {
        self.events.iter().map(|e| e.delta).sum()
    }

    /// Number of note-on events in the track.
    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.message, TrackMessage::NoteOn { .. }))
            .count()
    }

    /// Absolute tick of every event, reconstructed from the deltas.
    pub fn absolute_ticks(&self) -> Vec<u32> {
        self.events
            .iter()
            .scan(0u32, |tick, e| {
                *tick += e.delta;
                Some(*tick)
            })
            .collect()
    }
}
