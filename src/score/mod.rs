//! Notated score representation.
//!
//! A score is a set of staves, each an ordered list of measures, each
//! holding one or more voices of chords and rests. Durations are kept in
//! notated form (category plus dot) and resolved to ticks later.

pub mod mscx;

pub use mscx::{parse_mscx, parse_mscx_file, ScoreParseError};

use serde::{Deserialize, Serialize};

/// A notated duration category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationType {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
    /// Full-measure duration used by measure rests.
    Measure,
    /// Historical alias of [`DurationType::Measure`].
    Breve,
    /// Historical "black" notehead alias of a quarter.
    Black,
    /// Any category the resolver does not know.
    Unknown,
}

impl DurationType {
    /// Parses a category as written in the score file.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "whole" => DurationType::Whole,
            "half" => DurationType::Half,
            "quarter" => DurationType::Quarter,
            "eighth" => DurationType::Eighth,
            "16th" => DurationType::Sixteenth,
            "32nd" => DurationType::ThirtySecond,
            "64th" => DurationType::SixtyFourth,
            "measure" => DurationType::Measure,
            "breve" => DurationType::Breve,
            "black" => DurationType::Black,
            _ => DurationType::Unknown,
        }
    }
}

/// A duration category with its dot flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotatedDuration {
    pub kind: DurationType,
    pub dotted: bool,
}

impl NotatedDuration {
    pub fn new(kind: DurationType) -> Self {
        Self {
            kind,
            dotted: false,
        }
    }

    pub fn dotted(kind: DurationType) -> Self {
        Self { kind, dotted: true }
    }
}

/// One pitch of a chord, with its tie markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordNote {
    /// MIDI note number (0-127).
    pub pitch: u8,
    pub tied_from_previous: bool,
    pub tied_to_next: bool,
}

impl ChordNote {
    pub fn new(pitch: u8) -> Self {
        Self {
            pitch,
            tied_from_previous: false,
            tied_to_next: false,
        }
    }

    pub fn tied(pitch: u8, from_previous: bool, to_next: bool) -> Self {
        Self {
            pitch,
            tied_from_previous: from_previous,
            tied_to_next: to_next,
        }
    }
}

/// A chord or a rest, in score order within a voice.
///
/// All pitches of a chord share its duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotatedEvent {
    Chord {
        duration: NotatedDuration,
        notes: Vec<ChordNote>,
    },
    Rest {
        duration: NotatedDuration,
    },
}

impl NotatedEvent {
    pub fn duration(&self) -> NotatedDuration {
        match self {
            NotatedEvent::Chord { duration, .. } | NotatedEvent::Rest { duration } => *duration,
        }
    }
}

/// A measure: each entry of `voices` is one voice's events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub voices: Vec<Vec<NotatedEvent>>,
}

/// One staff of the score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub measures: Vec<Measure>,
}

impl Staff {
    /// Whether any chord in the staff carries a pitch.
    pub fn has_notes(&self) -> bool {
        self.measures
            .iter()
            .flat_map(|m| m.voices.iter().flatten())
            .any(|e| matches!(e, NotatedEvent::Chord { notes, .. } if !notes.is_empty()))
    }
}

/// A key signature declaration as found in the document.
///
/// Placeholder declarations carry no (or a blank) accidental count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySigDecl {
    pub accidental: Option<String>,
    pub mode: Option<String>,
}

/// Instrument part listed in the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    pub id: String,
    pub name: String,
}

/// Descriptive information used for naming and the conductor track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub composer: Option<String>,
    pub artist: Option<String>,
    pub lyricist: Option<String>,
    pub copyright: Option<String>,
    /// Tempo in quarter notes per minute.
    pub tempo_bpm: Option<f64>,
    /// Time signature (numerator, denominator).
    pub time_signature: Option<(u8, u8)>,
    pub parts: Vec<PartInfo>,
}

/// A parsed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Ticks per quarter note.
    pub division: u32,
    pub staves: Vec<Staff>,
    /// Every key signature declaration, in document order.
    pub key_signatures: Vec<KeySigDecl>,
    pub metadata: ScoreMetadata,
}

impl Score {
    pub fn new(division: u32) -> Self {
        Self {
            division,
            staves: Vec::new(),
            key_signatures: Vec::new(),
            metadata: ScoreMetadata::default(),
        }
    }

    /// Staves that carry at least one pitched chord, in document order.
    pub fn note_bearing_staves(&self) -> impl Iterator<Item = &Staff> {
        self.staves.iter().filter(|s| s.has_notes())
    }
}
