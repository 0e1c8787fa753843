//! Transcription result container.
//!
//! An arrangement is the complete output of one transcription: the
//! resolution it was timed at and its ordered output tracks.

use super::track::OutputTrack;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The ordered output tracks of one transcription.
///
/// Track order is: optional conductor/metadata track, right hand, left hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrangement {
    /// Title of the piece.
    pub name: String,

    /// Ticks per quarter note of every track.
    pub ticks_per_quarter: u16,

    tracks: Vec<OutputTrack>,
}

impl Arrangement {
    pub fn new(name: impl Into<String>, ticks_per_quarter: u16, tracks: Vec<OutputTrack>) -> Self {
        Self {
            name: name.into(),
            ticks_per_quarter,
            tracks,
        }
    }

    pub fn tracks(&self) -> &[OutputTrack] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Number of note-ons across all tracks.
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(OutputTrack::note_count).sum()
    }

    /// Total duration in ticks across all tracks.
    pub fn duration_ticks(&self) -> u32 {
        self.tracks
            .iter()
            .map(|t| t.duration_ticks())
            .max()
            .unwrap_or(0)
    }

    /// Serializes the arrangement to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Encodes the arrangement as Standard MIDI File bytes.
    pub fn to_smf_bytes(&self) -> Vec<u8> {
        super::encode_smf(self)
    }

    /// Writes the arrangement to a .mid file.
    ///
    /// # Errors
    ///
    /// Returns error if file creation or writing fails
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        fs::write(path, self.to_smf_bytes())
    }
}
