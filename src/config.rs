//! Transcription settings.
//!
//! Every setting has a default, so a JSON config file only needs to name
//! the values it changes:
//!
//! ```json
//! { "velocity": 100, "split": { "window_low": 50 } }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Thresholds of the hand-split heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Split pitch used when no better one can be derived (middle C).
    pub default_split: u8,
    /// Lowest candidate split pitch.
    pub window_low: u8,
    /// Highest candidate split pitch.
    pub window_high: u8,
    /// Half-width of the pitch neighbourhood whose notes are counted.
    pub neighborhood_radius: u8,
    /// Pitch separating the low and high register when deciding whether a
    /// source needs separating.
    pub register_pivot: u8,
    /// A source needs separating only with more than this many notes in
    /// each register.
    pub min_notes_per_register: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            default_split: 60,
            window_low: 48,
            window_high: 72,
            neighborhood_radius: 2,
            register_pivot: 60,
            min_notes_per_register: 5,
        }
    }
}

/// Settings for one transcription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    /// Name of the channel 0 track.
    pub right_hand_name: String,
    /// Name of the channel 1 track.
    pub left_hand_name: String,
    /// General MIDI program for both hands when the source names none.
    pub program: u8,
    /// Note-on velocity for notes read from a score.
    pub velocity: u8,
    /// Prepend a conductor track with title, tempo, meter and key.
    pub metadata_track: bool,
    /// Write a key signature event at the start of each hand's track.
    pub key_signature_meta: bool,
    /// Forces the split pitch instead of computing it.
    pub split_override: Option<u8>,
    pub split: SplitConfig,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            right_hand_name: "Right Hand".to_string(),
            left_hand_name: "Left Hand".to_string(),
            program: 0, // Acoustic Grand Piano
            velocity: 90,
            metadata_track: false,
            key_signature_meta: true,
            split_override: None,
            split: SplitConfig::default(),
        }
    }
}

impl TranscribeConfig {
    /// Parses a config from JSON, filling unspecified fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a config from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TranscribeConfig::default();
        assert_eq!(config.velocity, 90);
        assert_eq!(config.split.default_split, 60);
        assert_eq!(config.split.window_low, 48);
        assert_eq!(config.split.window_high, 72);
        assert!(!config.metadata_track);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            TranscribeConfig::from_json(r#"{ "velocity": 100, "split": { "window_low": 50 } }"#)
                .unwrap();
        assert_eq!(config.velocity, 100);
        assert_eq!(config.split.window_low, 50);
        assert_eq!(config.split.window_high, 72);
        assert_eq!(config.right_hand_name, "Right Hand");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            TranscribeConfig::from_json("{ velocity: }"),
            Err(ConfigError::Json(_))
        ));
    }
}
