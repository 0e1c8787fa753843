//! pianohands - Score-to-MIDI two-hand transcription.
//!
//! This library turns a notated piano score (or an already-rendered but
//! undifferentiated MIDI file) into a Standard MIDI File with the right
//! and left hand on separate tracks and channels.

pub mod config;
pub mod midi;
pub mod score;
pub mod transcribe;

// Re-export commonly used types
pub use config::{ConfigError, SplitConfig, TranscribeConfig};
pub use midi::{import_source, import_source_file, Arrangement, OutputTrack, SourceMidi};
pub use score::{parse_mscx, parse_mscx_file, Score};
pub use transcribe::{reseparate, transcribe_score, TranscribeError};
