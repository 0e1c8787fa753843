//! Standard MIDI File (SMF) import functionality.
//!
//! Reads an already-timed .mid file (for example one rendered by a score
//! engraver) into absolute-tick source events, ready for hand separation
//! and re-encoding. Supports SMF Format 0 and Format 1 files.
//!
//! # Limitations
//!
//! - Only note on/off, program change and control change messages are kept
//! - A program change at tick 0 before the first note becomes the track's
//!   instrument rather than an event
//! - The first key signature, tempo, time signature and copyright found
//!   are kept
//! - Other MIDI events (pitch bend, aftertouch, SysEx, etc.) are ignored

use super::{NoteKind, SourceEvent, SourceMessage};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during MIDI import.
#[derive(Debug, Error)]
pub enum MidiImportError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// MIDI parsing failed
    #[error("MIDI parse error: {0}")]
    Parse(String),
    /// Unsupported MIDI format or timing
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// One track of an imported file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTrack {
    /// Name from the TrackName meta event, if any.
    pub name: Option<String>,
    /// Instrument selected at the start of the track.
    pub program: Option<u8>,
    /// Channel events in file order, with absolute ticks.
    pub events: Vec<SourceEvent>,
}

impl SourceTrack {
    /// Whether the track carries any note events.
    pub fn has_notes(&self) -> bool {
        self.events.iter().any(SourceEvent::is_note)
    }
}

/// An imported, already-timed event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMidi {
    /// Name derived from the file, used as a fallback title.
    pub name: String,
    pub ticks_per_quarter: u16,
    pub tracks: Vec<SourceTrack>,
    /// First key signature: (fifths, minor).
    pub key_signature: Option<(i8, bool)>,
    /// First tempo in microseconds per quarter note.
    pub tempo: Option<u32>,
    /// First time signature: (numerator, denominator).
    pub time_signature: Option<(u8, u8)>,
    /// Artist credited by the first copyright notice, if any.
    pub artist: Option<String>,
}

/// Imports SMF bytes into a [`SourceMidi`].
///
/// # Errors
///
/// Returns error if the data cannot be parsed, uses SMPTE timing or is a
/// Format 2 (sequential) file.
pub fn import_source(data: &[u8], name: &str) -> Result<SourceMidi, MidiImportError> {
    let smf = Smf::parse(data).map_err(|e| MidiImportError::Parse(e.to_string()))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) => tpq.as_int(),
        Timing::Timecode(_, _) => {
            return Err(MidiImportError::UnsupportedFormat(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };

    if smf.header.format == Format::Sequential {
        return Err(MidiImportError::UnsupportedFormat(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let mut source = SourceMidi {
        name: name.to_string(),
        ticks_per_quarter,
        tracks: Vec::with_capacity(smf.tracks.len()),
        key_signature: None,
        tempo: None,
        time_signature: None,
        artist: None,
    };

    for track in &smf.tracks {
        let parsed = parse_track(track, &mut source);
        source.tracks.push(parsed);
    }

    tracing::debug!(
        tracks = source.tracks.len(),
        ticks_per_quarter,
        "imported MIDI source"
    );

    Ok(source)
}

/// Reads and imports a .mid or .midi file, named after the file stem.
pub fn import_source_file<P: AsRef<Path>>(path: P) -> Result<SourceMidi, MidiImportError> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Imported MIDI");
    import_source(&data, name)
}

/// Parses a single MIDI track, recording global meta information into
/// `source` on first occurrence.
fn parse_track(track: &[midly::TrackEvent], source: &mut SourceMidi) -> SourceTrack {
    let mut parsed = SourceTrack::default();
    let mut current_tick: u32 = 0;
    let mut seen_note = false;

    for event in track {
        current_tick += event.delta.as_int();

        match event.kind {
            TrackEventKind::Meta(meta) => match meta {
                MetaMessage::TrackName(name_bytes) => {
                    if let Ok(name) = std::str::from_utf8(name_bytes) {
                        parsed.name.get_or_insert_with(|| name.to_string());
                    }
                }
                MetaMessage::KeySignature(fifths, minor) => {
                    source.key_signature.get_or_insert((fifths, minor));
                }
                MetaMessage::Tempo(usec) => {
                    source.tempo.get_or_insert(usec.as_int());
                }
                MetaMessage::Copyright(text_bytes) => {
                    if let Ok(text) = std::str::from_utf8(text_bytes) {
                        let artist = text.trim_start_matches('©').trim();
                        if !artist.is_empty() {
                            source.artist.get_or_insert_with(|| artist.to_string());
                        }
                    }
                }
                MetaMessage::TimeSignature(num, denom_power, _, _) => {
                    source
                        .time_signature
                        .get_or_insert((num, 1u8 << denom_power.min(7)));
                }
                _ => {}
            },
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                let message = match message {
                    MidiMessage::NoteOn { key, vel } => {
                        seen_note = true;
                        let kind = if vel.as_int() > 0 {
                            NoteKind::On
                        } else {
                            NoteKind::Off
                        };
                        SourceMessage::Note {
                            kind,
                            pitch: key.as_int(),
                            velocity: vel.as_int(),
                        }
                    }
                    MidiMessage::NoteOff { key, vel } => {
                        seen_note = true;
                        SourceMessage::Note {
                            kind: NoteKind::Off,
                            pitch: key.as_int(),
                            velocity: vel.as_int(),
                        }
                    }
                    MidiMessage::ProgramChange { program } => {
                        if current_tick == 0 && !seen_note && parsed.program.is_none() {
                            parsed.program = Some(program.as_int());
                            continue;
                        }
                        SourceMessage::ProgramChange {
                            program: program.as_int(),
                        }
                    }
                    MidiMessage::Controller { controller, value } => {
                        SourceMessage::ControlChange {
                            controller: controller.as_int(),
                            value: value.as_int(),
                        }
                    }
                    _ => continue,
                };
                parsed.events.push(SourceEvent {
                    tick: current_tick,
                    channel,
                    message,
                });
            }
            _ => {}
        }
    }

    parsed
}
