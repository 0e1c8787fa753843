//! The transcription engine.
//!
//! Turns a parsed score, or an already-timed MIDI source, into a two-hand
//! [`Arrangement`]. Sources that keep the hands apart (two staves, two
//! tracks, or two channels) are carried over as they are; a single
//! undifferentiated stream is split by pitch.

pub mod assemble;
pub mod duration;
pub mod key;
pub mod split;
pub mod ties;

pub use assemble::{assemble_tracks, Route, SeparationMode, TrackOptions};
pub use duration::{resolve, resolve_duration};
pub use key::{resolve_key, KeySignature, Mode};
pub use split::{compute_split, needs_separation, HandAssignment, StructureAnalysis};
pub use ties::{assemble, assemble_staff, VoiceAssembler};

use crate::config::TranscribeConfig;
use crate::midi::{Arrangement, OutputTrack, SourceEvent, SourceMidi, TrackMessage};
use crate::score::Score;
use thiserror::Error;

/// Highest resolution a metrical SMF header can carry.
const MAX_TICKS_PER_QUARTER: u32 = 0x7FFF;

/// Tempo written when a MIDI source declares none (120 BPM).
const DEFAULT_TEMPO: u32 = 500_000;

/// Errors that stop a transcription.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscribeError {
    /// Neither two separate parts nor one splittable stream was found.
    #[error("cannot separate hands: found {found} note-bearing part(s) and no splittable stream")]
    InsufficientParts { found: usize },
    #[error("division {0} is outside the MIDI range 1..=32767")]
    DivisionOutOfRange(u32),
}

/// Chooses how the note-bearing sources map onto the hands.
///
/// `sources` holds one event stream per note-bearing staff, track or
/// channel, in order; only the first two are used. `shared` holds program
/// and control changes from sources without notes; they go to both hands.
fn separate(
    mut sources: Vec<Vec<SourceEvent>>,
    shared: Vec<SourceEvent>,
    analysis: &StructureAnalysis,
    config: &TranscribeConfig,
) -> Result<SeparationMode, TranscribeError> {
    if needs_separation(analysis, &config.split) {
        let split = config
            .split_override
            .unwrap_or_else(|| compute_split(&analysis.pitches, &config.split));
        tracing::info!(
            split,
            notes = analysis.pitches.len(),
            shared = shared.len(),
            "splitting single stream by pitch"
        );
        let mut events = sources.concat();
        events.extend(shared);
        return Ok(SeparationMode::Inferred {
            events,
            assignment: HandAssignment::new(split),
        });
    }

    if sources.len() < 2 {
        return Err(TranscribeError::InsufficientParts {
            found: sources.len(),
        });
    }
    if sources.len() > 2 {
        tracing::warn!(parts = sources.len(), "only the first two parts are transcribed");
        sources.truncate(2);
    }
    tracing::info!(shared = shared.len(), "using existing part separation");
    let left = sources.pop().unwrap_or_default();
    let right = sources.pop().unwrap_or_default();
    Ok(SeparationMode::Structural {
        right,
        left,
        shared,
    })
}

fn check_division(division: u32) -> Result<u16, TranscribeError> {
    if division == 0 || division > MAX_TICKS_PER_QUARTER {
        return Err(TranscribeError::DivisionOutOfRange(division));
    }
    Ok(division as u16)
}

/// Conductor track contents.
struct TrackMeta<'a> {
    title: &'a str,
    artist: Option<&'a str>,
    tempo: u32,
    time_signature: Option<(u8, u8)>,
    key: KeySignature,
}

fn metadata_track(meta: &TrackMeta) -> OutputTrack {
    let mut track = OutputTrack::new(meta.title);
    if let Some(artist) = meta.artist {
        track.push_at(0, TrackMessage::Copyright(format!("© {}", artist)));
    }
    track.push_at(
        0,
        TrackMessage::SetTempo {
            microseconds_per_beat: meta.tempo,
        },
    );
    if let Some((numerator, denominator)) = meta.time_signature {
        if denominator.is_power_of_two() {
            track.push_at(
                0,
                TrackMessage::TimeSignature {
                    numerator,
                    denominator_power: denominator.trailing_zeros() as u8,
                },
            );
        }
    }
    track.push_at(
        0,
        TrackMessage::KeySignature {
            fifths: meta.key.fifths(),
            minor: meta.key.is_minor(),
        },
    );
    track.finish();
    track
}

fn bpm_to_tempo(bpm: f64) -> Option<u32> {
    (bpm.is_finite() && bpm > 0.0).then(|| (60_000_000.0 / bpm).round() as u32)
}

/// Transcribes a parsed score into a two-hand arrangement.
///
/// Two or more note-bearing staves map to right and left hand directly.
/// A single staff is split by pitch when it spans both registers.
///
/// # Arguments
///
/// * `score` - Parsed score with its staves, key declarations and metadata
/// * `config` - Split thresholds, track names, programs and metadata switch
///
/// # Returns
///
/// An arrangement holding the right-hand and left-hand tracks, preceded
/// by a metadata track when `config.metadata_track` is set
///
/// # Errors
///
/// Returns error if the division is outside 1..=32767, or if the score has
/// neither two note-bearing staves nor one staff spanning both registers
pub fn transcribe_score(
    score: &Score,
    config: &TranscribeConfig,
) -> Result<Arrangement, TranscribeError> {
    let ticks_per_quarter = check_division(score.division)?;
    let key = resolve_key(&score.key_signatures);

    let mut analysis = StructureAnalysis::default();
    let sources: Vec<Vec<SourceEvent>> = score
        .note_bearing_staves()
        .map(|staff| {
            let events: Vec<SourceEvent> = assemble_staff(staff, score.division)
                .into_iter()
                .map(|e| SourceEvent::from_resolved(e, config.velocity))
                .collect();
            tracing::debug!(staff = %staff.id, events = events.len(), "resolved staff");
            analysis.record_source(&events);
            events
        })
        .collect();

    let mode = separate(sources, Vec::new(), &analysis, config)?;
    let options = TrackOptions {
        right_name: config.right_hand_name.clone(),
        left_name: config.left_hand_name.clone(),
        key: config.key_signature_meta.then_some(key),
        programs: [config.program; 2],
    };
    let hands = assemble_tracks(mode, &options);

    let metadata = &score.metadata;
    let title = metadata.title.as_deref().unwrap_or("Untitled");
    let mut tracks = Vec::with_capacity(3);
    if config.metadata_track {
        tracks.push(metadata_track(&TrackMeta {
            title,
            artist: metadata.artist.as_deref(),
            tempo: metadata
                .tempo_bpm
                .and_then(bpm_to_tempo)
                .unwrap_or(DEFAULT_TEMPO),
            time_signature: metadata.time_signature,
            key,
        }));
    }
    tracks.extend(hands);

    Ok(Arrangement::new(title, ticks_per_quarter, tracks))
}

/// Summarizes the part structure of an imported MIDI source.
pub fn analyze(source: &SourceMidi) -> StructureAnalysis {
    let mut analysis = StructureAnalysis::default();
    for track in &source.tracks {
        analysis.record_source(&track.events);
    }
    analysis
}

/// Splits one track's events into one stream per channel, in channel order.
fn split_by_channel(events: &[SourceEvent]) -> Vec<Vec<SourceEvent>> {
    let mut channels: Vec<u8> = events.iter().map(|e| e.channel).collect();
    channels.sort_unstable();
    channels.dedup();
    channels
        .into_iter()
        .map(|channel| {
            events
                .iter()
                .filter(|e| e.channel == channel)
                .copied()
                .collect::<Vec<_>>()
        })
        .filter(|stream| stream.iter().any(SourceEvent::is_note))
        .collect()
}

/// Re-separates an already-timed MIDI source into two hands.
///
/// Keeps the source's resolution, key signature and per-track instruments,
/// so running it on its own output reproduces the same tracks.
///
/// # Arguments
///
/// * `source` - Imported MIDI file with absolute-tick events per track
/// * `config` - Split thresholds, track names, programs and metadata switch
///
/// # Returns
///
/// An arrangement with one track per hand. Controller and program events
/// from tracks without notes are copied to both hands.
///
/// # Errors
///
/// Returns error if the resolution exceeds 32767, or if the source has
/// neither two note-bearing parts nor one stream spanning both registers
pub fn reseparate(
    source: &SourceMidi,
    config: &TranscribeConfig,
) -> Result<Arrangement, TranscribeError> {
    let ticks_per_quarter = check_division(u32::from(source.ticks_per_quarter))?;
    let analysis = analyze(source);

    let note_tracks: Vec<_> = source.tracks.iter().filter(|t| t.has_notes()).collect();
    let program_of = |index: usize| {
        note_tracks
            .get(index)
            .and_then(|t| t.program)
            .unwrap_or(config.program)
    };

    let (sources, programs) = match note_tracks.as_slice() {
        [single] if analysis.channels.len() >= 2 => {
            tracing::debug!(channels = analysis.channels.len(), "separating hands by channel");
            let program = program_of(0);
            (split_by_channel(&single.events), [program; 2])
        }
        [_] => (vec![note_tracks[0].events.clone()], [program_of(0); 2]),
        tracks => (
            tracks.iter().map(|t| t.events.clone()).collect(),
            [program_of(0), program_of(1)],
        ),
    };

    let shared: Vec<SourceEvent> = source
        .tracks
        .iter()
        .filter(|t| !t.has_notes())
        .flat_map(|t| t.events.iter().copied())
        .collect();

    let key = source.key_signature.and_then(|(fifths, minor)| {
        KeySignature::new(fifths, if minor { Mode::Minor } else { Mode::Major })
    });

    let mode = separate(sources, shared, &analysis, config)?;
    let programs = match mode {
        SeparationMode::Inferred { .. } => [programs[0]; 2],
        SeparationMode::Structural { .. } => programs,
    };
    let options = TrackOptions {
        right_name: config.right_hand_name.clone(),
        left_name: config.left_hand_name.clone(),
        key: key.filter(|_| config.key_signature_meta),
        programs,
    };
    let hands = assemble_tracks(mode, &options);

    let mut tracks = Vec::with_capacity(3);
    if config.metadata_track {
        tracks.push(metadata_track(&TrackMeta {
            title: &source.name,
            artist: source.artist.as_deref(),
            tempo: source.tempo.unwrap_or(DEFAULT_TEMPO),
            time_signature: source.time_signature,
            key: key.unwrap_or(KeySignature::C_MAJOR),
        }));
    }
    tracks.extend(hands);

    Ok(Arrangement::new(source.name.clone(), ticks_per_quarter, tracks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{import_source, SourceMessage, SourceTrack};
    use crate::score::{
        ChordNote, DurationType, KeySigDecl, Measure, NotatedDuration, NotatedEvent, Staff,
    };

    fn quarter(pitch: u8) -> NotatedEvent {
        NotatedEvent::Chord {
            duration: NotatedDuration::new(DurationType::Quarter),
            notes: vec![ChordNote::new(pitch)],
        }
    }

    fn staff(id: &str, voices: Vec<Vec<NotatedEvent>>) -> Staff {
        Staff {
            id: id.into(),
            measures: vec![Measure { voices }],
        }
    }

    fn note_ons(track: &OutputTrack) -> Vec<(u8, u8)> {
        track
            .events()
            .iter()
            .filter_map(|e| match e.message {
                TrackMessage::NoteOn { channel, pitch, .. } => Some((channel, pitch)),
                _ => None,
            })
            .collect()
    }

    const HIGH: [u8; 8] = [68, 70, 71, 72, 74, 76, 77, 79];
    const LOW: [u8; 8] = [40, 42, 43, 45, 47, 48, 50, 52];

    #[test]
    fn test_two_voice_single_staff_is_split_by_pitch() {
        let mut score = Score::new(480);
        score.staves.push(staff(
            "1",
            vec![
                HIGH.iter().map(|&p| quarter(p)).collect(),
                LOW.iter().map(|&p| quarter(p)).collect(),
            ],
        ));

        let arrangement = transcribe_score(&score, &TranscribeConfig::default()).unwrap();
        assert_eq!(arrangement.track_count(), 2);
        let [right, left] = [&arrangement.tracks()[0], &arrangement.tracks()[1]];

        assert_eq!(note_ons(right), HIGH.iter().map(|&p| (0, p)).collect::<Vec<_>>());
        assert_eq!(note_ons(left), LOW.iter().map(|&p| (1, p)).collect::<Vec<_>>());
    }

    #[test]
    fn test_two_staves_are_kept_as_hands() {
        let mut score = Score::new(480);
        score.staves.push(staff("1", vec![vec![quarter(60), quarter(62)]]));
        score.staves.push(staff("2", vec![vec![quarter(64)]]));
        score.staves.push(staff("3", vec![vec![quarter(30)]]));

        let arrangement = transcribe_score(&score, &TranscribeConfig::default()).unwrap();
        let tracks = arrangement.tracks();
        assert_eq!(tracks.len(), 2);
        // Pitch 64 is above 60 but stays in the left hand: no pitch split.
        assert_eq!(note_ons(&tracks[0]), vec![(0, 60), (0, 62)]);
        assert_eq!(note_ons(&tracks[1]), vec![(1, 64)]);
        assert_eq!(tracks[0].name, "Right Hand");
        assert_eq!(tracks[1].name, "Left Hand");
    }

    #[test]
    fn test_insufficient_parts() {
        let empty = Score::new(480);
        assert_eq!(
            transcribe_score(&empty, &TranscribeConfig::default()),
            Err(TranscribeError::InsufficientParts { found: 0 })
        );

        let mut narrow = Score::new(480);
        narrow
            .staves
            .push(staff("1", vec![HIGH.iter().map(|&p| quarter(p)).collect()]));
        assert_eq!(
            transcribe_score(&narrow, &TranscribeConfig::default()),
            Err(TranscribeError::InsufficientParts { found: 1 })
        );
    }

    #[test]
    fn test_division_out_of_range() {
        let mut score = Score::new(40_000);
        score.staves.push(staff("1", vec![vec![quarter(60)]]));
        score.staves.push(staff("2", vec![vec![quarter(48)]]));
        assert_eq!(
            transcribe_score(&score, &TranscribeConfig::default()),
            Err(TranscribeError::DivisionOutOfRange(40_000))
        );
    }

    #[test]
    fn test_split_override() {
        let mut score = Score::new(480);
        score.staves.push(staff(
            "1",
            vec![
                HIGH.iter().map(|&p| quarter(p)).collect(),
                LOW.iter().map(|&p| quarter(p)).collect(),
            ],
        ));
        let config = TranscribeConfig {
            split_override: Some(72),
            ..TranscribeConfig::default()
        };
        let arrangement = transcribe_score(&score, &config).unwrap();
        assert_eq!(note_ons(&arrangement.tracks()[0]).len(), 5);
        assert_eq!(note_ons(&arrangement.tracks()[1]).len(), 11);
    }

    #[test]
    fn test_metadata_track_and_key() {
        let mut score = Score::new(480);
        score.staves.push(staff("1", vec![vec![quarter(72)]]));
        score.staves.push(staff("2", vec![vec![quarter(48)]]));
        score.key_signatures = vec![
            KeySigDecl::default(),
            KeySigDecl {
                accidental: Some("2".into()),
                mode: Some("minor".into()),
            },
        ];
        score.metadata.title = Some("Etude".into());
        score.metadata.artist = Some("Someone".into());
        score.metadata.tempo_bpm = Some(90.0);
        score.metadata.time_signature = Some((3, 4));

        let config = TranscribeConfig {
            metadata_track: true,
            ..TranscribeConfig::default()
        };
        let arrangement = transcribe_score(&score, &config).unwrap();
        assert_eq!(arrangement.name, "Etude");
        assert_eq!(arrangement.track_count(), 3);

        let messages: Vec<_> = arrangement.tracks()[0]
            .events()
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert_eq!(
            messages,
            vec![
                TrackMessage::TrackName("Etude".into()),
                TrackMessage::Copyright("© Someone".into()),
                TrackMessage::SetTempo {
                    microseconds_per_beat: 666_667,
                },
                TrackMessage::TimeSignature {
                    numerator: 3,
                    denominator_power: 2,
                },
                TrackMessage::KeySignature {
                    fifths: 2,
                    minor: true,
                },
                TrackMessage::EndOfTrack,
            ]
        );
        assert_eq!(
            arrangement.tracks()[1].events()[1].message,
            TrackMessage::KeySignature {
                fifths: 2,
                minor: true,
            }
        );
    }

    fn source_track(events: Vec<SourceEvent>) -> SourceTrack {
        SourceTrack {
            name: None,
            program: None,
            events,
        }
    }

    fn note(tick: u32, channel: u8, pitch: u8, on: bool) -> SourceEvent {
        let kind = if on { crate::midi::NoteKind::On } else { crate::midi::NoteKind::Off };
        SourceEvent {
            tick,
            channel,
            message: SourceMessage::Note {
                kind,
                pitch,
                velocity: if on { 80 } else { 0 },
            },
        }
    }

    fn source(tracks: Vec<SourceTrack>) -> SourceMidi {
        SourceMidi {
            name: "piece".into(),
            ticks_per_quarter: 480,
            tracks,
            key_signature: None,
            tempo: None,
            time_signature: None,
            artist: None,
        }
    }

    #[test]
    fn test_reseparate_splits_single_track_by_channel() {
        let single = source_track(vec![
            note(0, 0, 72, true),
            note(0, 3, 48, true),
            note(480, 0, 72, false),
            note(960, 3, 48, false),
        ]);
        let arrangement = reseparate(&source(vec![single]), &TranscribeConfig::default()).unwrap();
        assert_eq!(note_ons(&arrangement.tracks()[0]), vec![(0, 72)]);
        assert_eq!(note_ons(&arrangement.tracks()[1]), vec![(1, 48)]);
        assert_eq!(arrangement.tracks()[1].deltas(), vec![0, 0, 0, 960, 0]);
    }

    #[test]
    fn test_reseparate_infers_single_channel_stream() {
        let events = HIGH
            .iter()
            .zip(LOW.iter())
            .enumerate()
            .flat_map(|(i, (&hi, &lo))| {
                let tick = i as u32 * 480;
                [
                    note(tick, 0, hi, true),
                    note(tick, 0, lo, true),
                    note(tick + 480, 0, hi, false),
                    note(tick + 480, 0, lo, false),
                ]
            })
            .collect();
        let arrangement =
            reseparate(&source(vec![source_track(events)]), &TranscribeConfig::default()).unwrap();
        assert!(note_ons(&arrangement.tracks()[0]).iter().all(|&(c, p)| c == 0 && p >= 55));
        assert!(note_ons(&arrangement.tracks()[1]).iter().all(|&(c, p)| c == 1 && p < 55));
        assert_eq!(note_ons(&arrangement.tracks()[1]).len(), 8);
    }

    fn control(tick: u32, channel: u8, controller: u8, value: u8) -> SourceEvent {
        SourceEvent {
            tick,
            channel,
            message: SourceMessage::ControlChange { controller, value },
        }
    }

    fn controls(track: &OutputTrack) -> Vec<(u32, u8, u8)> {
        track
            .events()
            .iter()
            .zip(track.absolute_ticks())
            .filter_map(|(e, tick)| match e.message {
                TrackMessage::ControlChange { channel, value, .. } => Some((tick, channel, value)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_reseparate_keeps_controls_from_note_free_tracks() {
        let pedal = source_track(vec![control(0, 0, 64, 127), control(960, 0, 64, 0)]);
        let notes = HIGH
            .iter()
            .chain(LOW.iter())
            .enumerate()
            .flat_map(|(i, &p)| {
                let tick = i as u32 * 120;
                [note(tick, 0, p, true), note(tick + 120, 0, p, false)]
            })
            .collect();
        let arrangement =
            reseparate(&source(vec![pedal, source_track(notes)]), &TranscribeConfig::default())
                .unwrap();

        assert_eq!(controls(&arrangement.tracks()[0]), vec![(0, 0, 127), (960, 0, 0)]);
        assert_eq!(controls(&arrangement.tracks()[1]), vec![(0, 1, 127), (960, 1, 0)]);
    }

    #[test]
    fn test_reseparate_structural_shares_note_free_tracks() {
        let pedal = source_track(vec![control(480, 2, 64, 127)]);
        let right = source_track(vec![note(0, 0, 72, true), note(960, 0, 72, false)]);
        let left = source_track(vec![note(0, 1, 48, true), note(960, 1, 48, false)]);
        let arrangement =
            reseparate(&source(vec![pedal, right, left]), &TranscribeConfig::default()).unwrap();

        assert_eq!(arrangement.track_count(), 2);
        assert_eq!(controls(&arrangement.tracks()[0]), vec![(480, 0, 127)]);
        assert_eq!(controls(&arrangement.tracks()[1]), vec![(480, 1, 127)]);
    }

    #[test]
    fn test_reseparate_metadata_credits_artist() {
        let right = source_track(vec![note(0, 0, 72, true), note(960, 0, 72, false)]);
        let left = source_track(vec![note(0, 1, 48, true), note(960, 1, 48, false)]);
        let mut midi = source(vec![right, left]);
        midi.artist = Some("Jane Doe".into());
        let config = TranscribeConfig {
            metadata_track: true,
            ..TranscribeConfig::default()
        };

        let arrangement = reseparate(&midi, &config).unwrap();
        let meta = &arrangement.tracks()[0];
        assert_eq!(meta.name, "piece");
        assert_eq!(meta.events()[1].message, TrackMessage::Copyright("© Jane Doe".into()));
    }

    #[test]
    fn test_reseparate_own_output_is_stable() {
        let mut score = Score::new(480);
        score.staves.push(staff(
            "1",
            vec![
                HIGH.iter().map(|&p| quarter(p)).collect(),
                LOW.iter().map(|&p| quarter(p)).collect(),
            ],
        ));
        score.key_signatures = vec![KeySigDecl {
            accidental: Some("-3".into()),
            mode: None,
        }];
        let first = transcribe_score(&score, &TranscribeConfig::default()).unwrap();

        let imported = import_source(&first.to_smf_bytes(), "Untitled").unwrap();
        assert!(!needs_separation(&analyze(&imported), &TranscribeConfig::default().split));
        let second = reseparate(&imported, &TranscribeConfig::default()).unwrap();

        for (a, b) in first.tracks().iter().zip(second.tracks()) {
            assert_eq!(a.deltas(), b.deltas());
            assert_eq!(a.events(), b.events());
        }
        assert_eq!(first.to_smf_bytes(), second.to_smf_bytes());
    }

    #[test]
    fn test_bpm_to_tempo() {
        assert_eq!(bpm_to_tempo(120.0), Some(500_000));
        assert_eq!(bpm_to_tempo(0.0), None);
        assert_eq!(bpm_to_tempo(f64::NAN), None);
    }
}
