//! Track assembly.
//!
//! Merges the absolute-tick events of both hands into one time-ordered
//! sequence and writes each hand's share into its own delta-timed track.
//! Each track keeps its own tick cursor, so a delta always measures the
//! distance to the previous event on the same channel.

use super::key::KeySignature;
use super::split::HandAssignment;
use crate::midi::{Hand, NoteKind, OutputTrack, SourceEvent, SourceMessage, TrackMessage};

/// How the events of a source map onto the two hands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeparationMode {
    /// The source already keeps the hands apart (two staves or tracks).
    /// `shared` holds events that apply to both hands, such as a pedal
    /// track's controller changes.
    Structural {
        right: Vec<SourceEvent>,
        left: Vec<SourceEvent>,
        shared: Vec<SourceEvent>,
    },
    /// One combined stream, split by pitch. Program and control changes
    /// apply to both hands.
    Inferred {
        events: Vec<SourceEvent>,
        assignment: HandAssignment,
    },
}

/// Destination of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Hand(Hand),
    Both,
}

impl SeparationMode {
    /// Tags every event with its destination, keeping input order.
    pub fn route(self) -> Vec<(Route, SourceEvent)> {
        match self {
            SeparationMode::Structural {
                right,
                left,
                shared,
            } => right
                .into_iter()
                .map(|e| (Route::Hand(Hand::Right), e))
                .chain(left.into_iter().map(|e| (Route::Hand(Hand::Left), e)))
                .chain(shared.into_iter().map(|e| (Route::Both, e)))
                .collect(),
            SeparationMode::Inferred { events, assignment } => events
                .into_iter()
                .map(|e| {
                    let route = match e.message {
                        SourceMessage::Note { pitch, .. } => {
                            Route::Hand(assignment.hand_for(pitch))
                        }
                        SourceMessage::ProgramChange { .. }
                        | SourceMessage::ControlChange { .. } => Route::Both,
                    };
                    (route, e)
                })
                .collect(),
        }
    }
}

/// Leading meta information written to both hand tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOptions {
    pub right_name: String,
    pub left_name: String,
    /// Key signature event, if one should be written.
    pub key: Option<KeySignature>,
    /// Program per hand, indexed by [`Hand::index`].
    pub programs: [u8; 2],
}

impl TrackOptions {
    fn name(&self, hand: Hand) -> &str {
        match hand {
            Hand::Right => &self.right_name,
            Hand::Left => &self.left_name,
        }
    }
}

/// Equal-tick order: note-offs first, everything else keeps input order.
fn merge_rank(event: &SourceEvent) -> u8 {
    match event.message {
        SourceMessage::Note {
            kind: NoteKind::Off,
            ..
        } => 0,
        _ => 1,
    }
}

/// Rewrites a source message onto a hand's channel.
fn to_track_message(hand: Hand, message: SourceMessage) -> TrackMessage {
    let channel = hand.channel();
    match message {
        SourceMessage::Note {
            kind: NoteKind::On,
            pitch,
            velocity,
        } => TrackMessage::NoteOn {
            channel,
            pitch,
            velocity,
        },
        SourceMessage::Note {
            kind: NoteKind::Off,
            pitch,
            velocity,
        } => TrackMessage::NoteOff {
            channel,
            pitch,
            velocity,
        },
        SourceMessage::ProgramChange { program } => {
            TrackMessage::ProgramChange { channel, program }
        }
        SourceMessage::ControlChange { controller, value } => TrackMessage::ControlChange {
            channel,
            controller,
            value,
        },
    }
}

fn header_track(hand: Hand, options: &TrackOptions) -> OutputTrack {
    let mut track = OutputTrack::new(options.name(hand));
    if let Some(key) = options.key {
        track.push_at(
            0,
            TrackMessage::KeySignature {
                fifths: key.fifths(),
                minor: key.is_minor(),
            },
        );
    }
    track.push_at(
        0,
        TrackMessage::ProgramChange {
            channel: hand.channel(),
            program: options.programs[hand.index()],
        },
    );
    track
}

/// Builds the right-hand (channel 0) and left-hand (channel 1) tracks.
///
/// # Arguments
///
/// * `mode` - Absolute-tick events and how they map onto the hands
/// * `options` - Track names, key signature and program per hand
///
/// # Returns
///
/// The right-hand and left-hand tracks, in that order, each closed with
/// an end-of-track event
pub fn assemble_tracks(mode: SeparationMode, options: &TrackOptions) -> [OutputTrack; 2] {
    let mut routed = mode.route();
    routed.sort_by_key(|(_, event)| (event.tick, merge_rank(event)));

    let mut tracks = Hand::ALL.map(|hand| header_track(hand, options));

    for (route, event) in routed {
        match route {
            Route::Hand(hand) => {
                tracks[hand.index()].push_at(event.tick, to_track_message(hand, event.message));
            }
            Route::Both => {
                for hand in Hand::ALL {
                    tracks[hand.index()].push_at(event.tick, to_track_message(hand, event.message));
                }
            }
        }
    }

    for track in &mut tracks {
        track.finish();
    }
    tracks
}
