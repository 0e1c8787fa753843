//! Hand separation for sources without part structure.
//!
//! When a piece arrives as one undifferentiated stream, the two hands are
//! recovered by a fixed pitch threshold. The threshold is placed in the
//! sparsest pitch neighbourhood of a central piano window, where the two
//! hands' ranges are least likely to meet.

use crate::config::SplitConfig;
use crate::midi::{note_to_name, Hand, SourceEvent};
use std::collections::BTreeSet;

/// A fixed split: pitches at or above `split` belong to the right hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandAssignment {
    pub split: u8,
}

impl HandAssignment {
    pub fn new(split: u8) -> Self {
        Self {
            split: split.min(127),
        }
    }

    pub fn hand_for(&self, pitch: u8) -> Hand {
        if pitch >= self.split {
            Hand::Right
        } else {
            Hand::Left
        }
    }
}

/// Computes the split pitch for a multiset of note-on pitches.
///
/// # Arguments
///
/// * `pitches` - Note-on pitches of the stream to split, in any order
/// * `config` - Pivot, candidate window, smoothing radius and fallback
///
/// # Returns
///
/// The lowest pitch played by the right hand. The default split is
/// returned for an empty input, or when the candidate window does not
/// intersect the observed pitch range.
pub fn compute_split(pitches: &[u8], config: &SplitConfig) -> u8 {
    let (Some(&lowest), Some(&highest)) = (pitches.iter().min(), pitches.iter().max()) else {
        return config.default_split;
    };

    let mut histogram = [0usize; 128];
    for &pitch in pitches {
        histogram[pitch.min(127) as usize] += 1;
    }

    let start = config.window_low.max(lowest);
    let end = config.window_high.min(highest);

    let mut best_split = config.default_split;
    let mut min_density = usize::MAX;
    for candidate in start..=end {
        let low = candidate.saturating_sub(config.neighborhood_radius) as usize;
        let high = (candidate.saturating_add(config.neighborhood_radius) as usize).min(127);
        let density: usize = histogram[low..=high].iter().sum();
        if density < min_density {
            min_density = density;
            best_split = candidate;
        }
    }

    tracing::debug!(
        split = best_split,
        name = %note_to_name(best_split),
        density = min_density,
        "computed hand split"
    );
    best_split
}

/// What a source reveals about its own part structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureAnalysis {
    /// Channels carrying note-ons.
    pub channels: BTreeSet<u8>,
    /// Number of tracks or staves carrying note-ons.
    pub note_sources: usize,
    /// Pitch of every note-on.
    pub pitches: Vec<u8>,
}

impl StructureAnalysis {
    /// Records one track or staff.
    pub fn record_source(&mut self, events: &[SourceEvent]) {
        let before = self.pitches.len();
        for event in events {
            if let Some(pitch) = event.note_on_pitch() {
                self.channels.insert(event.channel);
                self.pitches.push(pitch);
            }
        }
        if self.pitches.len() > before {
            self.note_sources += 1;
        }
    }

    /// Note-ons below and at-or-above `pivot`.
    pub fn register_counts(&self, pivot: u8) -> (usize, usize) {
        let low = self.pitches.iter().filter(|&&p| p < pivot).count();
        (low, self.pitches.len() - low)
    }
}

/// Decides whether a source must be split by pitch.
///
/// True only for a single-channel, single-source stream with enough notes
/// in both registers. Anything already separated by channel or by track is
/// trusted as is.
pub fn needs_separation(analysis: &StructureAnalysis, config: &SplitConfig) -> bool {
    let (low, high) = analysis.register_counts(config.register_pivot);
    analysis.channels.len() <= 1
        && analysis.note_sources < 2
        && low > config.min_notes_per_register
        && high > config.min_notes_per_register
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{ResolvedNoteEvent, SourceMessage};

    fn note_ons(channel: u8, pitches: &[u8]) -> Vec<SourceEvent> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| SourceEvent {
                channel,
                ..SourceEvent::from_resolved(ResolvedNoteEvent::on(i as u32 * 480, p), 90)
            })
            .collect()
    }

    #[test]
    fn test_empty_defaults_to_middle_c() {
        assert_eq!(compute_split(&[], &SplitConfig::default()), 60);
    }

    #[test]
    fn test_split_lands_in_gap() {
        let mut pitches = vec![40, 42, 43, 45, 47, 48, 50, 52];
        pitches.extend([68, 70, 71, 72, 74, 76, 77, 79]);
        let split = compute_split(&pitches, &SplitConfig::default());
        // 55..=65 have empty neighbourhoods; the first one wins.
        assert_eq!(split, 55);
    }

    #[test]
    fn test_split_stays_in_window_and_range() {
        let config = SplitConfig::default();
        let cases: [&[u8]; 5] = [
            &[60],
            &[50, 51, 52, 53],
            &[30, 31, 100],
            &[65, 66, 66, 67, 90],
            &[0, 127],
        ];
        for pitches in cases {
            let split = compute_split(pitches, &config);
            let lowest = *pitches.iter().min().unwrap();
            let highest = *pitches.iter().max().unwrap();
            assert!((48..=72).contains(&split), "{:?} -> {}", pitches, split);
            assert!(
                split >= lowest.max(48) && split <= highest.min(72),
                "{:?} -> {}",
                pitches,
                split
            );
        }
    }

    #[test]
    fn test_window_outside_range_returns_default() {
        assert_eq!(compute_split(&[30, 32, 35], &SplitConfig::default()), 60);
        assert_eq!(compute_split(&[90, 95], &SplitConfig::default()), 60);
    }

    #[test]
    fn test_ties_pick_lowest_candidate() {
        // Uniform density everywhere in the window.
        let pitches: Vec<u8> = (40..=80).collect();
        let split = compute_split(&pitches, &SplitConfig::default());
        assert_eq!(split, 48);
    }

    #[test]
    fn test_hand_assignment() {
        let assignment = HandAssignment::new(55);
        assert_eq!(assignment.hand_for(55), Hand::Right);
        assert_eq!(assignment.hand_for(54), Hand::Left);
    }

    #[test]
    fn test_needs_separation_single_channel_both_registers() {
        let mut analysis = StructureAnalysis::default();
        analysis.record_source(&note_ons(0, &[40, 42, 43, 45, 47, 48, 68, 70, 71, 72, 74, 76]));
        assert_eq!(analysis.note_sources, 1);
        assert!(needs_separation(&analysis, &SplitConfig::default()));
    }

    #[test]
    fn test_needs_separation_thresholds() {
        let config = SplitConfig::default();

        let mut too_few_low = StructureAnalysis::default();
        too_few_low.record_source(&note_ons(0, &[40, 41, 42, 43, 44, 70, 71, 72, 73, 74, 75]));
        assert!(!needs_separation(&too_few_low, &config));

        let mut two_channels = StructureAnalysis::default();
        two_channels.record_source(&note_ons(0, &[70, 71, 72, 73, 74, 75]));
        two_channels.record_source(&note_ons(1, &[40, 41, 42, 43, 44, 45]));
        assert!(!needs_separation(&two_channels, &config));

        let mut two_tracks_one_channel = StructureAnalysis::default();
        two_tracks_one_channel.record_source(&note_ons(0, &[70, 71, 72, 73, 74, 75]));
        two_tracks_one_channel.record_source(&note_ons(0, &[40, 41, 42, 43, 44, 45]));
        assert_eq!(two_tracks_one_channel.channels.len(), 1);
        assert!(!needs_separation(&two_tracks_one_channel, &config));
    }

    #[test]
    fn test_record_source_ignores_non_note_tracks() {
        let mut analysis = StructureAnalysis::default();
        analysis.record_source(&[SourceEvent {
            tick: 0,
            channel: 3,
            message: SourceMessage::ControlChange {
                controller: 7,
                value: 100,
            },
        }]);
        assert_eq!(analysis.note_sources, 0);
        assert!(analysis.channels.is_empty());
    }
}
