//! Notated duration to tick conversion.

use crate::score::{DurationType, NotatedDuration};

/// Undotted length of a duration category, in ticks.
///
/// Unknown categories resolve to 0.
pub fn base_ticks(kind: DurationType, division: u32) -> u32 {
    match kind {
        DurationType::Whole => division * 4,
        DurationType::Half | DurationType::Measure | DurationType::Breve => division * 2,
        DurationType::Quarter | DurationType::Black => division,
        DurationType::Eighth => division / 2,
        DurationType::Sixteenth => division / 4,
        DurationType::ThirtySecond => division / 8,
        DurationType::SixtyFourth => division / 16,
        DurationType::Unknown => 0,
    }
}

/// Resolves a notated duration to ticks at `division` ticks per quarter.
///
/// A dot adds half the base length, truncated toward zero.
pub fn resolve(kind: DurationType, dotted: bool, division: u32) -> u32 {
    let base = base_ticks(kind, division);
    if dotted {
        base + base / 2
    } else {
        base
    }
}

/// [`resolve`] for a [`NotatedDuration`].
pub fn resolve_duration(duration: NotatedDuration, division: u32) -> u32 {
    resolve(duration.kind, duration.dotted, division)
}
