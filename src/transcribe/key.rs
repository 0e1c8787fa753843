//! Key signature resolution.
//!
//! Scores often carry several key signature declarations, many of them
//! empty placeholders. The first one with a usable accidental count decides
//! the key of the whole piece.

use crate::score::KeySigDecl;
use serde::{Deserialize, Serialize};

/// Major key names indexed by `fifths + 7`.
static MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];

/// Relative natural minor key names indexed by `fifths + 7`.
static MINOR_KEYS: [&str; 15] = [
    "Abm", "Ebm", "Bbm", "Fm", "Cm", "Gm", "Dm", "Am", "Em", "Bm", "F#m", "C#m", "G#m", "D#m",
    "A#m",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl Mode {
    /// Parses a mode indicator; anything other than "minor" is major.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("minor") => Mode::Minor,
            _ => Mode::Major,
        }
    }
}

/// A key on the circle of fifths.
///
/// Deserialization goes through [`KeySignature::new`], so `fifths` is
/// always within -7..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawKeySignature")]
pub struct KeySignature {
    /// Sharps (positive) or flats (negative), -7..=7.
    fifths: i8,
    pub mode: Mode,
}

/// Unchecked form of [`KeySignature`] as read from serialized data.
#[derive(Deserialize)]
struct RawKeySignature {
    fifths: i8,
    #[serde(default)]
    mode: Mode,
}

impl TryFrom<RawKeySignature> for KeySignature {
    type Error = String;

    fn try_from(raw: RawKeySignature) -> Result<Self, Self::Error> {
        KeySignature::new(raw.fifths, raw.mode)
            .ok_or_else(|| format!("key signature fifths {} outside -7..=7", raw.fifths))
    }
}

impl KeySignature {
    /// C major, used when a score declares no usable key.
    pub const C_MAJOR: KeySignature = KeySignature {
        fifths: 0,
        mode: Mode::Major,
    };

    /// Returns None when `fifths` is outside -7..=7.
    pub fn new(fifths: i8, mode: Mode) -> Option<Self> {
        (-7..=7)
            .contains(&fifths)
            .then_some(Self { fifths, mode })
    }

    pub fn fifths(&self) -> i8 {
        self.fifths
    }

    pub fn is_minor(&self) -> bool {
        self.mode == Mode::Minor
    }

    /// Canonical key name, e.g. "Eb" or "F#m".
    pub fn name(&self) -> &'static str {
        let index = (self.fifths + 7) as usize;
        match self.mode {
            Mode::Major => MAJOR_KEYS[index],
            Mode::Minor => MINOR_KEYS[index],
        }
    }

    /// Interprets one declaration; None for placeholders and unusable counts.
    pub fn from_declaration(decl: &KeySigDecl) -> Option<Self> {
        let text = decl.accidental.as_deref().map(str::trim)?;
        if text.is_empty() {
            return None;
        }
        let fifths = match text.parse::<i8>() {
            Ok(f) => f,
            Err(_) => {
                tracing::debug!(accidental = text, "ignoring unparseable key signature");
                return None;
            }
        };
        let key = Self::new(fifths, Mode::from_name(decl.mode.as_deref()));
        if key.is_none() {
            tracing::debug!(fifths, "ignoring out-of-range key signature");
        }
        key
    }
}

/// Selects the first usable declaration, in document order.
///
/// Returns C major when no declaration carries a usable accidental count.
pub fn resolve_key(declarations: &[KeySigDecl]) -> KeySignature {
    for (index, decl) in declarations.iter().enumerate() {
        match KeySignature::from_declaration(decl) {
            Some(key) => {
                tracing::debug!(index, key = key.name(), "resolved key signature");
                return key;
            }
            None => tracing::debug!(index, "skipping key signature placeholder"),
        }
    }
    KeySignature::C_MAJOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(accidental: Option<&str>, mode: Option<&str>) -> KeySigDecl {
        KeySigDecl {
            accidental: accidental.map(str::to_string),
            mode: mode.map(str::to_string),
        }
    }

    #[test]
    fn test_two_sharps_minor_is_b_minor() {
        assert_eq!(resolve_key(&[decl(Some("2"), Some("minor"))]).name(), "Bm");
    }

    #[test]
    fn test_circle_of_fifths() {
        let expected_major = [
            (-7, "Cb"), (-5, "Db"), (-2, "Bb"), (-1, "F"), (0, "C"), (1, "G"), (4, "E"), (6, "F#"),
            (7, "C#"),
        ];
        for (fifths, name) in expected_major {
            assert_eq!(KeySignature::new(fifths, Mode::Major).unwrap().name(), name);
        }
        let expected_minor = [(-7, "Abm"), (-3, "Cm"), (0, "Am"), (3, "F#m"), (7, "A#m")];
        for (fifths, name) in expected_minor {
            assert_eq!(KeySignature::new(fifths, Mode::Minor).unwrap().name(), name);
        }
    }

    #[test]
    fn test_default_is_c() {
        assert_eq!(resolve_key(&[]).name(), "C");
        assert_eq!(resolve_key(&[decl(None, None), decl(Some("  "), None)]).name(), "C");
    }

    #[test]
    fn test_first_valid_declaration_wins() {
        let decls = [
            decl(None, Some("minor")),
            decl(Some(""), None),
            decl(Some("-3"), None),
            decl(Some("4"), Some("minor")),
        ];
        let key = resolve_key(&decls);
        assert_eq!(key.name(), "Eb");
        assert_eq!(key.fifths(), -3);
        assert!(!key.is_minor());
    }

    #[test]
    fn test_invalid_counts_are_skipped() {
        let decls = [decl(Some("9"), None), decl(Some("abc"), None), decl(Some("1"), None)];
        assert_eq!(resolve_key(&decls).name(), "G");
        assert_eq!(resolve_key(&[decl(Some("-8"), None)]).name(), "C");
    }

    #[test]
    fn test_deserialize_checks_range() {
        let key: KeySignature = serde_json::from_str(r#"{"fifths":-4,"mode":"Minor"}"#).unwrap();
        assert_eq!(key.name(), "Fm");

        let key: KeySignature = serde_json::from_str(r#"{"fifths":3}"#).unwrap();
        assert_eq!(key.name(), "A");

        for json in [r#"{"fifths":20,"mode":"Major"}"#, r#"{"fifths":-128,"mode":"Minor"}"#] {
            let err = serde_json::from_str::<KeySignature>(json).unwrap_err();
            assert!(err.to_string().contains("outside -7..=7"), "{}", err);
        }
    }

    #[test]
    fn test_position_independence() {
        for fifths in -7..=7i8 {
            for mode in ["major", "minor"] {
                let text = fifths.to_string();
                let alone = resolve_key(&[decl(Some(&text), Some(mode))]);
                let later = resolve_key(&[decl(None, None), decl(Some(&text), Some(mode))]);
                assert_eq!(alone, later);
                assert_eq!(alone.fifths(), fifths);
            }
        }
    }
}
