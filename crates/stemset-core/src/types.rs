//! Common types for stemset
//!
//! The stem set is closed: upstream separation always produces the same six
//! instrument roles, keyed by the names the separation service uses on the
//! wire.

use serde::{Deserialize, Serialize};

/// Number of stems produced by the upstream separation service
pub const NUM_STEMS: usize = 6;

/// Time in seconds on a track's own clock or on the shared project timeline
pub type Seconds = f64;

/// Stem identifiers
///
/// The declaration order doubles as the deterministic anchor-selection order:
/// whenever a sync trigger needs "some other playing track", candidates are
/// scanned in `ALL` order and the first playing one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum StemKey {
    Voz = 0,
    Baixo = 1,
    Bateria = 2,
    Guitarra = 3,
    Teclado = 4,
    Outros = 5,
}

impl StemKey {
    /// All stems in anchor-selection order
    pub const ALL: [StemKey; NUM_STEMS] = [
        StemKey::Voz,
        StemKey::Baixo,
        StemKey::Bateria,
        StemKey::Guitarra,
        StemKey::Teclado,
        StemKey::Outros,
    ];

    /// Wire name, as used by the separation service and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            StemKey::Voz => "voz",
            StemKey::Baixo => "baixo",
            StemKey::Bateria => "bateria",
            StemKey::Guitarra => "guitarra",
            StemKey::Teclado => "teclado",
            StemKey::Outros => "outros",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            StemKey::Voz => "Voz",
            StemKey::Baixo => "Baixo",
            StemKey::Bateria => "Bateria",
            StemKey::Guitarra => "Guitarra",
            StemKey::Teclado => "Teclado",
            StemKey::Outros => "Outros",
        }
    }

    /// Parse a wire name back into a key
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Slot index for fixed per-stem arrays
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for StemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for StemKey {
    type Err = UnknownStemName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownStemName(s.to_string()))
    }
}

/// Error returned when parsing an unrecognized stem name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStemName(pub String);

impl std::fmt::Display for UnknownStemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown stem name: {}", self.0)
    }
}

impl std::error::Error for UnknownStemName {}

/// Playback state for a stem track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_enumeration() {
        assert_eq!(StemKey::ALL.len(), NUM_STEMS);
        assert_eq!(StemKey::Voz.name(), "voz");
        assert_eq!(StemKey::Teclado.label(), "Teclado");
        assert_eq!(StemKey::Bateria as usize, 2);
    }

    #[test]
    fn test_name_roundtrip() {
        for key in StemKey::ALL {
            assert_eq!(StemKey::from_name(key.name()), Some(key));
            assert_eq!(key.name().parse::<StemKey>().unwrap(), key);
        }
        assert!("piano".parse::<StemKey>().is_err());
    }

    #[test]
    fn test_serde_wire_names() {
        let json = serde_json::to_string(&StemKey::Guitarra).unwrap();
        assert_eq!(json, "\"guitarra\"");
        let parsed: StemKey = serde_json::from_str("\"outros\"").unwrap();
        assert_eq!(parsed, StemKey::Outros);
    }
}
