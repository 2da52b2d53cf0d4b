//! Room codes: short identifiers a player can read aloud or type.
//!
//! Codes use an upper-case alphabet with the visually confusable characters
//! (`0`/`O`, `1`/`I`/`L`) removed. Parsing is case-insensitive: `"abc234"`
//! and `"ABC234"` name the same room.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Characters a room code may contain.
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Identifier of one match.
///
/// Always stored in canonical upper-case form, so `Eq`/`Hash` are
/// case-insensitive with respect to the original input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Shortest accepted code.
    pub const MIN_LEN: usize = 4;
    /// Longest accepted code.
    pub const MAX_LEN: usize = 12;
    /// Length of freshly generated codes.
    pub const GENERATED_LEN: usize = 6;

    /// Validates and canonicalizes a code.
    pub fn parse(value: &str) -> Result<Self, RoomCodeError> {
        let len = value.chars().count();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return Err(RoomCodeError::InvalidLength(len));
        }
        let canonical = value.to_ascii_uppercase();
        for (index, ch) in canonical.chars().enumerate() {
            if !ROOM_CODE_ALPHABET.contains(ch) {
                return Err(RoomCodeError::InvalidCharacter { ch, index });
            }
        }
        Ok(Self(canonical))
    }

    /// Builds a code from alphabet indices (each taken modulo the alphabet
    /// size). Used by code generators; the caller supplies the randomness.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Result<Self, RoomCodeError> {
        let alphabet = ROOM_CODE_ALPHABET.as_bytes();
        let code: String = indices
            .into_iter()
            .map(|i| char::from(alphabet[i % alphabet.len()]))
            .collect();
        Self::parse(&code)
    }

    /// The canonical (upper-case) text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Why a string is not a valid [`RoomCode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomCodeError {
    /// Outside `MIN_LEN..=MAX_LEN` characters.
    #[error("room code must be 4-12 characters, got {0}")]
    InvalidLength(usize),

    /// A character outside the alphabet.
    #[error("invalid character '{ch}' at position {index}")]
    InvalidCharacter {
        /// The offending character (upper-cased).
        ch: char,
        /// Its position in the code.
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_has_no_confusables() {
        for ch in ['0', 'O', '1', 'I', 'L'] {
            assert!(!ROOM_CODE_ALPHABET.contains(ch), "{ch} is confusable");
        }
        assert_eq!(ROOM_CODE_ALPHABET.len(), 31);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let lower = RoomCode::parse("abc234").unwrap();
        let upper = RoomCode::parse("ABC234").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.as_str(), "ABC234");
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert_eq!(RoomCode::parse("ABC"), Err(RoomCodeError::InvalidLength(3)));
        assert_eq!(
            RoomCode::parse("ABCDEFGHJKMNP"),
            Err(RoomCodeError::InvalidLength(13))
        );
        assert!(RoomCode::parse("ABCD").is_ok());
        assert!(RoomCode::parse("ABCDEFGHJKMN").is_ok());
    }

    #[test]
    fn test_parse_rejects_confusable_character() {
        assert_eq!(
            RoomCode::parse("AB0DEF"),
            Err(RoomCodeError::InvalidCharacter { ch: '0', index: 2 })
        );
        assert!(RoomCode::parse("room-1").is_err());
    }

    #[test]
    fn test_from_indices_wraps() {
        let code = RoomCode::from_indices([0, 1, 2, 31, 32, 33]).unwrap();
        assert_eq!(code.as_str(), "ABCABC");
    }

    #[test]
    fn test_serde_validates() {
        let code: RoomCode = serde_json::from_str(r#""xyz789""#).unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), r#""XYZ789""#);
        assert!(serde_json::from_str::<RoomCode>(r#""OOPS""#).is_err());
    }
}
