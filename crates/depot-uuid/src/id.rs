//! Canonical file identifier.

use crate::{UuidError, UuidResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Identifier of a tracked file, always in canonical form (32 lowercase hex characters).
///
/// # Construction
/// - [`FileId::new`] generates a fresh random identifier (used by record stores on create).
/// - [`FileId::parse`] validates an externally supplied identifier.
///
/// # Display format
/// Displays as the canonical 32-character lowercase hex string without hyphens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Uuid);

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl FileId {
    /// Generates a new random (v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not 32 lowercase hex characters.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "file id must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid file id '{}': {}", input, e)))
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical form.
    ///
    /// Purely syntactic: exactly 32 bytes, `0-9` and `a-f` only.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<id>/` where `s1`/`s2` are the first two
    /// pairs of hex characters of this identifier.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for FileId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FileId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FileId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_generates_canonical_id() {
        let id = FileId::new();
        let canonical = id.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(FileId::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_id() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let id = FileId::parse(canonical).unwrap();

        assert_eq!(id.to_string(), canonical);
        assert_eq!(canonical.parse::<FileId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_hyphenated_id() {
        let result = FileId::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_and_short_ids() {
        assert!(FileId::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(FileId::parse("550e8400").is_err());
        assert!(FileId::parse("").is_err());
    }

    #[test]
    fn test_sharded_dir_layout() {
        let temp = TempDir::new().unwrap();
        let id = FileId::parse("550e8400e29b41d4a716446655440000").unwrap();

        let dir = id.sharded_dir(temp.path());

        assert_eq!(
            dir,
            temp.path()
                .join("55")
                .join("0e")
                .join("550e8400e29b41d4a716446655440000")
        );
    }

    #[test]
    fn test_serde_round_trip_uses_canonical_string() {
        let id = FileId::parse("abcd123456789012abcd123456789012").unwrap();
        let json = serde_json::to_string(&id).unwrap();

        assert_eq!(json, "\"abcd123456789012abcd123456789012\"");
        assert_eq!(serde_json::from_str::<FileId>(&json).unwrap(), id);
        assert!(serde_json::from_str::<FileId>("\"not-an-id\"").is_err());
    }
}
