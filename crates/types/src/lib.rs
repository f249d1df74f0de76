//! Validated text types shared across the depot crates.
//!
//! Each type checks its invariant once, at construction, so the rest of the
//! workspace can pass values around without re-validating them.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// A file name contained a path separator or was a relative path marker
    #[error("Invalid file name '{0}': must not contain '/' or be '.' or '..'")]
    InvalidFileName(String),

    /// A disk name contained characters outside `[\w-]`
    #[error("Invalid disk name '{0}': only letters, digits, '_' and '-' are allowed")]
    InvalidDiskName(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The last segment of a stored file's location, extension included.
///
/// A `FileName` is never empty, never contains `/`, and is never `.` or `..`.
/// Unlike [`NonEmptyText`] it is not trimmed: surrounding whitespace is part
/// of the name on every backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileName(String);

impl FileName {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let input = input.as_ref();
        if input.trim().is_empty() {
            return Err(TextError::Empty);
        }
        if input.contains('/') || input == "." || input == ".." {
            return Err(TextError::InvalidFileName(input.to_owned()));
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the text after the last `.`, if any.
    ///
    /// Hidden files such as `.gitignore` have no extension: a dot in first
    /// position marks the file as hidden rather than starting an extension, and
    /// a trailing dot yields none.
    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.0)
    }
}

/// Extension of a bare file name: the text after the last `.`.
///
/// `None` when there is no dot, when the only dot is the first character
/// (`.env`), or when the name ends with a dot (`file.`).
pub fn extension_of(name: &str) -> Option<&str> {
    match name.rfind('.') {
        None | Some(0) => None,
        Some(idx) if idx == name.len() - 1 => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// The name of a configured storage backend.
///
/// Disk names match `[\w-]+` so they can appear in `disk::path` destinations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiskName(String);

impl DiskName {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let input = input.as_ref();
        if input.is_empty() {
            return Err(TextError::Empty);
        }
        let valid = input
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(TextError::InvalidDiskName(input.to_owned()));
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! text_type_impls {
    ($ty:ident) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $ty {
            type Err = TextError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::new(s)
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

text_type_impls!(NonEmptyText);
text_type_impls!(FileName);
text_type_impls!(DiskName);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  image/png ").unwrap().as_str(), "image/png");
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
    }

    #[test]
    fn file_name_rejects_separators() {
        assert!(FileName::new("report.pdf").is_ok());
        assert!(matches!(
            FileName::new("dir/report.pdf"),
            Err(TextError::InvalidFileName(_))
        ));
        assert!(matches!(FileName::new(".."), Err(TextError::InvalidFileName(_))));
        assert_eq!(FileName::new(""), Err(TextError::Empty));
    }

    #[test]
    fn file_name_extension() {
        assert_eq!(FileName::new("file.png").unwrap().extension(), Some("png"));
        assert_eq!(FileName::new("archive.tar.gz").unwrap().extension(), Some("gz"));
        assert_eq!(FileName::new("file").unwrap().extension(), None);
        assert_eq!(FileName::new(".hidden_file").unwrap().extension(), None);
        assert_eq!(FileName::new("file.").unwrap().extension(), None);
    }

    #[test]
    fn extension_of_bare_names() {
        assert_eq!(extension_of("scan.png"), Some("png"));
        assert_eq!(extension_of("db.tar.gz"), Some("gz"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".env"), None);
        assert_eq!(extension_of("file."), None);
        assert_eq!(extension_of(""), None);
    }

    #[test]
    fn disk_name_charset() {
        assert!(DiskName::new("second_disk").is_ok());
        assert!(DiskName::new("s3-eu").is_ok());
        assert!(matches!(
            DiskName::new("bad disk"),
            Err(TextError::InvalidDiskName(_))
        ));
        assert!(matches!(
            DiskName::new("a::b"),
            Err(TextError::InvalidDiskName(_))
        ));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let name: FileName = serde_json::from_str("\"photo.jpg\"").unwrap();
        assert_eq!(name.as_str(), "photo.jpg");
        assert!(serde_json::from_str::<FileName>("\"a/b\"").is_err());
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"photo.jpg\"");
    }
}
