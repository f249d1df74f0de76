//! Destination string parsing.
//!
//! A destination is the `["<disk>::"] path-and-or-name` string callers use to say where a
//! file should be created or moved to:
//!
//! ```text
//! "path/to/file.png"        -> path "path/to/", name "file.png", extension "png"
//! "path/to/"                -> path "path/to/", no name
//! "archive::2024/scan.png"  -> disk "archive", path "2024/", name "scan.png"
//! ```
//!
//! The parser is pure; it never consults the configured disks. Whether a qualified disk
//! exists is decided by the repository.

use crate::constants::ROOT_PATH;
use crate::{DiskName, FileName, FilesError, FilesResult};
use depot_types::extension_of;
use regex::Regex;
use std::sync::LazyLock;

static DISK_QUALIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<disk>[\w-]+)::(?<rest>.+)$").expect("disk qualifier pattern is valid")
});

static PATH_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w/.\-()]*$").expect("path character pattern is valid"));

/// Structured form of a destination string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    disk: Option<DiskName>,
    path: String,
    name: Option<String>,
    extension: Option<String>,
}

impl Destination {
    /// Parses a destination string.
    ///
    /// `path` keeps the form it had in the input (trailing `/` included, one leading `/`
    /// stripped) and is `"/"` for the backend root. Use [`Destination::directory`] for the
    /// normalised directory stored on a [`crate::File`].
    ///
    /// The extension is the text after the last `.` of the name. Hidden files (`.env`) and
    /// names ending in a dot (`file.`) have none; `file.` yields `None` rather than an empty
    /// extension, so a stored extension is never blank.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidArgument`] if the part after the optional disk qualifier
    /// contains characters outside `[\w/.\-()]` or a `..` segment.
    pub fn parse(destination: &str) -> FilesResult<Self> {
        let (disk, rest) = match DISK_QUALIFIER.captures(destination) {
            Some(caps) => {
                let disk = DiskName::new(&caps["disk"])?;
                let rest = caps.name("rest").map_or("", |m| m.as_str());
                (Some(disk), rest)
            }
            None => (None, destination),
        };

        if !PATH_CHARACTERS.is_match(rest) {
            return Err(FilesError::InvalidArgument(format!(
                "destination '{}' may only contain letters, digits, '_', '-', '.', '(', ')' and '/'",
                destination
            )));
        }
        if rest.split('/').any(|segment| segment == "..") {
            return Err(FilesError::InvalidArgument(format!(
                "destination '{}' must not contain '..' segments",
                destination
            )));
        }

        if rest.is_empty() || rest == ROOT_PATH {
            return Ok(Self::directory_only(disk, ROOT_PATH));
        }

        let rest = rest.strip_prefix('/').unwrap_or(rest);

        let (path, name) = match rest.rfind('/') {
            // e.g. "file.png"
            None => (ROOT_PATH, rest),
            // e.g. "path/to/"
            Some(idx) if idx == rest.len() - 1 => return Ok(Self::directory_only(disk, rest)),
            Some(idx) => (&rest[..=idx], &rest[idx + 1..]),
        };

        Ok(Self {
            disk,
            path: path.to_owned(),
            name: Some(name.to_owned()),
            extension: extension_of(name).map(str::to_owned),
        })
    }

    /// A destination in `directory` (normalised or not) named `name`, on the current disk.
    pub(crate) fn in_directory(directory: &str, name: &FileName) -> Self {
        let path = normalize_directory(directory);
        Self {
            disk: None,
            path: if path.is_empty() {
                ROOT_PATH.to_owned()
            } else {
                format!("{}/", path)
            },
            name: Some(name.as_str().to_owned()),
            extension: name.extension().map(str::to_owned),
        }
    }

    fn directory_only(disk: Option<DiskName>, path: &str) -> Self {
        Self {
            disk,
            path: path.to_owned(),
            name: None,
            extension: None,
        }
    }

    pub fn disk(&self) -> Option<&DiskName> {
        self.disk.as_ref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// The directory with no leading or trailing `/` and no empty segments; `""` is the root.
    pub fn directory(&self) -> String {
        normalize_directory(&self.path)
    }
}

/// Checks that `name` can be written back into a destination string.
///
/// Stored names must survive [`Destination::parse`], so a file's own fullname is always a
/// valid destination.
pub(crate) fn check_file_name(name: &FileName) -> FilesResult<()> {
    if PATH_CHARACTERS.is_match(name.as_str()) {
        return Ok(());
    }
    Err(FilesError::InvalidArgument(format!(
        "file name '{}' may only contain letters, digits, '_', '-', '.', '(' and ')'",
        name
    )))
}

/// Normalises a backend-relative directory: drops empty and `.` segments, so
/// `"/"` becomes `""` and `"a//b/"` becomes `"a/b"`.
pub fn normalize_directory(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
