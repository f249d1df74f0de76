//! The tracked file entity.
//!
//! A [`File`] is metadata only: where the bytes live (`disk`, `path`, `name`) and what was
//! known about them at creation (`size`, `mime`). Derived attributes that need a backend
//! (`url`, `exists`) take the repository explicitly instead of reaching for a global.

use crate::destination::normalize_directory;
use crate::events::FileEvent;
use crate::size::{self, SizeBase, SizeUnit};
use crate::{DiskName, FileId, FileName, FileRepository, FilesResult, NonEmptyText};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Metadata for one tracked file.
///
/// Fields are read-only outside the crate; records change only through
/// [`FileRepository`] operations, which keep them consistent with the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    id: FileId,
    name: FileName,
    extension: Option<String>,
    mime: Option<NonEmptyText>,
    disk: DiskName,
    #[serde(deserialize_with = "deserialize_directory")]
    path: String,
    size: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Attributes of a file whose record has not been persisted yet.
///
/// Record stores turn this into a [`File`] with [`NewFile::into_file`], assigning the
/// identifier themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: FileName,
    pub extension: Option<String>,
    pub mime: Option<NonEmptyText>,
    pub disk: DiskName,
    pub path: String,
    pub size: u64,
}

impl NewFile {
    pub fn into_file(self, id: FileId, now: DateTime<Utc>) -> File {
        File {
            id,
            name: self.name,
            extension: self.extension,
            mime: self.mime,
            disk: self.disk,
            path: normalize_directory(&self.path),
            size: self.size,
            created_at: now,
            updated_at: now,
        }
    }
}

impl File {
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &FileName {
        &self.name
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn mime(&self) -> Option<&NonEmptyText> {
        self.mime.as_ref()
    }

    pub fn disk(&self) -> &DiskName {
        &self.disk
    }

    /// Directory portion of the location; `""` is the disk root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Byte count recorded at creation time.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Backend-relative location: `path/name`, or just `name` at the root.
    pub fn fullname(&self) -> String {
        join_fullname(&self.path, self.name.as_str())
    }

    /// Public URL of the file; fails with `NotFound` when the bytes are absent.
    pub fn url(&self, repository: &FileRepository) -> FilesResult<String> {
        repository.url(self)
    }

    /// Whether the bytes are present on the disk right now.
    pub fn exists(&self, repository: &FileRepository) -> FilesResult<bool> {
        repository.exists(self)
    }

    pub fn move_to(
        &mut self,
        repository: &FileRepository,
        destination: &str,
    ) -> FilesResult<Vec<FileEvent>> {
        repository.move_file(self, destination)
    }

    pub fn rename(
        &mut self,
        repository: &FileRepository,
        new_name: &str,
    ) -> FilesResult<Vec<FileEvent>> {
        repository.rename(self, new_name)
    }

    pub fn content(&self, repository: &FileRepository) -> FilesResult<Vec<u8>> {
        repository.content(self)
    }

    /// Stored size converted into `unit`.
    pub fn size_in(&self, unit: SizeUnit, base: SizeBase) -> f64 {
        size::convert(self.size, unit, base)
    }

    /// Points the record at a new location after the bytes have been moved there.
    ///
    /// The extension is recomputed only when the name changes.
    pub(crate) fn relocate(
        &mut self,
        disk: DiskName,
        path: &str,
        name: FileName,
        now: DateTime<Utc>,
    ) {
        if name != self.name {
            self.extension = name.extension().map(str::to_owned);
        }
        self.disk = disk;
        self.path = normalize_directory(path);
        self.name = name;
        self.updated_at = now;
    }
}

pub(crate) fn join_fullname(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{}", path, name)
    }
}

fn deserialize_directory<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_directory(&raw))
}
