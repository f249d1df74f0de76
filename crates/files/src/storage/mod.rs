//! Storage backends and the named-disk registry.
//!
//! A [`StorageBackend`] addresses bytes by *fullname*: a backend-relative path such as
//! `dir/file.png` with no leading `/`. [`Disks`] maps disk names to backends and records which
//! disk is the default; it is built once and then shared by the repository.

mod local;
mod memory;

pub use local::LocalDisk;
pub use memory::MemoryDisk;

use crate::{DiskName, FilesError, FilesResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Errors reported by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Nothing is stored at the given fullname
    #[error("nothing stored at '{0}'")]
    NotFound(String),

    /// The fullname would resolve outside the backend's root
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// I/O error while touching the backend
    #[error("I/O error at '{fullname}': {source}")]
    Io {
        fullname: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend does not offer this capability (e.g. no public URL prefix configured)
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The backend is temporarily unusable
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Capability set of one named disk.
///
/// Implementations are synchronous and may block on I/O. They must be safe to share across
/// threads; the repository calls them from whichever worker runs the operation.
pub trait StorageBackend: Send + Sync {
    /// Whether bytes are currently stored at `fullname`.
    fn exists(&self, fullname: &str) -> StorageResult<bool>;

    /// Reads every byte stored at `fullname`.
    fn read(&self, fullname: &str) -> StorageResult<Vec<u8>>;

    /// Stores `contents` at `fullname`, replacing anything already there.
    fn write(&self, fullname: &str, contents: &[u8]) -> StorageResult<()>;

    /// Removes the bytes stored at `fullname`.
    fn delete(&self, fullname: &str) -> StorageResult<()>;

    /// Moves bytes from `from` to `to` within this backend in a single call.
    fn move_object(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Public URL under which `fullname` can be fetched.
    fn public_url(&self, fullname: &str) -> StorageResult<String>;
}

/// Configured disks, keyed by name, with one default.
#[derive(Clone)]
pub struct Disks {
    default: DiskName,
    backends: BTreeMap<DiskName, Arc<dyn StorageBackend>>,
}

impl Disks {
    pub fn builder() -> DisksBuilder {
        DisksBuilder::default()
    }

    pub fn default_disk(&self) -> &DiskName {
        &self.default
    }

    /// Names of every configured disk, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &DiskName> {
        self.backends.keys()
    }

    /// Resolves a disk name supplied by a caller.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::UnknownDisk`] when no backend is configured under `name`.
    pub fn resolve(&self, name: &str) -> FilesResult<DiskName> {
        self.backends
            .keys()
            .find(|disk| disk.as_str() == name)
            .cloned()
            .ok_or_else(|| FilesError::UnknownDisk(name.to_owned()))
    }

    /// Returns the backend for `disk`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::UnknownDisk`] when no backend is configured under `disk`.
    pub fn backend(&self, disk: &DiskName) -> FilesResult<&dyn StorageBackend> {
        self.backends
            .get(disk)
            .map(|backend| backend.as_ref())
            .ok_or_else(|| FilesError::UnknownDisk(disk.to_string()))
    }
}

impl fmt::Debug for Disks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disks")
            .field("default", &self.default)
            .field("disks", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Disks`]; names are validated in [`DisksBuilder::build`].
#[derive(Default)]
pub struct DisksBuilder {
    default: Option<String>,
    backends: Vec<(String, Arc<dyn StorageBackend>)>,
}

impl DisksBuilder {
    pub fn disk(self, name: impl Into<String>, backend: impl StorageBackend + 'static) -> Self {
        self.shared_disk(name, Arc::new(backend))
    }

    pub fn shared_disk(mut self, name: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
        self.backends.push((name.into(), backend));
        self
    }

    pub fn default_disk(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    /// Validates names and the default disk.
    ///
    /// When no default is set and exactly one disk is configured, that disk becomes the
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Config`] if no disk is configured, a name is registered twice,
    /// a name is not a valid disk name, or the default cannot be determined.
    pub fn build(self) -> FilesResult<Disks> {
        if self.backends.is_empty() {
            return Err(FilesError::Config("at least one disk must be configured".into()));
        }

        let mut backends = BTreeMap::new();
        for (name, backend) in self.backends {
            let disk = DiskName::new(&name)
                .map_err(|e| FilesError::Config(format!("disk '{}': {}", name, e)))?;
            if backends.insert(disk, backend).is_some() {
                return Err(FilesError::Config(format!(
                    "disk '{}' is configured more than once",
                    name
                )));
            }
        }

        let default = match self.default {
            Some(name) => backends
                .keys()
                .find(|disk: &&DiskName| disk.as_str() == name)
                .cloned()
                .ok_or_else(|| {
                    FilesError::Config(format!("default disk '{}' is not configured", name))
                })?,
            None if backends.len() == 1 => backends
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| FilesError::Config("no default disk".into()))?,
            None => {
                return Err(FilesError::Config(
                    "a default disk must be named when several disks are configured".into(),
                ))
            }
        };

        Ok(Disks { default, backends })
    }
}
