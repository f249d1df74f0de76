//! Depot file repository
//!
//! This crate tracks metadata for files whose bytes live on one of several named storage
//! backends ("disks") and lets callers create, locate, move, rename and read those files
//! without knowing backend-specific paths.
//!
//! ## Moving parts
//!
//! - [`Destination`] parses `["<disk>::"]path/and/or/name` strings
//! - [`size::convert`] turns stored byte counts into human units
//! - [`StorageBackend`] is the per-disk capability set; [`Disks`] maps names to backends
//! - [`RecordStore`] persists [`File`] records
//! - [`EventNotifier`] receives [`FileEvent`]s
//! - [`FileRepository`] orchestrates all of the above
//!
//! Records and bytes are not transactionally linked. A record can outlive its bytes (an
//! *orphaned* file); [`FileRepository::exists`] always asks the backend.
//!
//! ## Example Usage
//!
//! ```no_run
//! use depot_files::{
//!     Disks, FileRepository, MemoryDisk, MemoryRecordStore, TracingNotifier, UploadedFile,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let disks = Disks::builder()
//!     .disk("local", MemoryDisk::new())
//!     .disk("archive", MemoryDisk::new())
//!     .default_disk("local")
//!     .build()?;
//! let repository = FileRepository::new(
//!     disks,
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(TracingNotifier),
//! );
//!
//! let upload = UploadedFile::new("scan.png", vec![0x89, 0x50, 0x4E, 0x47]);
//! let mut file = repository.create_from_upload(&upload, "scans/", None)?;
//! repository.move_file(&mut file, "archive::2024/scan-001.png")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod constants;
pub mod destination;
pub mod events;
mod file;
pub mod records;
mod repository;
pub mod size;
pub mod storage;
mod upload;

pub use config::{resolve_config_path, DepotConfig, DiskConfig};
pub use constants::{DEFAULT_CONFIG_FILENAME, RECORD_FILENAME};
pub use depot_types::{DiskName, FileName, NonEmptyText, TextError};
pub use depot_uuid::FileId;
pub use destination::Destination;
pub use events::{EventNotifier, FileEvent, NullNotifier, RecordingNotifier, TracingNotifier};
pub use file::{File, NewFile};
pub use records::{JsonRecordStore, MemoryRecordStore, RecordError, RecordStore};
pub use repository::FileRepository;
pub use size::{SizeBase, SizeUnit};
pub use storage::{Disks, LocalDisk, MemoryDisk, StorageBackend, StorageError};
pub use upload::{UploadSource, UploadedFile};

/// Backend call that failed, carried by [`FilesError::Backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOperation {
    Exists,
    Read,
    Write,
    Delete,
    Move,
    Url,
}

impl std::fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendOperation::Exists => "exists",
            BackendOperation::Read => "read",
            BackendOperation::Write => "write",
            BackendOperation::Delete => "delete",
            BackendOperation::Move => "move",
            BackendOperation::Url => "url",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during file repository operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// The file's current backend location holds no bytes
    #[error("File {fullname} (id: {file}) does not exist on disk '{disk}'")]
    NotFound {
        file: FileId,
        disk: DiskName,
        fullname: String,
    },

    /// No record is stored under the requested identifier
    #[error("No file record with id {0}")]
    RecordNotFound(FileId),

    /// Malformed unit/base, destination string or file name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A disk name that no configured backend answers to
    #[error("Unknown disk '{0}': no storage backend is configured under that name")]
    UnknownDisk(String),

    /// An underlying backend call failed
    #[error("Backend {operation} failed on disk '{disk}' at '{fullname}'{}", describe_file(.file))]
    Backend {
        operation: BackendOperation,
        disk: DiskName,
        fullname: String,
        file: Option<FileId>,
        #[source]
        source: StorageError,
    },

    /// A cross-disk move wrote the target copy but could not delete the source copy
    #[error(
        "File {file} was copied to {target_disk}::{target_fullname} but {source_disk}::{source_fullname} could not be deleted; bytes now exist on both disks"
    )]
    PartialMoveFailure {
        file: FileId,
        source_disk: DiskName,
        source_fullname: String,
        target_disk: DiskName,
        target_fullname: String,
        #[source]
        cause: StorageError,
    },

    /// Record store error
    #[error("Record store error: {0}")]
    Record(#[from] RecordError),

    /// Persisting a new record failed and the bytes written for it could not be removed
    #[error(
        "create failed and cleanup also failed (disk: {disk}, fullname: {fullname}): create={create_error}; cleanup={cleanup_error}"
    )]
    CleanupAfterCreateFailed {
        disk: DiskName,
        fullname: String,
        #[source]
        create_error: Box<FilesError>,
        cleanup_error: StorageError,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error occurred outside a storage backend (e.g. reading an upload source)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TextError> for FilesError {
    fn from(err: TextError) -> Self {
        FilesError::InvalidArgument(err.to_string())
    }
}

fn describe_file(file: &Option<FileId>) -> String {
    match file {
        Some(id) => format!(" (id: {})", id),
        None => String::new(),
    }
}

pub type FilesResult<T> = std::result::Result<T, FilesError>;
