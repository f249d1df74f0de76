//! File repository: the orchestration layer over disks, records and notifiers.
//!
//! # Consistency model
//!
//! Bytes and records are not transactionally linked. The repository orders its calls so
//! that a record never describes a location that was not written:
//!
//! - create writes the bytes first and persists the record second; if persisting fails
//!   the bytes are removed again
//! - move performs the byte-level operation first and updates the record only once every
//!   backend call has succeeded
//!
//! A cross-disk move is three backend calls (read, write, delete). If the final delete
//! fails the bytes exist on both disks; this is reported as
//! [`FilesError::PartialMoveFailure`] and the record keeps pointing at the source.
//!
//! Nothing is retried, and concurrent operations on the same destination are not
//! coordinated: the last backend write wins.

use crate::destination::{check_file_name, Destination};
use crate::events::{EventNotifier, FileEvent};
use crate::file::join_fullname;
use crate::records::RecordStore;
use crate::size::{self, SizeBase, SizeUnit};
use crate::storage::{Disks, StorageBackend, StorageError};
use crate::upload::UploadSource;
use crate::{
    BackendOperation, DiskName, File, FileId, FileName, FilesError, FilesResult, NewFile,
    NonEmptyText,
};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

/// Creates, locates, moves and reads tracked files.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct FileRepository {
    disks: Disks,
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn EventNotifier>,
}

impl fmt::Debug for FileRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRepository")
            .field("disks", &self.disks)
            .finish_non_exhaustive()
    }
}

impl FileRepository {
    pub fn new(
        disks: Disks,
        records: Arc<dyn RecordStore>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            disks,
            records,
            notifier,
        }
    }

    pub fn disks(&self) -> &Disks {
        &self.disks
    }

    pub fn default_disk(&self) -> &DiskName {
        self.disks.default_disk()
    }

    /// Stores an upload and persists a record for it.
    ///
    /// The target disk is `disk` when given, else the disk named in a qualified
    /// `destination`, else the default disk. When `destination` names no file (`""`, `"/"`,
    /// `"dir/"`) the upload's original name is used; when the name carries no extension the
    /// upload's original extension is recorded.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidArgument`] for a malformed destination, a file name that could
    ///   not be used as a destination later (e.g. containing spaces), or when `disk` and a
    ///   disk-qualified destination disagree
    /// - [`FilesError::UnknownDisk`] when the disk is not configured
    /// - [`FilesError::Backend`] when the bytes cannot be written
    /// - [`FilesError::Record`] when the record cannot be persisted (the bytes are removed)
    /// - [`FilesError::CleanupAfterCreateFailed`] when removing those bytes fails as well
    pub fn create_from_upload(
        &self,
        source: &dyn UploadSource,
        destination: &str,
        disk: Option<&str>,
    ) -> FilesResult<File> {
        let target = Destination::parse(destination)?;

        let disk = match (disk.filter(|d| !d.is_empty()), target.disk()) {
            (Some(requested), Some(qualified)) if requested != qualified.as_str() => {
                return Err(FilesError::InvalidArgument(format!(
                    "disk '{}' conflicts with destination '{}'",
                    requested, destination
                )));
            }
            (Some(requested), _) => self.disks.resolve(requested)?,
            (None, Some(qualified)) => self.disks.resolve(qualified.as_str())?,
            (None, None) => self.disks.default_disk().clone(),
        };

        let name = match target.name() {
            Some(name) => FileName::new(name)?,
            None => FileName::new(source.original_name())?,
        };
        check_file_name(&name)?;
        let extension = target
            .extension()
            .or(source.original_extension())
            .map(str::to_owned);
        let path = target.directory();
        let fullname = join_fullname(&path, name.as_str());

        let backend = self.disks.backend(&disk)?;
        backend
            .write(&fullname, source.bytes())
            .map_err(backend_failure(BackendOperation::Write, &disk, &fullname, None))?;

        let new_file = NewFile {
            name,
            extension,
            mime: source.mime().and_then(|m| NonEmptyText::new(m).ok()),
            disk: disk.clone(),
            path,
            size: source.size(),
        };

        let file = match self.records.create(new_file) {
            Ok(file) => file,
            Err(e) => {
                let create_error = FilesError::Record(e);
                tracing::warn!(%disk, %fullname, error = %create_error, "record not persisted; removing written bytes");
                if let Err(cleanup_error) = backend.delete(&fullname) {
                    return Err(FilesError::CleanupAfterCreateFailed {
                        disk,
                        fullname,
                        create_error: Box::new(create_error),
                        cleanup_error,
                    });
                }
                return Err(create_error);
            }
        };

        tracing::info!(
            file_id = %file.id(),
            disk = %file.disk(),
            fullname = %file.fullname(),
            size = file.size(),
            "file created"
        );
        self.publish(&[FileEvent::Created(file.clone())]);

        Ok(file)
    }

    /// Public URL of the file's current location.
    ///
    /// # Errors
    ///
    /// [`FilesError::NotFound`] when the bytes are absent; [`FilesError::Backend`] when the
    /// backend cannot produce a URL.
    pub fn url(&self, file: &File) -> FilesResult<String> {
        let backend = self.existing_backend(file)?;
        let fullname = file.fullname();
        backend.public_url(&fullname).map_err(backend_failure(
            BackendOperation::Url,
            file.disk(),
            &fullname,
            Some(file.id()),
        ))
    }

    /// Whether the bytes are present at the file's location. Always asks the backend.
    pub fn exists(&self, file: &File) -> FilesResult<bool> {
        let backend = self.disks.backend(file.disk())?;
        self.exists_on(backend, file)
    }

    /// Full byte content of the file.
    ///
    /// # Errors
    ///
    /// [`FilesError::NotFound`] when the bytes are absent.
    pub fn content(&self, file: &File) -> FilesResult<Vec<u8>> {
        let backend = self.existing_backend(file)?;
        let fullname = file.fullname();
        backend.read(&fullname).map_err(backend_failure(
            BackendOperation::Read,
            file.disk(),
            &fullname,
            Some(file.id()),
        ))
    }

    /// Stored size converted into `unit`.
    pub fn size(&self, file: &File, unit: SizeUnit, base: SizeBase) -> f64 {
        size::convert(file.size(), unit, base)
    }

    /// Moves the file to `destination` (`["<disk>::"]path-and-or-name`).
    ///
    /// A destination ending in a name renames the file; one ending in `/` keeps the current
    /// name. On success `file` reflects the new location, the record is updated, and the
    /// emitted events are returned: `Moved`, followed by `Renamed` when the name changed.
    /// Moving a file onto its own location does nothing and returns no events.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] when the bytes are absent
    /// - [`FilesError::InvalidArgument`] / [`FilesError::UnknownDisk`] for bad destinations
    /// - [`FilesError::Backend`] when a backend call fails (nothing is updated)
    /// - [`FilesError::PartialMoveFailure`] when a cross-disk copy succeeded but the source
    ///   could not be deleted (the record still points at the source)
    /// - [`FilesError::Record`] when the record update fails after the bytes moved
    pub fn move_file(&self, file: &mut File, destination: &str) -> FilesResult<Vec<FileEvent>> {
        let target = Destination::parse(destination)?;
        self.relocate(file, &target)
    }

    /// Renames the file in place: same disk, same directory.
    pub fn rename(&self, file: &mut File, new_name: &str) -> FilesResult<Vec<FileEvent>> {
        let name = FileName::new(new_name)?;
        let target = Destination::in_directory(file.path(), &name);
        self.relocate(file, &target)
    }

    /// Loads a record by identifier.
    ///
    /// # Errors
    ///
    /// [`FilesError::RecordNotFound`] when no record has this identifier.
    pub fn find(&self, id: FileId) -> FilesResult<File> {
        self.records
            .fetch(&id)?
            .ok_or(FilesError::RecordNotFound(id))
    }

    /// Every stored record, oldest first.
    pub fn list(&self) -> FilesResult<Vec<File>> {
        Ok(self.records.list()?)
    }

    fn relocate(&self, file: &mut File, target: &Destination) -> FilesResult<Vec<FileEvent>> {
        let source_backend = self.existing_backend(file)?;

        let source_disk = file.disk().clone();
        let target_disk = match target.disk() {
            Some(disk) => self.disks.resolve(disk.as_str())?,
            None => source_disk.clone(),
        };
        let new_name = match target.name() {
            Some(name) => FileName::new(name)?,
            None => file.name().clone(),
        };
        check_file_name(&new_name)?;
        let new_path = target.directory();

        let source_fullname = file.fullname();
        let target_fullname = join_fullname(&new_path, new_name.as_str());

        if target_disk == source_disk && target_fullname == source_fullname {
            tracing::debug!(file_id = %file.id(), fullname = %source_fullname, "move onto current location skipped");
            return Ok(Vec::new());
        }

        if target_disk == source_disk {
            source_backend
                .move_object(&source_fullname, &target_fullname)
                .map_err(backend_failure(
                    BackendOperation::Move,
                    &source_disk,
                    &source_fullname,
                    Some(file.id()),
                ))?;
        } else {
            let target_backend = self.disks.backend(&target_disk)?;
            self.copy_across(
                file.id(),
                (source_backend, &source_disk, &source_fullname),
                (target_backend, &target_disk, &target_fullname),
            )?;
        }

        let renamed = new_name != *file.name();
        let mut moved = file.clone();
        moved.relocate(target_disk, &new_path, new_name, Utc::now());
        self.records.update(&moved)?;
        *file = moved;

        tracing::info!(
            file_id = %file.id(),
            from = %format!("{}::{}", source_disk, source_fullname),
            to = %format!("{}::{}", file.disk(), file.fullname()),
            renamed,
            "file moved"
        );

        let mut events = vec![FileEvent::Moved(file.clone())];
        if renamed {
            events.push(FileEvent::Renamed(file.clone()));
        }
        self.publish(&events);

        Ok(events)
    }

    /// Read from the source, write to the target, delete the source.
    fn copy_across(
        &self,
        id: FileId,
        (source, source_disk, source_fullname): (&dyn StorageBackend, &DiskName, &str),
        (target, target_disk, target_fullname): (&dyn StorageBackend, &DiskName, &str),
    ) -> FilesResult<()> {
        let contents = source.read(source_fullname).map_err(backend_failure(
            BackendOperation::Read,
            source_disk,
            source_fullname,
            Some(id),
        ))?;

        target
            .write(target_fullname, &contents)
            .map_err(backend_failure(
                BackendOperation::Write,
                target_disk,
                target_fullname,
                Some(id),
            ))?;

        if let Err(cause) = source.delete(source_fullname) {
            tracing::warn!(
                file_id = %id,
                source = %format!("{}::{}", source_disk, source_fullname),
                target = %format!("{}::{}", target_disk, target_fullname),
                error = %cause,
                "cross-disk move left the source copy behind"
            );
            return Err(FilesError::PartialMoveFailure {
                file: id,
                source_disk: source_disk.clone(),
                source_fullname: source_fullname.to_owned(),
                target_disk: target_disk.clone(),
                target_fullname: target_fullname.to_owned(),
                cause,
            });
        }

        Ok(())
    }

    fn existing_backend(&self, file: &File) -> FilesResult<&dyn StorageBackend> {
        let backend = self.disks.backend(file.disk())?;
        if !self.exists_on(backend, file)? {
            return Err(FilesError::NotFound {
                file: file.id(),
                disk: file.disk().clone(),
                fullname: file.fullname(),
            });
        }
        Ok(backend)
    }

    fn exists_on(&self, backend: &dyn StorageBackend, file: &File) -> FilesResult<bool> {
        let fullname = file.fullname();
        backend.exists(&fullname).map_err(backend_failure(
            BackendOperation::Exists,
            file.disk(),
            &fullname,
            Some(file.id()),
        ))
    }

    fn publish(&self, events: &[FileEvent]) {
        for event in events {
            self.notifier.notify(event);
        }
    }
}

fn backend_failure(
    operation: BackendOperation,
    disk: &DiskName,
    fullname: &str,
    file: Option<FileId>,
) -> impl FnOnce(StorageError) -> FilesError {
    let disk = disk.clone();
    let fullname = fullname.to_owned();
    move |source| FilesError::Backend {
        operation,
        disk,
        fullname,
        file,
        source,
    }
}
