//! Record stores: durable storage for [`File`] records, keyed by [`FileId`].
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryRecordStore`] keeps records in a map (tests, throwaway setups)
//! - [`JsonRecordStore`] writes one pretty-printed JSON document per record:
//!
//! ```text
//! <root>/
//! └── 55/
//!     └── 0e/
//!         └── 550e8400e29b41d4a716446655440000/
//!             └── file.json
//! ```

use crate::constants::RECORD_FILENAME;
use crate::{File, FileId, NewFile};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Errors reported by record stores.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("no record stored for file {0}")]
    NotFound(FileId),
    #[error("failed to access record storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;

/// Persistence seam for file records.
///
/// Updates are synchronous: once `update` returns, `fetch` observes the new values.
pub trait RecordStore: Send + Sync {
    /// Persists a new record, assigning its identifier.
    fn create(&self, new_file: NewFile) -> RecordResult<File>;

    /// Overwrites the stored record with the same identifier.
    fn update(&self, file: &File) -> RecordResult<()>;

    fn fetch(&self, id: &FileId) -> RecordResult<Option<File>>;

    /// Every stored record, oldest first.
    fn list(&self) -> RecordResult<Vec<File>>;
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<FileId, File>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> RecordResult<MutexGuard<'_, BTreeMap<FileId, File>>> {
        self.records
            .lock()
            .map_err(|_| RecordError::Unavailable("memory record store lock poisoned".into()))
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, new_file: NewFile) -> RecordResult<File> {
        let mut records = self.records()?;
        let mut id = FileId::new();
        while records.contains_key(&id) {
            id = FileId::new();
        }
        let file = new_file.into_file(id, Utc::now());
        records.insert(id, file.clone());
        Ok(file)
    }

    fn update(&self, file: &File) -> RecordResult<()> {
        let mut records = self.records()?;
        match records.get_mut(&file.id()) {
            Some(stored) => {
                *stored = file.clone();
                Ok(())
            }
            None => Err(RecordError::NotFound(file.id())),
        }
    }

    fn fetch(&self, id: &FileId) -> RecordResult<Option<File>> {
        Ok(self.records()?.get(id).cloned())
    }

    fn list(&self) -> RecordResult<Vec<File>> {
        let mut files: Vec<File> = self.records()?.values().cloned().collect();
        sort_oldest_first(&mut files);
        Ok(files)
    }
}

/// One JSON document per record under sharded directories.
///
/// The root directory is created on first write.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    root: PathBuf,
}

impl JsonRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &FileId) -> PathBuf {
        id.sharded_dir(&self.root).join(RECORD_FILENAME)
    }

    fn write_record(&self, path: &Path, file: &File) -> RecordResult<()> {
        let json = serde_json::to_string_pretty(file).map_err(RecordError::Serialization)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn read_record(path: &Path) -> RecordResult<File> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(RecordError::Deserialization)
    }

    /// Allocates a fresh record directory, retrying on identifier collisions or directories
    /// left behind by external interference.
    fn allocate_dir(&self) -> RecordResult<(FileId, PathBuf)> {
        for _attempt in 0..5 {
            let id = FileId::new();
            let candidate = id.sharded_dir(&self.root);

            if candidate.exists() {
                continue;
            }

            if let Some(parent) = candidate.parent() {
                fs::create_dir_all(parent)?;
            }

            match fs::create_dir(&candidate) {
                Ok(()) => return Ok((id, candidate)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(RecordError::Io(e)),
            }
        }

        Err(RecordError::Io(io::Error::new(
            ErrorKind::AlreadyExists,
            "failed to allocate a unique record directory after 5 attempts",
        )))
    }
}

impl RecordStore for JsonRecordStore {
    fn create(&self, new_file: NewFile) -> RecordResult<File> {
        let (id, dir) = self.allocate_dir()?;
        let file = new_file.into_file(id, Utc::now());

        if let Err(e) = self.write_record(&dir.join(RECORD_FILENAME), &file) {
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                tracing::warn!(dir = %dir.display(), error = %cleanup, "failed to remove record directory after write error");
            }
            return Err(e);
        }

        Ok(file)
    }

    fn update(&self, file: &File) -> RecordResult<()> {
        let path = self.record_path(&file.id());
        if !path.is_file() {
            return Err(RecordError::NotFound(file.id()));
        }
        self.write_record(&path, file)
    }

    fn fetch(&self, id: &FileId) -> RecordResult<Option<File>> {
        let path = self.record_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    /// Walks `<root>/<s1>/<s2>/<id>/file.json`. Unreadable records are logged and skipped so
    /// one damaged document does not hide the rest.
    fn list(&self) -> RecordResult<Vec<File>> {
        let mut files = Vec::new();

        let s1_iter = match fs::read_dir(&self.root) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(RecordError::Io(e)),
        };

        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }

            let Ok(s2_iter) = fs::read_dir(&s1_path) else {
                continue;
            };

            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }

                let Ok(id_iter) = fs::read_dir(&s2_path) else {
                    continue;
                };

                for id_entry in id_iter.flatten() {
                    let record_path = id_entry.path().join(RECORD_FILENAME);
                    if !record_path.is_file() {
                        continue;
                    }

                    match Self::read_record(&record_path) {
                        Ok(file) => files.push(file),
                        Err(e) => {
                            tracing::warn!(path = %record_path.display(), error = %e, "skipping unreadable file record");
                        }
                    }
                }
            }
        }

        sort_oldest_first(&mut files);
        Ok(files)
    }
}

fn sort_oldest_first(files: &mut [File]) {
    files.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiskName, FileName};
    use tempfile::TempDir;

    fn new_file(name: &str) -> NewFile {
        NewFile {
            name: FileName::new(name).unwrap(),
            extension: FileName::new(name).unwrap().extension().map(str::to_owned),
            mime: None,
            disk: DiskName::new("default_disk").unwrap(),
            path: "/".into(),
            size: 512,
        }
    }

    fn exercise_store(store: &dyn RecordStore) {
        let created = store.create(new_file("a.png")).unwrap();
        let second = store.create(new_file("b.png")).unwrap();
        assert_ne!(created.id(), second.id());
        assert_eq!(created.path(), "");

        let fetched = store.fetch(&created.id()).unwrap().unwrap();
        assert_eq!(fetched, created);

        let mut moved = fetched.clone();
        moved.relocate(
            DiskName::new("second_disk").unwrap(),
            "directory",
            FileName::new("c.png").unwrap(),
            Utc::now(),
        );
        store.update(&moved).unwrap();
        assert_eq!(store.fetch(&created.id()).unwrap().unwrap(), moved);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|f| f.id() == second.id()));

        assert!(store.fetch(&FileId::new()).unwrap().is_none());
    }

    #[test]
    fn memory_store_round_trip() {
        exercise_store(&MemoryRecordStore::new());
    }

    #[test]
    fn json_store_round_trip() {
        let temp = TempDir::new().unwrap();
        exercise_store(&JsonRecordStore::new(temp.path().join("records")));
    }

    #[test]
    fn update_of_unknown_record_is_not_found() {
        let temp = TempDir::new().unwrap();
        let orphan = new_file("x.txt").into_file(FileId::new(), Utc::now());

        assert!(matches!(
            MemoryRecordStore::new().update(&orphan),
            Err(RecordError::NotFound(id)) if id == orphan.id()
        ));
        assert!(matches!(
            JsonRecordStore::new(temp.path()).update(&orphan),
            Err(RecordError::NotFound(_))
        ));
    }

    #[test]
    fn json_store_uses_sharded_layout() {
        let temp = TempDir::new().unwrap();
        let store = JsonRecordStore::new(temp.path());

        let file = store.create(new_file("a.png")).unwrap();

        let expected = file.id().sharded_dir(temp.path()).join(RECORD_FILENAME);
        assert!(expected.is_file());
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(expected).unwrap()).unwrap();
        assert_eq!(json["name"], "a.png");
        assert_eq!(json["disk"], "default_disk");
    }

    #[test]
    fn json_store_list_skips_damaged_records() {
        let temp = TempDir::new().unwrap();
        let store = JsonRecordStore::new(temp.path());
        let good = store.create(new_file("good.png")).unwrap();

        let damaged = FileId::new().sharded_dir(temp.path());
        fs::create_dir_all(&damaged).unwrap();
        fs::write(damaged.join(RECORD_FILENAME), "{ not json").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed, vec![good]);
    }

    #[test]
    fn json_store_list_on_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonRecordStore::new(temp.path().join("never-created"));

        assert!(store.list().unwrap().is_empty());
    }
}
