//! In-memory backend, the stand-in for a real disk in tests and throwaway setups.

use super::{StorageBackend, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryDisk {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    url: Option<String>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Fullnames currently stored, in sorted order.
    pub fn fullnames(&self) -> StorageResult<Vec<String>> {
        Ok(self.objects()?.keys().cloned().collect())
    }

    fn objects(&self) -> StorageResult<MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Unavailable("memory disk lock poisoned".into()))
    }
}

fn key(fullname: &str) -> StorageResult<String> {
    let key = fullname.trim_start_matches('/');
    if key.is_empty() || key.ends_with('/') {
        return Err(StorageError::InvalidPath(fullname.to_owned()));
    }
    Ok(key.to_owned())
}

impl StorageBackend for MemoryDisk {
    fn exists(&self, fullname: &str) -> StorageResult<bool> {
        let key = key(fullname)?;
        Ok(self.objects()?.contains_key(&key))
    }

    fn read(&self, fullname: &str) -> StorageResult<Vec<u8>> {
        let key = key(fullname)?;
        self.objects()?
            .get(&key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(fullname.to_owned()))
    }

    fn write(&self, fullname: &str, contents: &[u8]) -> StorageResult<()> {
        let key = key(fullname)?;
        self.objects()?.insert(key, contents.to_vec());
        Ok(())
    }

    fn delete(&self, fullname: &str) -> StorageResult<()> {
        let key = key(fullname)?;
        self.objects()?
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(fullname.to_owned()))
    }

    fn move_object(&self, from: &str, to: &str) -> StorageResult<()> {
        let (from_key, to_key) = (key(from)?, key(to)?);
        let mut objects = self.objects()?;
        let contents = objects
            .remove(&from_key)
            .ok_or_else(|| StorageError::NotFound(from.to_owned()))?;
        objects.insert(to_key, contents);
        Ok(())
    }

    fn public_url(&self, fullname: &str) -> StorageResult<String> {
        let prefix = self
            .url
            .as_deref()
            .ok_or_else(|| StorageError::Unsupported("no public url configured".into()))?;
        Ok(format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            fullname.trim_start_matches('/')
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_and_delete() {
        let disk = MemoryDisk::new();
        disk.write("a/b.txt", b"bytes").unwrap();

        assert!(disk.exists("a/b.txt").unwrap());
        assert!(disk.exists("/a/b.txt").unwrap());
        assert_eq!(disk.read("a/b.txt").unwrap(), b"bytes");

        disk.delete("a/b.txt").unwrap();
        assert!(!disk.exists("a/b.txt").unwrap());
        assert!(matches!(disk.read("a/b.txt"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn move_object_renames_key() {
        let disk = MemoryDisk::new();
        disk.write("old.png", &[7]).unwrap();

        disk.move_object("old.png", "dir/new.png").unwrap();

        assert_eq!(disk.fullnames().unwrap(), vec!["dir/new.png".to_owned()]);
    }

    #[test]
    fn move_object_onto_itself_keeps_bytes() {
        let disk = MemoryDisk::new();
        disk.write("same.png", &[1]).unwrap();

        disk.move_object("same.png", "same.png").unwrap();

        assert_eq!(disk.read("same.png").unwrap(), vec![1]);
    }

    #[test]
    fn public_url_requires_prefix() {
        assert!(matches!(
            MemoryDisk::new().public_url("x.png"),
            Err(StorageError::Unsupported(_))
        ));
        assert_eq!(
            MemoryDisk::new()
                .with_url("memory://scratch")
                .public_url("dir/x.png")
                .unwrap(),
            "memory://scratch/dir/x.png"
        );
    }

    #[test]
    fn rejects_directory_keys() {
        let disk = MemoryDisk::new();

        assert!(matches!(disk.write("", b"x"), Err(StorageError::InvalidPath(_))));
        assert!(matches!(disk.write("dir/", b"x"), Err(StorageError::InvalidPath(_))));
    }
}
