//! Local directory backend.

use super::{StorageBackend, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Stores bytes as regular files under a root directory.
///
/// The root does not need to exist up front; writes and moves create missing parent
/// directories. Fullnames that would resolve outside the root are rejected.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
    url: Option<String>,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url: None,
        }
    }

    /// Sets the prefix public URLs are built from (e.g. `http://localhost:3000/storage`).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, fullname: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(fullname.trim_start_matches('/'));
        let mut has_segment = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_segment = true,
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(fullname.to_owned())),
            }
        }
        if !has_segment {
            return Err(StorageError::InvalidPath(fullname.to_owned()));
        }
        Ok(self.root.join(relative))
    }

    fn create_parent(&self, fullname: &str, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(fullname, e))?;
        }
        Ok(())
    }
}

impl StorageBackend for LocalDisk {
    fn exists(&self, fullname: &str) -> StorageResult<bool> {
        let path = self.resolve(fullname)?;
        match fs::metadata(&path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(fullname, e)),
        }
    }

    fn read(&self, fullname: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(fullname)?;
        fs::read(&path).map_err(|e| io_error(fullname, e))
    }

    fn write(&self, fullname: &str, contents: &[u8]) -> StorageResult<()> {
        let path = self.resolve(fullname)?;
        self.create_parent(fullname, &path)?;
        tracing::debug!(root = %self.root.display(), fullname, size = contents.len(), "local disk: write");
        fs::write(&path, contents).map_err(|e| io_error(fullname, e))
    }

    fn delete(&self, fullname: &str) -> StorageResult<()> {
        let path = self.resolve(fullname)?;
        fs::remove_file(&path).map_err(|e| io_error(fullname, e))
    }

    fn move_object(&self, from: &str, to: &str) -> StorageResult<()> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if source == target {
            return Ok(());
        }
        if !source.is_file() {
            return Err(StorageError::NotFound(from.to_owned()));
        }
        self.create_parent(to, &target)?;
        tracing::debug!(root = %self.root.display(), from, to, "local disk: move");
        fs::rename(&source, &target).map_err(|e| io_error(from, e))
    }

    fn public_url(&self, fullname: &str) -> StorageResult<String> {
        let prefix = self.url.as_deref().ok_or_else(|| {
            StorageError::Unsupported(format!(
                "no public url configured for local disk at {}",
                self.root.display()
            ))
        })?;
        Ok(format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            fullname.trim_start_matches('/')
        ))
    }
}

fn io_error(fullname: &str, source: std::io::Error) -> StorageError {
    if source.kind() == ErrorKind::NotFound {
        return StorageError::NotFound(fullname.to_owned());
    }
    StorageError::Io {
        fullname: fullname.to_owned(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path().join("storage"));

        disk.write("nested/dir/file.txt", b"Hello, World!").unwrap();

        let stored = temp.path().join("storage/nested/dir/file.txt");
        assert_eq!(fs::read(stored).unwrap(), b"Hello, World!");
        assert!(disk.exists("nested/dir/file.txt").unwrap());
    }

    #[test]
    fn test_exists_is_false_for_missing_and_directories() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path());
        fs::create_dir_all(temp.path().join("dir")).unwrap();

        assert!(!disk.exists("missing.txt").unwrap());
        assert!(!disk.exists("dir").unwrap());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path());

        assert!(matches!(
            disk.read("missing.txt"),
            Err(StorageError::NotFound(name)) if name == "missing.txt"
        ));
    }

    #[test]
    fn test_move_object_within_root() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path());
        disk.write("uploaded_image.png", &[1, 2, 3]).unwrap();

        disk.move_object("uploaded_image.png", "dir/uploaded_image.png")
            .unwrap();

        assert!(!disk.exists("uploaded_image.png").unwrap());
        assert_eq!(disk.read("dir/uploaded_image.png").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_move_object_missing_source() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path());

        assert!(matches!(
            disk.move_object("a.txt", "b.txt"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_removes_file() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path());
        disk.write("file.bin", &[0xFF]).unwrap();

        disk.delete("file.bin").unwrap();

        assert!(!disk.exists("file.bin").unwrap());
        assert!(matches!(disk.delete("file.bin"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_rejects_paths_escaping_root() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path().join("root"));

        for fullname in ["../outside.txt", "a/../../outside.txt", "", "/"] {
            assert!(
                matches!(disk.write(fullname, b"x"), Err(StorageError::InvalidPath(_))),
                "expected {fullname:?} to be rejected"
            );
        }
        assert!(!temp.path().join("outside.txt").exists());
    }

    #[test]
    fn test_public_url() {
        let temp = TempDir::new().unwrap();
        let with_url = LocalDisk::new(temp.path()).with_url("http://localhost:3000/storage/");
        let without_url = LocalDisk::new(temp.path());

        assert_eq!(
            with_url.public_url("dir/file.png").unwrap(),
            "http://localhost:3000/storage/dir/file.png"
        );
        assert!(matches!(
            without_url.public_url("dir/file.png"),
            Err(StorageError::Unsupported(_))
        ));
    }
}
