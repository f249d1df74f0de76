//! Depot runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the repository.
//! Library code never reads environment variables; binaries look up `DEPOT_CONFIG` and hand
//! the result to [`resolve_config_path`].

use crate::constants::DEFAULT_CONFIG_FILENAME;
use crate::events::EventNotifier;
use crate::records::{JsonRecordStore, MemoryRecordStore, RecordStore};
use crate::storage::{Disks, LocalDisk, MemoryDisk};
use crate::{DiskName, FileRepository, FilesError, FilesResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How one named disk is backed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum DiskConfig {
    /// Files under a directory on the local filesystem
    Local {
        root: PathBuf,
        #[serde(default)]
        url: Option<String>,
    },
    /// Process-local map; contents are lost on exit
    Memory {
        #[serde(default)]
        url: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    default_disk: Option<String>,
    #[serde(default)]
    records_dir: Option<PathBuf>,
    #[serde(default)]
    disks: BTreeMap<String, DiskConfig>,
}

/// Validated depot configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepotConfig {
    default_disk: DiskName,
    records_dir: Option<PathBuf>,
    disks: BTreeMap<DiskName, DiskConfig>,
}

impl DepotConfig {
    /// Parses and validates a YAML document.
    ///
    /// `default_disk` may be omitted only when exactly one disk is configured.
    pub fn from_yaml_str(yaml: &str) -> FilesResult<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FilesError::Config(format!("invalid depot configuration: {}", e)))?;

        if raw.disks.is_empty() {
            return Err(FilesError::Config(
                "at least one disk must be configured".into(),
            ));
        }

        let mut disks = BTreeMap::new();
        for (name, disk) in raw.disks {
            let name = DiskName::new(&name)
                .map_err(|e| FilesError::Config(format!("disk '{}': {}", name, e)))?;
            disks.insert(name, disk);
        }

        let default_disk = match raw.default_disk {
            Some(name) => disks
                .keys()
                .find(|d| d.as_str() == name)
                .cloned()
                .ok_or_else(|| {
                    FilesError::Config(format!("default disk '{}' is not configured", name))
                })?,
            None if disks.len() == 1 => disks.keys().next().cloned().ok_or_else(|| {
                FilesError::Config("at least one disk must be configured".into())
            })?,
            None => {
                return Err(FilesError::Config(
                    "default_disk is required when more than one disk is configured".into(),
                ));
            }
        };

        Ok(Self {
            default_disk,
            records_dir: raw.records_dir,
            disks,
        })
    }

    /// Reads `path` and resolves relative directories against the file's own directory.
    pub fn load(path: &Path) -> FilesResult<Self> {
        let yaml = fs::read_to_string(path).map_err(|e| {
            FilesError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml_str(&yaml)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.rebase(base);

        tracing::debug!(path = %path.display(), disks = config.disks.len(), "loaded depot configuration");
        Ok(config)
    }

    pub fn default_disk(&self) -> &DiskName {
        &self.default_disk
    }

    /// Directory of the JSON record store; `None` keeps records in memory.
    pub fn records_dir(&self) -> Option<&Path> {
        self.records_dir.as_deref()
    }

    pub fn disks(&self) -> &BTreeMap<DiskName, DiskConfig> {
        &self.disks
    }

    /// Instantiates one backend per configured disk.
    ///
    /// Memory disks without a URL prefix get `memory://<name>`.
    pub fn build_disks(&self) -> FilesResult<Disks> {
        let mut builder = Disks::builder().default_disk(self.default_disk.as_str());

        for (name, disk) in &self.disks {
            builder = match disk {
                DiskConfig::Local { root, url } => {
                    let mut backend = LocalDisk::new(root.clone());
                    if let Some(url) = url {
                        backend = backend.with_url(url.clone());
                    }
                    builder.disk(name.as_str(), backend)
                }
                DiskConfig::Memory { url } => {
                    let url = url
                        .clone()
                        .unwrap_or_else(|| format!("memory://{}", name));
                    builder.disk(name.as_str(), MemoryDisk::new().with_url(url))
                }
            };
        }

        builder.build()
    }

    pub fn record_store(&self) -> Arc<dyn RecordStore> {
        match &self.records_dir {
            Some(dir) => Arc::new(JsonRecordStore::new(dir.clone())),
            None => Arc::new(MemoryRecordStore::new()),
        }
    }

    /// Builds a repository over the configured disks and record store.
    pub fn repository(&self, notifier: Arc<dyn EventNotifier>) -> FilesResult<FileRepository> {
        Ok(FileRepository::new(
            self.build_disks()?,
            self.record_store(),
            notifier,
        ))
    }

    fn rebase(&mut self, base: &Path) {
        if let Some(dir) = self.records_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        for disk in self.disks.values_mut() {
            if let DiskConfig::Local { root, .. } = disk {
                if root.is_relative() {
                    *root = base.join(&*root);
                }
            }
        }
    }
}

/// Resolve the configuration file without reading environment variables.
///
/// An explicit override must point at an existing file. Otherwise `depot.yaml` in the
/// working directory is used.
pub fn resolve_config_path(override_path: Option<PathBuf>) -> FilesResult<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path);
        }
        return Err(FilesError::Config(format!(
            "configuration file {} does not exist",
            path.display()
        )));
    }

    let cwd_relative = PathBuf::from(DEFAULT_CONFIG_FILENAME);
    if cwd_relative.is_file() {
        return Ok(cwd_relative);
    }

    Err(FilesError::Config(format!(
        "no {} in the working directory and no configuration path given",
        DEFAULT_CONFIG_FILENAME
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
default_disk: local
records_dir: depot_data/records
disks:
  local:
    driver: local
    root: depot_data/local
    url: http://localhost:3000/storage/local
  scratch:
    driver: memory
"#;

    #[test]
    fn parses_sample_configuration() {
        let config = DepotConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.default_disk().as_str(), "local");
        assert_eq!(config.records_dir(), Some(Path::new("depot_data/records")));
        assert_eq!(config.disks().len(), 2);
        let scratch = DiskName::new("scratch").unwrap();
        assert_eq!(
            config.disks().get(&scratch),
            Some(&DiskConfig::Memory { url: None })
        );
    }

    #[test]
    fn single_disk_needs_no_default() {
        let config = DepotConfig::from_yaml_str("disks:\n  only:\n    driver: memory\n").unwrap();

        assert_eq!(config.default_disk().as_str(), "only");
        assert!(config.records_dir().is_none());
    }

    #[test]
    fn rejects_invalid_configurations() {
        for yaml in [
            "disks: {}\n",
            "default_disk: missing\ndisks:\n  local:\n    driver: memory\n",
            "disks:\n  a:\n    driver: memory\n  b:\n    driver: memory\n",
            "disks:\n  \"bad name\":\n    driver: memory\n",
            "disks:\n  local:\n    driver: ftp\n",
            "disks:\n  local:\n    driver: local\n",
        ] {
            assert!(
                matches!(DepotConfig::from_yaml_str(yaml), Err(FilesError::Config(_))),
                "accepted: {yaml}"
            );
        }
    }

    #[test]
    fn load_rebases_relative_paths() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("depot.yaml");
        fs::write(&path, SAMPLE).unwrap();

        let config = DepotConfig::load(&path).unwrap();

        assert_eq!(
            config.records_dir(),
            Some(temp.path().join("depot_data/records").as_path())
        );
        let local = DiskName::new("local").unwrap();
        match config.disks().get(&local) {
            Some(DiskConfig::Local { root, .. }) => {
                assert_eq!(root, &temp.path().join("depot_data/local"))
            }
            other => panic!("unexpected disk config: {other:?}"),
        }
    }

    #[test]
    fn builds_disks_and_repository() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("depot.yaml");
        fs::write(&path, SAMPLE).unwrap();
        let config = DepotConfig::load(&path).unwrap();

        let disks = config.build_disks().unwrap();
        let names: Vec<&str> = disks.names().map(DiskName::as_str).collect();
        assert_eq!(names, vec!["local", "scratch"]);
        assert_eq!(disks.default_disk().as_str(), "local");

        let scratch = disks.resolve("scratch").unwrap();
        assert_eq!(
            disks.backend(&scratch).unwrap().public_url("a.png").unwrap(),
            "memory://scratch/a.png"
        );

        let repository = config
            .repository(Arc::new(crate::NullNotifier))
            .unwrap();
        assert!(repository.list().unwrap().is_empty());
    }

    #[test]
    fn resolve_config_path_requires_existing_override() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("depot.yaml");
        fs::write(&present, SAMPLE).unwrap();

        assert_eq!(resolve_config_path(Some(present.clone())).unwrap(), present);
        assert!(matches!(
            resolve_config_path(Some(temp.path().join("absent.yaml"))),
            Err(FilesError::Config(_))
        ));
    }
}
