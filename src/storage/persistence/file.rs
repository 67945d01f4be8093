//! Single-file backend storing LZ4-compressed JSON snapshots

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{PersistenceBackend, PersistenceError, StoreSnapshot};

/// Snapshot file on local disk
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend writing to `path`, creating the parent directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl PersistenceBackend for FileBackend {
    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec(snapshot)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        let compressed = lz4_flex::compress_prepend_size(&json);

        // Write next to the target, then rename over it
        let temp = self.temp_path();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)?;
        file.write_all(&compressed)?;
        file.sync_all()?;
        fs::rename(&temp, &self.path)?;

        Ok(())
    }

    fn load(&self) -> Result<Option<StoreSnapshot>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let compressed = fs::read(&self.path)?;
        let json = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&json)
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;

        if snapshot.version != StoreSnapshot::VERSION {
            return Err(PersistenceError::UnsupportedVersion(snapshot.version));
        }

        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CheckResult, Retention, Service, ServiceStatus};
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn snapshot() -> StoreSnapshot {
        let service = Service::new("core", "api", "https://example.org");
        let mut status = ServiceStatus::new(&service);
        status.add_result(
            &CheckResult::new(Utc::now(), true, Duration::from_millis(12)).with_status(200),
            &Retention::default(),
        );
        StoreSnapshot {
            version: StoreSnapshot::VERSION,
            saved_at: Utc::now(),
            statuses: vec![status],
        }
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path().join("data.lz4")).unwrap();

        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn test_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path().join("nested/dir/data.lz4")).unwrap();

        let original = snapshot();
        backend.save(&original).unwrap();

        let loaded = backend.load().unwrap().unwrap();
        assert_eq!(loaded.statuses, original.statuses);
        assert!(!backend.temp_path().exists());
    }

    #[test]
    fn test_corrupted_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.lz4");
        std::fs::write(&path, [8u8, 0, 0, 0, 0xF0]).unwrap();

        let backend = FileBackend::new(&path).unwrap();
        assert!(backend.load().is_err());
    }

    #[test]
    fn test_unsupported_version() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path().join("data.lz4")).unwrap();

        let mut future = snapshot();
        future.version = 99;
        backend.save(&future).unwrap();

        assert!(matches!(
            backend.load(),
            Err(PersistenceError::UnsupportedVersion(99))
        ));
    }
}
