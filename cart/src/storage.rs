//! File-backed device storage.
//!
//! One file per key inside a directory. Writes go to a hidden temporary file
//! that is renamed over the target, so a crash mid-write leaves either the old
//! value or the new one on disk.

use gestpharma_core::storage::{is_valid_key, KeyValueStorage, Result, StorageError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// [`KeyValueStorage`] over a directory on the local filesystem
///
/// Every operation is blocking file I/O, and `set` waits for `sync_all`.
/// A store persists inside `send` while holding its write lock, so on a
/// Tokio runtime each dispatch occupies a worker thread for the length of
/// the write. Use the multi-threaded runtime so other tasks keep running.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl FileStorage {
    /// Opens (and creates if needed) a storage directory
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened file storage");
        Ok(Self {
            dir,
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Directory holding the stored values
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if is_valid_key(key) {
            Ok(self.dir.join(key))
        } else {
            Err(StorageError::InvalidKey(key.to_string()))
        }
    }

    fn atomic_write(&self, path: &Path, key: &str, value: &str) -> io::Result<()> {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        // Leading dot keeps temporaries out of the valid key space
        let tmp_path = self.dir.join(format!(".{key}.tmp.{}.{seq}", std::process::id()));

        let result = (|| -> io::Result<()> {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)?;

            if let Ok(dir) = fs::File::open(&self.dir) {
                let _ = dir.sync_all();
            }
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        self.atomic_write(&path, key, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let is_key = entry.file_name().to_str().is_some_and(is_valid_key);
            if is_key && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
