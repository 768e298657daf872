//! In-memory device storage testing utilities
//!
//! Provides fast, deterministic storage for store tests:
//! - [`InMemoryStorage`]: `HashMap`-backed [`KeyValueStorage`] with an
//!   optional byte quota and switchable write failures, for exercising the
//!   "storage full" paths that local device storage hits in the field.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use gestpharma_core::storage::{is_valid_key, KeyValueStorage, Result, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory key-value storage for fast, deterministic testing.
///
/// Clones share the same underlying map, so a test can keep a handle for
/// inspection while the store under test owns another.
///
/// # Example
///
/// ```
/// use gestpharma_testing::InMemoryStorage;
/// use gestpharma_core::storage::KeyValueStorage;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = InMemoryStorage::new();
///
/// storage.set("cart", "[]")?;
/// assert_eq!(storage.get("cart")?.as_deref(), Some("[]"));
///
/// // Simulate a full device
/// let tiny = InMemoryStorage::with_quota(4);
/// assert!(tiny.set("cart", "[1,2,3]").is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
    quota: Option<usize>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryStorage {
    /// Create a new empty storage with no quota
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage that refuses writes once the sum of stored value
    /// lengths would exceed `limit` bytes
    #[must_use]
    pub fn with_quota(limit: usize) -> Self {
        Self {
            quota: Some(limit),
            ..Self::default()
        }
    }

    /// Make every subsequent `set`/`remove`/`clear` fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls so far
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw stored value, bypassing error handling
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.read().unwrap().get(key).cloned()
    }

    /// Check if a key exists
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    /// Get all keys in the store
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().unwrap().keys().cloned().collect()
    }

    /// Get the number of stored values
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("in-memory storage lock poisoned".to_string())
}

impl KeyValueStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable(key)?;
        let mut data = self.data.write().map_err(poisoned)?;

        if let Some(limit) = self.quota {
            let others: usize = data
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }

        data.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_writable(key)?;
        self.data.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected write failure".to_string()));
        }
        self.data.write().map_err(poisoned)?.clear();
        Ok(())
    }
}
