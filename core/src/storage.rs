//! Key-value device storage.
//!
//! # Overview
//!
//! Client-side state that must survive an application restart (the cart, for
//! instance) is mirrored into a small synchronous key-value store: browser
//! local storage on the web build, a directory of files on desktop, a
//! `HashMap` in tests. Values are opaque strings; callers own the encoding.
//!
//! Operations are synchronous on purpose: writes are local and fast, and the
//! stores that use them persist inside the same critical section as the state
//! mutation, so the persisted copy is written in dispatch order.
//!
//! ## Example
//!
//! ```ignore
//! use gestpharma_core::storage::KeyValueStorage;
//!
//! fn remember(storage: &dyn KeyValueStorage) -> Result<(), StorageError> {
//!     storage.set("cart", "[]")?;
//!     assert_eq!(storage.get("cart")?.as_deref(), Some("[]"));
//!     storage.remove("cart")
//! }
//! ```

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key is not acceptable to this backend
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Writing the value would exceed the backend's capacity
    #[error("Storage quota exceeded writing {key:?}: {needed} bytes needed, {limit} bytes allowed")]
    QuotaExceeded {
        /// Key being written
        key: String,
        /// Bytes the store would hold after the write
        needed: usize,
        /// Configured capacity
        limit: usize,
    },

    /// Underlying I/O failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Synchronous string key-value store.
///
/// Implementations must be safe to share between the store runtime and any
/// number of readers.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the value cannot be written, including
    /// [`StorageError::QuotaExceeded`].
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the value under `key`. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be modified.
    fn remove(&self, key: &str) -> Result<()>;

    /// Whether a value is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be read.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Delete every stored value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be modified.
    fn clear(&self) -> Result<()>;
}

/// Whether `key` is usable by every storage backend.
///
/// Keys are restricted to ASCII letters, digits, `_`, `-` and `.` (not
/// leading), so they map directly onto file names.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}
