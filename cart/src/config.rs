//! Configuration for the cart store.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::persistence::DEFAULT_CART_KEY;
use gestpharma_core::storage::is_valid_key;
use gestpharma_runtime::StoreConfig;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configured cart key cannot be used as a storage key
    #[error("Invalid cart storage key {0:?}: use ASCII letters, digits, '_', '-' or '.'")]
    InvalidStorageKey(String),

    /// The store must allow at least the persistence feedback action
    #[error("max feedback depth must be at least 1")]
    ZeroFeedbackDepth,
}

/// Cart configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    /// Device storage key the cart is persisted under (`GESTPHARMA_CART_KEY`)
    pub storage_key: String,
    /// Directory used by file storage (`GESTPHARMA_STORAGE_DIR`)
    pub storage_dir: PathBuf,
    /// Log filter for the binary (`RUST_LOG`)
    pub log_level: String,
    /// Runtime settings for the underlying store
    pub store: StoreConfig,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_CART_KEY.to_string(),
            storage_dir: PathBuf::from(".gestpharma"),
            log_level: "info".to_string(),
            store: StoreConfig::default().with_name("cart"),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is present but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unset and unparseable numeric values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the cart key is invalid or the feedback depth is 0.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            storage_key: lookup("GESTPHARMA_CART_KEY").unwrap_or(defaults.storage_key),
            storage_dir: lookup("GESTPHARMA_STORAGE_DIR")
                .map_or(defaults.storage_dir, PathBuf::from),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            store: StoreConfig::new(
                "cart",
                lookup("GESTPHARMA_MAX_FEEDBACK_DEPTH")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.store.max_feedback_depth),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    /// Use a different storage key
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Use a different storage directory
    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_key(&self.storage_key) {
            return Err(ConfigError::InvalidStorageKey(self.storage_key.clone()));
        }
        if self.store.max_feedback_depth == 0 {
            return Err(ConfigError::ZeroFeedbackDepth);
        }
        Ok(())
    }
}
