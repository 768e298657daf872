//! Cart persistence on device storage.
//!
//! The item list is stored as JSON under a single key, wrapped in a
//! versioned envelope:
//!
//! ```json
//! { "version": 1, "savedAt": "2025-01-01T00:00:00Z", "items": [ ... ] }
//! ```
//!
//! Carts written before the envelope existed are a bare JSON array of items.
//! They are read as version 0 and rewritten in the current format.

use crate::types::{normalize, CartItem};
use chrono::{DateTime, Utc};
use gestpharma_core::environment::Clock;
use gestpharma_core::storage::{KeyValueStorage, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Storage key used when none is configured
pub const DEFAULT_CART_KEY: &str = "cart";

/// Version written by [`CartPersistence::persist`]
pub const SCHEMA_VERSION: u64 = 1;

/// Errors while writing or reading the persisted cart
#[derive(Error, Debug)]
pub enum PersistError {
    /// The device store refused the operation
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The cart could not be encoded or the stored value decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The envelope was written by a newer client
    #[error("Cart schema version {0} is newer than this client supports")]
    UnsupportedVersion(u64),

    /// The envelope declares a version that no envelope was ever written with
    #[error("Cart envelope declares invalid schema version {0}")]
    InvalidVersion(u64),

    /// The stored value is valid JSON but neither an envelope nor an item array
    #[error("Persisted cart has an unexpected shape")]
    UnexpectedShape,
}

/// Outcome of reading the persisted cart at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hydrated {
    /// Nothing stored under the key
    Absent,
    /// Something was stored but could not be read; treated as empty
    Corrupt,
    /// Items read back from storage
    Loaded {
        /// Normalized lines
        items: Vec<CartItem>,
        /// Set when a legacy cart could not be rewritten in the current format
        save_error: Option<String>,
    },
}

impl Hydrated {
    /// Items to start with (empty unless [`Hydrated::Loaded`])
    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        match self {
            Self::Loaded { items, .. } => items,
            Self::Absent | Self::Corrupt => Vec::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a> {
    version: u64,
    saved_at: DateTime<Utc>,
    items: &'a [CartItem],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    items: Vec<CartItem>,
}

/// A decoded stored value and the schema version it was written with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Schema version (0 for the legacy bare array)
    pub version: u64,
    /// When the value was written, if recorded
    pub saved_at: Option<DateTime<Utc>>,
    /// Stored items, subtotals recomputed
    pub items: Vec<CartItem>,
}

/// Decode a stored cart value
///
/// # Errors
///
/// Returns [`PersistError::Serialization`] for malformed JSON or items,
/// [`PersistError::UnsupportedVersion`] for envelopes newer than
/// [`SCHEMA_VERSION`], [`PersistError::InvalidVersion`] for older ones, and
/// [`PersistError::UnexpectedShape`] otherwise.
pub fn decode(raw: &str) -> Result<Decoded, PersistError> {
    let value: Value = serde_json::from_str(raw)?;

    match value {
        Value::Array(_) => Ok(Decoded {
            version: 0,
            saved_at: None,
            items: serde_json::from_value(value)?,
        }),
        Value::Object(ref fields) => {
            let version = fields
                .get("version")
                .and_then(Value::as_u64)
                .ok_or(PersistError::UnexpectedShape)?;
            if version > SCHEMA_VERSION {
                return Err(PersistError::UnsupportedVersion(version));
            }
            if version < SCHEMA_VERSION {
                return Err(PersistError::InvalidVersion(version));
            }
            let envelope: Envelope = serde_json::from_value(value)?;
            Ok(Decoded {
                version,
                saved_at: envelope.saved_at,
                items: envelope.items,
            })
        },
        _ => Err(PersistError::UnexpectedShape),
    }
}

/// Reads and writes the cart's item list under one storage key
///
/// Cheap to clone; clones share the storage and clock.
#[derive(Clone)]
pub struct CartPersistence {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CartPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl CartPersistence {
    /// Creates a persistence adapter for `key`
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            key: key.into(),
            clock,
        }
    }

    /// Storage key the cart lives under
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Encode `items` in the current envelope format
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Serialization`] if encoding fails.
    pub fn encode(&self, items: &[CartItem]) -> Result<String, PersistError> {
        let envelope = EnvelopeRef {
            version: SCHEMA_VERSION,
            saved_at: self.clock.now(),
            items,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Write `items` to storage, replacing what was there
    ///
    /// Failures are logged and counted here; the caller decides what else to
    /// do with them.
    ///
    /// # Errors
    ///
    /// Returns the encoding or storage error.
    #[allow(clippy::cast_precision_loss)] // byte counts are far below 2^52
    #[tracing::instrument(name = "persist", skip(self, items), fields(key = %self.key, items = items.len()))]
    pub fn persist(&self, items: &[CartItem]) -> Result<(), PersistError> {
        let result = self
            .encode(items)
            .and_then(|raw| {
                metrics::histogram!("cart.persist.bytes").record(raw.len() as f64);
                self.storage.set(&self.key, &raw).map_err(PersistError::from)
            });

        match &result {
            Ok(()) => tracing::debug!("Cart persisted"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist cart");
                metrics::counter!("cart.persist.failures").increment(1);
            },
        }
        result
    }

    /// Read the stored cart without interpreting failures
    ///
    /// # Errors
    ///
    /// Returns the storage error or the [`decode`] error.
    pub fn load(&self) -> Result<Option<Decoded>, PersistError> {
        self.storage
            .get(&self.key)?
            .map(|raw| decode(&raw))
            .transpose()
    }

    /// Read the stored cart for start-up
    ///
    /// Never fails: unreadable storage and undecodable values are logged and
    /// reported as [`Hydrated::Corrupt`]. Lines are normalized. A legacy cart
    /// is rewritten in the current format; if that write fails the items are
    /// still returned and the failure is carried in `save_error`.
    #[tracing::instrument(name = "hydrate", skip(self), fields(key = %self.key))]
    pub fn hydrate(&self) -> Hydrated {
        match self.load() {
            Ok(None) => {
                tracing::debug!("No persisted cart");
                Hydrated::Absent
            },
            Ok(Some(decoded)) => {
                let items = normalize(decoded.items);
                let save_error = if decoded.version < SCHEMA_VERSION {
                    tracing::info!(from = decoded.version, to = SCHEMA_VERSION, "Migrating persisted cart");
                    self.persist(&items).err().map(|e| not_saved_message(&e))
                } else {
                    None
                };
                tracing::debug!(items = items.len(), "Cart hydrated");
                Hydrated::Loaded { items, save_error }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Persisted cart is unreadable, starting empty");
                metrics::counter!("cart.hydrate.corrupt").increment(1);
                Hydrated::Corrupt
            },
        }
    }
}

/// Message shown in the cart's `error` while writes are failing
pub(crate) fn not_saved_message(e: &PersistError) -> String {
    format!("Cart changes are not being saved: {e}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::Product;
    use gestpharma_testing::{test_clock, InMemoryStorage};

    fn persistence(storage: &InMemoryStorage) -> CartPersistence {
        CartPersistence::new(Arc::new(storage.clone()), DEFAULT_CART_KEY, Arc::new(test_clock()))
    }

    fn items() -> Vec<CartItem> {
        vec![
            CartItem::new(Product::new(1, "Aspirina 500mg", Money::from_cents(2550), 100), 2),
            CartItem::new(Product::new(2, "Ibuprofeno 400mg", Money::from_cents(3500), 50), 1),
        ]
    }

    #[test]
    fn persist_writes_versioned_envelope() {
        let storage = InMemoryStorage::new();
        persistence(&storage).persist(&items()).unwrap();

        let raw: Value = serde_json::from_str(&storage.raw("cart").unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["savedAt"], "2025-01-01T00:00:00Z");
        assert_eq!(raw["items"][0]["product"]["nombre"], "Aspirina 500mg");
        assert_eq!(raw["items"][0]["quantity"], 2);
        assert_eq!(raw["items"][0]["subtotal"], 51.0);
    }

    #[test]
    fn hydrate_round_trips() {
        let storage = InMemoryStorage::new();
        let persistence = persistence(&storage);
        persistence.persist(&items()).unwrap();

        assert_eq!(
            persistence.hydrate(),
            Hydrated::Loaded {
                items: items(),
                save_error: None,
            }
        );
    }

    #[test]
    fn hydrate_absent() {
        let storage = InMemoryStorage::new();
        assert_eq!(persistence(&storage).hydrate(), Hydrated::Absent);
    }

    #[test]
    fn hydrate_corrupt_values() {
        for raw in ["not json", "{\"items\": []}", "42", "{\"version\": 1, \"items\": 3}"] {
            let storage = InMemoryStorage::new();
            storage.set("cart", raw).unwrap();
            assert_eq!(persistence(&storage).hydrate(), Hydrated::Corrupt, "{raw}");
        }
    }

    #[test]
    fn newer_schema_is_rejected() {
        let err = decode(r#"{"version": 2, "items": []}"#).unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedVersion(2)));
    }

    #[test]
    fn envelope_older_than_schema_is_invalid() {
        let err = decode(r#"{"version": 0, "items": []}"#).unwrap_err();
        assert!(matches!(err, PersistError::InvalidVersion(0)));
        assert!(!err.to_string().contains("newer"));
    }

    #[test]
    fn legacy_array_is_migrated() {
        let storage = InMemoryStorage::new();
        storage
            .set(
                "cart",
                r#"[{"product": {"id": 1, "nombre": "Aspirina 500mg", "precio": 25.5, "stock": 100}, "quantity": 2, "subtotal": 51}]"#,
            )
            .unwrap();

        let hydrated = persistence(&storage).hydrate();
        assert_eq!(hydrated.into_items().len(), 1);

        let decoded = decode(&storage.raw("cart").unwrap()).unwrap();
        assert_eq!(decoded.version, SCHEMA_VERSION);
        assert_eq!(decoded.saved_at, Some(test_clock().now()));
        assert_eq!(decoded.items[0].subtotal(), Money::from_cents(5100));
    }

    #[test]
    fn legacy_migration_writes_normalized_lines() {
        let storage = InMemoryStorage::new();
        storage
            .set(
                "cart",
                r#"[
                    {"product": {"id": 1, "nombre": "Aspirina 500mg", "precio": 25.5}, "quantity": 2},
                    {"product": {"id": 2, "nombre": "Ibuprofeno 400mg", "precio": 35}, "quantity": 0},
                    {"product": {"id": 1, "nombre": "Aspirina 500mg", "precio": 25.5}, "quantity": 3}
                ]"#,
            )
            .unwrap();

        let items = persistence(&storage).hydrate().into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity(), 5);

        let stored = decode(&storage.raw("cart").unwrap()).unwrap();
        assert_eq!(stored.items, items);
    }

    #[test]
    fn failed_legacy_migration_is_reported() {
        let storage = InMemoryStorage::new();
        storage
            .set(
                "cart",
                r#"[{"product": {"id": 1, "nombre": "Aspirina 500mg", "precio": 25.5}, "quantity": 2}]"#,
            )
            .unwrap();
        storage.fail_writes(true);

        let Hydrated::Loaded { items, save_error } = persistence(&storage).hydrate() else {
            panic!("legacy cart should load");
        };
        assert_eq!(items.len(), 1);
        assert!(save_error.unwrap().starts_with("Cart changes are not being saved"));
        assert_eq!(decode(&storage.raw("cart").unwrap()).unwrap().version, 0);
    }

    #[test]
    fn persist_reports_storage_failure() {
        let storage = InMemoryStorage::with_quota(16);
        let err = persistence(&storage).persist(&items()).unwrap_err();
        assert!(matches!(err, PersistError::Storage(StorageError::QuotaExceeded { .. })));
        assert!(storage.is_empty());
    }
}
