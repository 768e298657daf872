//! The cart store.
//!
//! [`CartStore`] is the handle the point-of-sale screens hold. It owns the
//! cart through a runtime [`Store`], hydrates it at start-up, and exposes
//! typed operations plus synchronous reads of the latest state.
//!
//! ```ignore
//! let store = CartStore::open(&config, storage, Arc::new(SystemClock)).await?;
//! store.add_item(aspirin, 2).await?;
//! assert_eq!(store.total(), Money::from_cents(5100));
//! ```

use crate::config::{CartConfig, ConfigError};
use crate::money::Money;
use crate::persistence::{CartPersistence, Hydrated};
use crate::reducer::{CartEnvironment, CartReducer};
use crate::types::{CartAction, CartItem, CartState, Product, ProductId};
use gestpharma_core::environment::Clock;
use gestpharma_core::storage::KeyValueStorage;
use gestpharma_runtime::{Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Errors opening a [`CartStore`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// The configuration cannot be used
    #[error("Invalid cart configuration: {0}")]
    Config(#[from] ConfigError),

    /// The fresh store rejected the hydration action
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runtime store specialised to the cart
pub type CartRuntime = Store<CartState, CartAction, CartEnvironment, CartReducer>;

/// Handle to the cart
///
/// Cheap to clone; clones share one cart. Every operation completes its
/// state change, its storage write, and the notification of subscribers
/// before returning.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartRuntime>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("config", self.inner.config())
            .field("persistence", &self.inner.environment().persistence)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Build the store and hydrate it from `storage`
    ///
    /// A stored cart that cannot be read is logged and replaced by an empty
    /// one; it is not an error. A legacy cart that cannot be rewritten opens
    /// with [`error`](Self::error) set.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError::Config`] if `config` fails
    /// [`validate`](CartConfig::validate), and [`OpenError::Store`] if the
    /// fresh store rejects the hydration action.
    #[tracing::instrument(name = "cart_open", skip_all, fields(key = %config.storage_key))]
    pub async fn open(
        config: &CartConfig,
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, OpenError> {
        config.validate()?;
        let persistence = CartPersistence::new(storage, config.storage_key.clone(), clock);
        Self::with_persistence(persistence, config).await
    }

    /// Build the store around an existing persistence adapter and hydrate it
    ///
    /// # Errors
    ///
    /// See [`CartStore::open`].
    pub async fn with_persistence(persistence: CartPersistence, config: &CartConfig) -> Result<Self, OpenError> {
        config.validate()?;
        let hydrated = persistence.hydrate();
        let inner = Store::with_config(
            CartState::new(),
            CartReducer::new(),
            CartEnvironment::new(persistence),
            config.store.clone(),
        );
        let store = Self {
            inner: Arc::new(inner),
        };

        if let Hydrated::Loaded { items, save_error } = hydrated {
            store.inner.send(CartAction::LoadFromStorage { items }).await?;
            if let Some(error) = save_error {
                store.inner.send(CartAction::SetError { error: Some(error) }).await?;
            }
        }

        tracing::info!(
            items = store.item_count(),
            total = %store.total(),
            "Cart store ready"
        );
        Ok(store)
    }

    /// Dispatch any cart action
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`close`](Self::close).
    pub async fn send(&self, action: CartAction) -> Result<(), StoreError> {
        self.inner.send(action).await
    }

    /// Add `quantity` units of `product`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`close`](Self::close).
    pub async fn add_item(&self, product: Product, quantity: i64) -> Result<(), StoreError> {
        self.send(CartAction::AddItem { product, quantity }).await
    }

    /// Add one unit of `product`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`close`](Self::close).
    pub async fn add_one(&self, product: Product) -> Result<(), StoreError> {
        self.add_item(product, 1).await
    }

    /// Set the quantity of a line; ≤ 0 removes it
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`close`](Self::close).
    pub async fn update_quantity(&self, product_id: ProductId, quantity: i64) -> Result<(), StoreError> {
        self.send(CartAction::UpdateQuantity { product_id, quantity }).await
    }

    /// Remove a line if present
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`close`](Self::close).
    pub async fn remove_item(&self, product_id: ProductId) -> Result<(), StoreError> {
        self.send(CartAction::RemoveItem { product_id }).await
    }

    /// Empty the cart
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`close`](Self::close).
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.send(CartAction::ClearCart).await
    }

    /// Set the loading hint
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`close`](Self::close).
    pub async fn set_loading(&self, loading: bool) -> Result<(), StoreError> {
        self.send(CartAction::SetLoading { loading }).await
    }

    /// Stop accepting changes; reads keep returning the last state
    pub fn close(&self) {
        self.inner.shutdown();
    }

    /// Whether [`close`](Self::close) has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_shutting_down()
    }

    // ========== Reads ==========

    /// Clone of the current cart
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.snapshot()
    }

    /// Current lines
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.inner.peek(|s| s.items().to_vec())
    }

    /// Current total
    #[must_use]
    pub fn total(&self) -> Money {
        self.inner.peek(CartState::total)
    }

    /// Units in the cart
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.inner.peek(CartState::item_count)
    }

    /// Whether the cart is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.peek(CartState::is_empty)
    }

    /// Loading hint
    #[must_use]
    pub fn loading(&self) -> bool {
        self.inner.peek(CartState::loading)
    }

    /// Last persistence error, if the cart is not being saved
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.peek(|s| s.error().map(str::to_string))
    }

    /// Units of `product_id` in the cart
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> i64 {
        self.inner.peek(|s| s.quantity_of(product_id))
    }

    /// Whether `product_id` has a line
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.inner.peek(|s| s.contains(product_id))
    }

    /// Summary of the current cart
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        self.inner.peek(CartSummary::of)
    }

    /// Observe future cart states
    #[must_use]
    pub fn subscribe(&self) -> CartSubscription {
        CartSubscription {
            rx: self.inner.subscribe(),
        }
    }
}

/// Derived figures of one cart state, computed together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    /// Number of lines
    pub lines: usize,
    /// Sum of quantities
    pub item_count: i64,
    /// Sum of subtotals
    pub total: Money,
    /// Whether there are no lines
    pub is_empty: bool,
}

impl CartSummary {
    /// Summarise `state`
    #[must_use]
    pub fn of(state: &CartState) -> Self {
        Self {
            lines: state.len(),
            item_count: state.item_count(),
            total: state.total(),
            is_empty: state.is_empty(),
        }
    }
}

/// Stream of complete cart states
///
/// Every state observed is one that existed after some completed operation.
/// A subscriber that falls behind skips to the latest state.
#[derive(Debug, Clone)]
pub struct CartSubscription {
    rx: watch::Receiver<CartState>,
}

impl CartSubscription {
    /// Latest state, marking it as seen
    pub fn current(&mut self) -> CartState {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for a state newer than the last one seen
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<CartState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Whether a state newer than the last one seen is waiting
    ///
    /// `false` once the store has been dropped.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Lines of the latest state
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.rx.borrow().items().to_vec()
    }

    /// Total of the latest state
    #[must_use]
    pub fn total(&self) -> Money {
        self.rx.borrow().total()
    }

    /// Unit count of the latest state
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.rx.borrow().item_count()
    }

    /// Whether the latest state is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.borrow().is_empty()
    }

    /// All derived figures of the latest state from one read
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary::of(&self.rx.borrow())
    }
}
