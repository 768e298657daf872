//! # GestPharma Cart
//!
//! Point-of-sale cart for the GestPharma pharmacy client.
//!
//! The cart is a reducer-driven store: every change goes through
//! [`CartReducer`], the resulting item list is mirrored to device storage
//! before the call returns, and subscribers observe complete cart states.
//!
//! ## Modules
//!
//! - [`types`]: products, cart lines, cart state and actions
//! - [`money`]: exact cent amounts
//! - [`reducer`]: cart business logic
//! - [`persistence`]: versioned storage format, hydration
//! - [`storage`]: file-backed device storage
//! - [`store`]: the [`CartStore`] handle and subscriptions
//! - [`pos`]: stock-aware sale screen operations
//! - [`checkout`]: sale request building
//! - [`config`]: environment configuration
//!
//! ## Example
//!
//! ```no_run
//! use gestpharma_cart::{CartConfig, CartStore, FileStorage, Money, Product};
//! use gestpharma_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = CartConfig::from_env()?;
//! let storage = Arc::new(FileStorage::open(&config.storage_dir)?);
//! let cart = CartStore::open(&config, storage, Arc::new(SystemClock)).await?;
//!
//! cart.add_item(Product::new(1, "Aspirina 500mg", Money::from_cents(2550), 100), 2).await?;
//! assert_eq!(cart.total(), Money::from_cents(5100));
//! # Ok(())
//! # }
//! ```

pub mod checkout;
pub mod config;
pub mod money;
pub mod persistence;
pub mod pos;
pub mod reducer;
pub mod storage;
pub mod store;
pub mod types;

pub use checkout::{CheckoutError, SaleLine, SaleRequest};
pub use config::{CartConfig, ConfigError};
pub use money::Money;
pub use persistence::{CartPersistence, Hydrated, PersistError};
pub use pos::PosError;
pub use reducer::{CartEnvironment, CartReducer};
pub use storage::FileStorage;
pub use store::{CartStore, CartSubscription, CartSummary, OpenError};
pub use types::{CartAction, CartItem, CartState, Product, ProductId};
