//! # GestPharma Testing
//!
//! Testing utilities and helpers for GestPharma state containers.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (clock, device storage)
//! - A Given-When-Then harness for reducers
//! - Assertion helpers for effects
//! - Tracing setup for tests
//!
//! ## Example
//!
//! ```ignore
//! use gestpharma_testing::{test_clock, InMemoryStorage};
//!
//! #[tokio::test]
//! async fn test_cart_flow() {
//!     let storage = Arc::new(InMemoryStorage::new());
//!     let cart = CartStore::open(&CartConfig::default(), storage.clone(), Arc::new(test_clock())).await.unwrap();
//!
//!     cart.add_item(product, 2).await.unwrap();
//!     assert!(storage.contains_key("cart"));
//! }
//! ```

use chrono::{DateTime, Utc};
use gestpharma_core::environment::Clock;


/// In-memory device storage for tests
pub mod storage_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use gestpharma_testing::mocks::FixedClock;
    /// use gestpharma_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG` (default `warn`). Safe to call from every test; only
/// the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{assertions, ReducerTest};
pub use storage_mocks::InMemoryStorage;
