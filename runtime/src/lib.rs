//! # GestPharma Runtime
//!
//! Runtime implementation for GestPharma state containers.
//!
//! This crate provides the Store that coordinates reducer execution,
//! effect handling, and state broadcast.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that owns state and executes effects
//! - **Effect Executor**: Runs effect descriptions and feeds actions back to the reducer
//! - **State Broadcast**: Publishes each complete post-action state to subscribers
//!
//! ## Example
//!
//! ```ignore
//! use gestpharma_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//!
//! // Observe future states
//! let mut rx = store.subscribe();
//! rx.changed().await?;
//! ```

use gestpharma_core::{effect::Effect, reducer::Reducer};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{watch, RwLock};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after `shutdown()`.
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }
}

pub use error::StoreError;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use gestpharma_runtime::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_name("cart")
///     .with_max_feedback_depth(4);
///
/// assert_eq!(config.name, "cart");
/// assert_eq!(config.max_feedback_depth, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store name, used as the `store` label on metrics and in log fields
    pub name: String,
    /// How many rounds of effect-produced actions one `send()` may trigger
    ///
    /// Actions produced beyond this depth are dropped and logged.
    pub max_feedback_depth: usize,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub fn new(name: impl Into<String>, max_feedback_depth: usize) -> Self {
        Self {
            name: name.into(),
            max_feedback_depth,
        }
    }

    /// Set the store name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum feedback depth
    #[must_use]
    pub const fn with_max_feedback_depth(mut self, depth: usize) -> Self {
        self.max_feedback_depth = depth;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            max_feedback_depth: 8,
        }
    }
}

/// Store module - The runtime for reducers
///
/// Store runtime for coordinating reducer execution, effect handling, and
/// state publication.
pub mod store {
    use super::{watch, AtomicBool, Effect, Ordering, Reducer, RwLock, StoreConfig, StoreError};
    use gestpharma_core::SmallVec;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`, the only place it can be mutated)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    /// 5. State broadcast (a `watch` channel holding the latest complete state)
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = Store::new(CartState::default(), CartReducer::new(), env);
    ///
    /// store.send(CartAction::ClearCart).await?;
    /// assert!(store.snapshot().is_empty());
    /// ```
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: RwLock<S>,
        reducer: R,
        environment: E,
        config: StoreConfig,
        shutdown: AtomicBool,
        /// Latest complete state, republished after every `send()`.
        ///
        /// Written only while the state write lock is held, so publication
        /// order always matches reduction order.
        published: watch::Sender<S>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// Uses [`StoreConfig::default`].
        ///
        /// # Arguments
        ///
        /// - `initial_state`: The starting state for the store
        /// - `reducer`: The reducer implementation (business logic)
        /// - `environment`: Injected dependencies
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        #[must_use]
        pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
            let (published, _) = watch::channel(initial_state.clone());

            Self {
                state: RwLock::new(initial_state),
                reducer,
                environment,
                config,
                shutdown: AtomicBool::new(false),
                published,
            }
        }

        /// The configuration this store was built with
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// The injected environment
        #[must_use]
        pub const fn environment(&self) -> &E {
            &self.environment
        }

        /// Stop accepting actions
        ///
        /// Every effect runs before `send()` returns, so there is nothing to
        /// drain. A `send()` already past the shutdown check still completes;
        /// later ones are rejected. Subscribers keep the last published state.
        pub fn shutdown(&self) {
            tracing::info!(store = %self.config.name, "Store shutting down");
            metrics::counter!("store.shutdown.initiated", "store" => self.config.name.clone())
                .increment(1);
            self.shutdown.store(true, Ordering::Release);
        }

        /// Whether [`shutdown`](Self::shutdown) has been called
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Send an action to the store
        ///
        /// This is the primary way to interact with the store:
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Executes returned effects in order, feeding produced actions back
        /// 4. Publishes the resulting state to subscribers
        ///
        /// All four steps complete before this returns, so a caller that reads
        /// state afterwards observes its own action and every effect it caused.
        ///
        /// # Concurrency
        ///
        /// Concurrent `send()` calls serialize on the write lock. No subscriber
        /// can observe a state in the middle of a reduction.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        ///
        /// # Panics
        ///
        /// If the reducer panics, the panic propagates to the caller.
        /// Reducers should be pure functions that do not panic.
        #[tracing::instrument(skip(self, action), name = "store_send", fields(store = %self.config.name))]
        pub async fn send(&self, action: A) -> Result<(), StoreError> {
            if self.is_shutting_down() {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions", "store" => self.config.name.clone())
                    .increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            tracing::debug!("Processing action");
            metrics::counter!("store.commands.total", "store" => self.config.name.clone()).increment(1);

            let mut state = self.state.write().await;
            tracing::trace!("Acquired write lock on state");

            let effects = self.reduce_timed(&mut state, action);
            self.execute_effects(&mut state, effects, 0);

            self.published.send_replace(S::clone(&state));
            tracing::debug!(
                subscribers = self.published.receiver_count(),
                "Action processing completed, state published"
            );

            Ok(())
        }

        /// Read current state via a closure
        ///
        /// Access state through a closure to ensure the lock is released promptly:
        ///
        /// ```ignore
        /// let lines = store.state(|s| s.items().len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Read the last published state synchronously via a closure
        ///
        /// For callers that cannot await (one-shot reads at checkout time,
        /// rendering code). Equal to the state after the most recent
        /// completed `send()`.
        pub fn peek<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            f(&self.published.borrow())
        }

        /// Clone of the last published state
        #[must_use]
        pub fn snapshot(&self) -> S {
            self.published.borrow().clone()
        }

        /// Subscribe to state changes
        ///
        /// The receiver starts at the current state (already marked as seen)
        /// and is notified after every completed `send()`. Every value it
        /// observes is a complete post-action state; a slow subscriber may
        /// skip intermediate states but never sees a partial one.
        ///
        /// # Example
        ///
        /// ```ignore
        /// let mut rx = store.subscribe();
        /// while rx.changed().await.is_ok() {
        ///     render(&rx.borrow_and_update());
        /// }
        /// ```
        #[must_use]
        pub fn subscribe(&self) -> watch::Receiver<S> {
            self.published.subscribe()
        }

        /// Number of live subscribers
        #[must_use]
        pub fn subscriber_count(&self) -> usize {
            self.published.receiver_count()
        }

        fn reduce_timed(&self, state: &mut S, action: A) -> SmallVec<[Effect<A>; 4]> {
            let span = tracing::debug_span!("reducer_execution");
            let _enter = span.enter();

            let start = std::time::Instant::now();
            let effects = self.reducer.reduce(state, action, &self.environment);
            metrics::histogram!("store.reducer.duration_seconds", "store" => self.config.name.clone())
                .record(start.elapsed().as_secs_f64());

            tracing::trace!("Reducer completed, returned {} effects", effects.len());
            effects
        }

        /// Execute effects in order while the write lock is held
        ///
        /// # Effect Types
        ///
        /// - `None`: No-op
        /// - `Run`: Calls the closure; a returned action is reduced immediately
        ///   and its own effects executed one level deeper
        fn execute_effects(&self, state: &mut S, effects: SmallVec<[Effect<A>; 4]>, depth: usize) {
            for effect in effects {
                match effect {
                    Effect::None => {
                        tracing::trace!("Executing Effect::None (no-op)");
                        metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                    },
                    Effect::Run(f) => {
                        tracing::trace!(depth, "Executing Effect::Run");
                        metrics::counter!("store.effects.executed", "type" => "run").increment(1);

                        let Some(action) = f() else {
                            continue;
                        };

                        if depth >= self.config.max_feedback_depth {
                            tracing::warn!(
                                depth,
                                max_depth = self.config.max_feedback_depth,
                                "Dropping feedback action: maximum feedback depth reached"
                            );
                            metrics::counter!("store.feedback.dropped", "store" => self.config.name.clone())
                                .increment(1);
                            continue;
                        }

                        tracing::trace!("Effect::Run produced an action, reducing");
                        let more = self.reduce_timed(state, action);
                        self.execute_effects(state, more, depth + 1);
                    },
                }
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
