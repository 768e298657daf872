//! Cart reducer.
//!
//! All cart business logic lives here. The reducer mutates the in-memory
//! cart and, for every action that can change the item list, returns one
//! effect that writes the new list to device storage. A failed write comes
//! back as [`CartAction::SetError`].

use crate::persistence::{not_saved_message, CartPersistence};
use crate::types::{normalize, CartAction, CartItem, CartState, Product, ProductId};
use gestpharma_core::effect::Effect;
use gestpharma_core::reducer::Reducer;
use gestpharma_core::{smallvec, SmallVec};

/// Dependencies of the cart reducer
#[derive(Clone, Debug)]
pub struct CartEnvironment {
    /// Where the item list is mirrored
    pub persistence: CartPersistence,
}

impl CartEnvironment {
    /// Creates a new cart environment
    #[must_use]
    pub const fn new(persistence: CartPersistence) -> Self {
        Self { persistence }
    }
}

/// Reducer for [`CartState`]
///
/// Never fails: out-of-range quantities are normalized (≤ 0 removes the
/// line) and unknown product ids are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct CartReducer;

impl CartReducer {
    /// Creates a new cart reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn add_item(state: &mut CartState, product: Product, quantity: i64) {
        match state.position(product.id) {
            Some(index) => {
                let line = &mut state.items[index];
                let new_quantity = line.quantity.saturating_add(quantity);
                line.replace_product(product);
                if new_quantity > 0 {
                    line.set_quantity(new_quantity);
                } else {
                    state.items.remove(index);
                }
            },
            None if quantity > 0 => state.items.push(CartItem::new(product, quantity)),
            None => {
                tracing::debug!(product_id = %product.id, quantity, "Ignoring non-positive add for absent product");
            },
        }
    }

    fn update_quantity(state: &mut CartState, product_id: ProductId, quantity: i64) {
        let Some(index) = state.position(product_id) else {
            tracing::debug!(%product_id, "Ignoring quantity update for absent product");
            return;
        };

        if quantity > 0 {
            state.items[index].set_quantity(quantity);
        } else {
            state.items.remove(index);
        }
    }

    fn remove_item(state: &mut CartState, product_id: ProductId) {
        state.items.retain(|item| item.product.id != product_id);
    }

    /// Effect writing the current item list to storage
    fn persist_effect(state: &CartState, env: &CartEnvironment) -> Effect<CartAction> {
        let items = state.items.clone();
        let persistence = env.persistence.clone();

        Effect::run(move || {
            persistence.persist(&items).err().map(|e| CartAction::SetError {
                error: Some(not_saved_message(&e)),
            })
        })
    }
}

impl Reducer for CartReducer {
    type State = CartState;
    type Action = CartAction;
    type Environment = CartEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let persist = action.changes_items();

        match action {
            // ========== Item changes (persisted) ==========
            CartAction::AddItem { product, quantity } => {
                Self::add_item(state, product, quantity);
            },
            CartAction::UpdateQuantity { product_id, quantity } => {
                Self::update_quantity(state, product_id, quantity);
            },
            CartAction::RemoveItem { product_id } => {
                Self::remove_item(state, product_id);
            },
            CartAction::ClearCart => {
                state.items.clear();
            },

            // ========== Hydration and status ==========
            CartAction::LoadFromStorage { items } => {
                state.items = normalize(items);
                state.loading = false;
                state.error = None;
                tracing::debug!(items = state.items.len(), "Cart loaded from storage");
            },
            CartAction::SetLoading { loading } => {
                state.loading = loading;
            },
            CartAction::SetError { error } => {
                state.error = error;
                state.loading = false;
            },
        }

        if !persist {
            return SmallVec::new();
        }
        state.error = None;
        smallvec![Self::persist_effect(state, env)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::persistence::{decode, DEFAULT_CART_KEY};
    use gestpharma_testing::{assertions, test_clock, InMemoryStorage, ReducerTest};
    use std::sync::Arc;

    fn env_with(storage: &InMemoryStorage) -> CartEnvironment {
        CartEnvironment::new(CartPersistence::new(
            Arc::new(storage.clone()),
            DEFAULT_CART_KEY,
            Arc::new(test_clock()),
        ))
    }

    fn test_env() -> CartEnvironment {
        env_with(&InMemoryStorage::new())
    }

    fn aspirin() -> Product {
        Product::new(1, "Aspirina 500mg", Money::from_cents(2550), 100)
    }

    fn ibuprofen() -> Product {
        Product::new(2, "Ibuprofeno 400mg", Money::from_cents(3500), 50)
    }

    #[test]
    fn add_new_product_appends_line() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::new())
            .when_action(CartAction::add(aspirin(), 2))
            .then_state(|state| {
                assert_eq!(state.len(), 1);
                assert_eq!(state.items()[0].subtotal(), Money::from_cents(5100));
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_run_effect(effects);
            })
            .run();
    }

    #[test]
    fn adding_same_product_twice_merges() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::new())
            .when_action(CartAction::add(aspirin(), 2))
            .when_action(CartAction::add(aspirin(), 2))
            .then_state(|state| {
                assert_eq!(state.len(), 1);
                assert_eq!(state.quantity_of(ProductId::new(1)), 4);
                assert_eq!(state.items()[0].subtotal(), Money::from_cents(10_200));
            })
            .run();
    }

    #[test]
    fn add_refreshes_product_snapshot() {
        let mut repriced = aspirin();
        repriced.unit_price = Money::from_cents(3000);

        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::with_items(vec![CartItem::new(aspirin(), 1)]))
            .when_action(CartAction::add(repriced, 1))
            .then_state(|state| {
                assert_eq!(state.items()[0].product().unit_price, Money::from_cents(3000));
                assert_eq!(state.total(), Money::from_cents(6000));
            })
            .run();
    }

    #[test]
    fn add_keeps_insertion_order() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::new())
            .when_action(CartAction::add(aspirin(), 1))
            .when_action(CartAction::add(ibuprofen(), 1))
            .when_action(CartAction::add(aspirin(), 3))
            .then_state(|state| {
                let ids: Vec<_> = state.items().iter().map(CartItem::product_id).collect();
                assert_eq!(ids, vec![ProductId::new(1), ProductId::new(2)]);
            })
            .run();
    }

    #[test]
    fn non_positive_add_never_leaves_empty_lines() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::with_items(vec![CartItem::new(aspirin(), 2)]))
            .when_action(CartAction::add(ibuprofen(), 0))
            .when_action(CartAction::add(aspirin(), -2))
            .then_state(|state| {
                assert!(state.is_empty());
            })
            .run();
    }

    #[test]
    fn update_quantity_recomputes_subtotal() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::with_items(vec![CartItem::new(aspirin(), 2)]))
            .when_action(CartAction::UpdateQuantity {
                product_id: ProductId::new(1),
                quantity: 5,
            })
            .then_state(|state| {
                assert_eq!(state.total(), Money::from_cents(12_750));
                assert_eq!(state.item_count(), 5);
            })
            .run();
    }

    #[test]
    fn update_to_zero_or_negative_removes() {
        for quantity in [0, -5] {
            ReducerTest::new(CartReducer::new())
                .with_env(test_env())
                .given_state(CartState::with_items(vec![
                    CartItem::new(aspirin(), 2),
                    CartItem::new(ibuprofen(), 1),
                ]))
                .when_action(CartAction::UpdateQuantity {
                    product_id: ProductId::new(1),
                    quantity,
                })
                .then_state(|state| {
                    assert_eq!(
                        state,
                        &CartState::with_items(vec![CartItem::new(ibuprofen(), 1)])
                    );
                })
                .run();
        }
    }

    #[test]
    fn update_unknown_product_is_noop() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::with_items(vec![CartItem::new(aspirin(), 2)]))
            .when_action(CartAction::UpdateQuantity {
                product_id: ProductId::new(99),
                quantity: 3,
            })
            .then_state(|state| {
                assert_eq!(state, &CartState::with_items(vec![CartItem::new(aspirin(), 2)]));
            })
            .run();
    }

    #[test]
    fn remove_absent_product_is_idempotent() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::with_items(vec![CartItem::new(aspirin(), 2)]))
            .when_action(CartAction::RemoveItem {
                product_id: ProductId::new(2),
            })
            .when_action(CartAction::RemoveItem {
                product_id: ProductId::new(2),
            })
            .then_state(|state| {
                assert_eq!(state.len(), 1);
            })
            .run();
    }

    #[test]
    fn clear_empties_cart() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::with_items(vec![
                CartItem::new(aspirin(), 2),
                CartItem::new(ibuprofen(), 1),
            ]))
            .when_action(CartAction::ClearCart)
            .then_state(|state| {
                assert!(state.is_empty());
                assert_eq!(state.total(), Money::ZERO);
                assert_eq!(state.item_count(), 0);
            })
            .then_effects(|effects| {
                assertions::assert_has_run_effect(effects);
            })
            .run();
    }

    #[test]
    fn load_from_storage_replaces_items_without_persisting() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::with_items(vec![CartItem::new(ibuprofen(), 4)]))
            .when_action(CartAction::SetLoading { loading: true })
            .when_action(CartAction::LoadFromStorage {
                items: vec![CartItem::new(aspirin(), 1), CartItem::new(aspirin(), 2)],
            })
            .then_state(|state| {
                assert!(!state.loading());
                assert_eq!(state.len(), 1);
                assert_eq!(state.quantity_of(ProductId::new(1)), 3);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn set_error_is_cleared_by_next_change() {
        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::new())
            .when_action(CartAction::SetError {
                error: Some("disk full".to_string()),
            })
            .then_state(|state| {
                assert_eq!(state.error(), Some("disk full"));
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();

        ReducerTest::new(CartReducer::new())
            .with_env(test_env())
            .given_state(CartState::new())
            .when_action(CartAction::SetError {
                error: Some("disk full".to_string()),
            })
            .when_action(CartAction::add(aspirin(), 1))
            .then_state(|state| {
                assert_eq!(state.error(), None);
            })
            .run();
    }

    #[test]
    fn persist_effect_writes_items_at_reduction_time() {
        let storage = InMemoryStorage::new();
        let env = env_with(&storage);
        let mut state = CartState::new();

        let effects = CartReducer.reduce(&mut state, CartAction::add(aspirin(), 2), &env);
        // Later changes must not leak into the pending write
        let _ = CartReducer.reduce(&mut state, CartAction::ClearCart, &env);

        for effect in effects {
            if let Effect::Run(f) = effect {
                assert_eq!(f(), None);
            }
        }
        let stored = decode(&storage.raw(DEFAULT_CART_KEY).unwrap()).unwrap();
        assert_eq!(stored.items, vec![CartItem::new(aspirin(), 2)]);
    }

    #[test]
    fn failed_persist_feeds_back_set_error() {
        let storage = InMemoryStorage::new();
        storage.fail_writes(true);
        let env = env_with(&storage);
        let mut state = CartState::new();

        let mut effects = CartReducer.reduce(&mut state, CartAction::add(aspirin(), 2), &env);
        let Some(Effect::Run(f)) = effects.pop() else {
            panic!("expected a persist effect");
        };

        assert!(matches!(f(), Some(CartAction::SetError { error: Some(_) })));
        assert_eq!(state.len(), 1);
    }
}
