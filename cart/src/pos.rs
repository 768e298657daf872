//! Point-of-sale guards.
//!
//! The reducer accepts any quantity. The sale screen is stricter: it only
//! adds sellable products and never lets a line exceed the stock the product
//! had when it was last added. These helpers apply those checks before
//! dispatching.
//!
//! The check and the dispatch are two steps, so two terminals sharing one
//! cart can still race past the stock limit by one unit each.

use crate::store::CartStore;
use crate::types::{Product, ProductId};
use gestpharma_runtime::StoreError;
use thiserror::Error;

/// Reasons a point-of-sale operation was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PosError {
    /// No more units available
    #[error("Product {product_id} is out of stock ({stock} available)")]
    OutOfStock {
        /// Product refused
        product_id: ProductId,
        /// Stock known for it
        stock: i64,
    },

    /// The product is not for sale
    #[error("Product {0} is inactive")]
    Inactive(ProductId),

    /// The product has no line in the cart
    #[error("Product {0} is not in the cart")]
    NotInCart(ProductId),

    /// The store refused the dispatch
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Add one unit of `product` if it is active and stock allows it
///
/// # Errors
///
/// Returns [`PosError::Inactive`] or [`PosError::OutOfStock`] without
/// changing the cart, or [`PosError::Store`] if the store is closed.
pub async fn add_to_cart(store: &CartStore, product: Product) -> Result<(), PosError> {
    if !product.active {
        return Err(PosError::Inactive(product.id));
    }
    if store.quantity_of(product.id) >= product.stock {
        tracing::debug!(product_id = %product.id, stock = product.stock, "Refusing add: out of stock");
        return Err(PosError::OutOfStock {
            product_id: product.id,
            stock: product.stock,
        });
    }
    store.add_one(product).await?;
    Ok(())
}

/// Add one unit to an existing line, up to the line's known stock
///
/// # Errors
///
/// Returns [`PosError::NotInCart`] or [`PosError::OutOfStock`] without
/// changing the cart, or [`PosError::Store`] if the store is closed.
pub async fn increment(store: &CartStore, product_id: ProductId) -> Result<(), PosError> {
    let (quantity, stock) = store
        .snapshot()
        .get(product_id)
        .map(|item| (item.quantity(), item.product().stock))
        .ok_or(PosError::NotInCart(product_id))?;

    if quantity >= stock {
        return Err(PosError::OutOfStock { product_id, stock });
    }
    store.update_quantity(product_id, quantity + 1).await?;
    Ok(())
}

/// Remove one unit from a line; the last unit removes the line
///
/// # Errors
///
/// Returns [`PosError::NotInCart`] without changing the cart, or
/// [`PosError::Store`] if the store is closed.
pub async fn decrement(store: &CartStore, product_id: ProductId) -> Result<(), PosError> {
    let quantity = store.quantity_of(product_id);
    if quantity == 0 {
        return Err(PosError::NotInCart(product_id));
    }
    store.update_quantity(product_id, quantity - 1).await?;
    Ok(())
}
