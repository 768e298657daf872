//! Checkout request building.
//!
//! Turns the cart into the body the sales endpoint expects. Sending it is
//! the caller's job; once the sale is accepted the cart is cleared.

use crate::money::Money;
use crate::store::CartStore;
use crate::types::{CartItem, CartState, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Checkout errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutError {
    /// There is nothing to sell
    #[error("Cannot check out an empty cart")]
    EmptyCart,
}

/// One sale line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    /// Product sold
    #[serde(rename = "productoId")]
    pub product_id: ProductId,
    /// Units sold
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    /// Price per unit at the time of sale
    #[serde(rename = "precioUnitario")]
    pub unit_price: Money,
}

impl From<&CartItem> for SaleLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id(),
            quantity: item.quantity(),
            unit_price: item.product().unit_price,
        }
    }
}

/// Body of a sale creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    /// Registered customer, if any
    #[serde(rename = "clienteId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    /// Lines in cart order
    #[serde(rename = "detalles")]
    pub lines: Vec<SaleLine>,
    /// Free-text notes
    #[serde(rename = "observaciones", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SaleRequest {
    /// Build a request from a cart state
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] if the cart has no lines.
    pub fn from_cart(state: &CartState) -> Result<Self, CheckoutError> {
        if state.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(Self {
            client_id: None,
            lines: state.items().iter().map(SaleLine::from).collect(),
            notes: None,
        })
    }

    /// Build a request from the store's current cart
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] if the cart has no lines.
    pub fn from_store(store: &CartStore) -> Result<Self, CheckoutError> {
        Self::from_cart(&store.snapshot())
    }

    /// Attach a customer
    #[must_use]
    pub const fn with_client(mut self, client_id: i64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Attach notes; blank notes are dropped
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = (!notes.trim().is_empty()).then_some(notes);
        self
    }

    /// Sum of `quantity × unit_price` over all lines
    #[must_use]
    pub fn total(&self) -> Money {
        self.lines.iter().map(|line| line.unit_price.times(line.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Product;

    fn cart() -> CartState {
        CartState::with_items(vec![
            CartItem::new(Product::new(1, "Aspirina 500mg", Money::from_cents(2550), 100), 5),
            CartItem::new(Product::new(2, "Ibuprofeno 400mg", Money::from_cents(3500), 50), 1),
        ])
    }

    #[test]
    fn mirrors_cart_lines_and_total() {
        let request = SaleRequest::from_cart(&cart()).unwrap();
        assert_eq!(request.lines.len(), 2);
        assert_eq!(
            request.lines[0],
            SaleLine {
                product_id: ProductId::new(1),
                quantity: 5,
                unit_price: Money::from_cents(2550),
            }
        );
        assert_eq!(request.total(), cart().total());
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert_eq!(SaleRequest::from_cart(&CartState::new()), Err(CheckoutError::EmptyCart));
    }

    #[test]
    fn serializes_with_api_field_names() {
        let request = SaleRequest::from_cart(&cart())
            .unwrap()
            .with_client(12)
            .with_notes("Entregar en mostrador");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["clienteId"], 12);
        assert_eq!(json["observaciones"], "Entregar en mostrador");
        assert_eq!(json["detalles"][0]["productoId"], 1);
        assert_eq!(json["detalles"][0]["cantidad"], 5);
        assert_eq!(json["detalles"][0]["precioUnitario"], 25.5);
    }

    #[test]
    fn optional_fields_are_omitted() {
        let request = SaleRequest::from_cart(&cart()).unwrap().with_notes("   ");
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("clienteId").is_none());
        assert!(json.get("observaciones").is_none());
    }
}
