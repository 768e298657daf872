//! Domain types for the point-of-sale cart.
//!
//! A cart is an ordered list of lines, one per product, each holding the
//! product snapshot it was added with, a quantity, and a subtotal derived
//! from the two.

use crate::money::Money;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Backend identifier of a product
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    /// Wraps a backend product id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const fn default_active() -> bool {
    true
}

/// A product as served by the inventory API
///
/// Only `id`, `unit_price` and `stock` matter to the cart; the rest is
/// carried along for display. Field names on the wire are the API's.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Backend identifier
    pub id: ProductId,
    /// Display name
    #[serde(rename = "nombre")]
    pub name: String,
    /// Optional long description
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price of one unit
    #[serde(rename = "precio")]
    pub unit_price: Money,
    /// Units available in inventory
    #[serde(default)]
    pub stock: i64,
    /// Category the product belongs to
    #[serde(rename = "categoriaId", default)]
    pub category_id: i64,
    /// Barcode printed on the package
    #[serde(rename = "codigoBarras", default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Reorder threshold
    #[serde(rename = "stockMinimo", default, skip_serializing_if = "Option::is_none")]
    pub min_stock: Option<i64>,
    /// Whether the product can be sold
    #[serde(rename = "activo", default = "default_active")]
    pub active: bool,
    /// Other API fields (batch, expiry, timestamps, ...), kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Creates an active product with no category or optional details
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, unit_price: Money, stock: i64) -> Self {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            description: None,
            unit_price,
            stock,
            category_id: 0,
            barcode: None,
            min_stock: None,
            active: true,
            extra: Map::new(),
        }
    }
}

/// One cart line
///
/// The subtotal cannot be set directly: it is computed whenever the line is
/// built or its quantity changes, and recomputed when a line is read back
/// from storage (the stored subtotal is ignored).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredCartItem")]
pub struct CartItem {
    pub(crate) product: Product,
    pub(crate) quantity: i64,
    pub(crate) subtotal: Money,
}

/// Shape of a cart line on disk; `subtotal` is ignored on read
#[derive(Deserialize)]
struct StoredCartItem {
    product: Product,
    quantity: i64,
}

impl From<StoredCartItem> for CartItem {
    fn from(stored: StoredCartItem) -> Self {
        Self::new(stored.product, stored.quantity)
    }
}

impl CartItem {
    /// Creates a line for `quantity` units of `product`
    #[must_use]
    pub fn new(product: Product, quantity: i64) -> Self {
        let subtotal = product.unit_price.times(quantity);
        Self {
            product,
            quantity,
            subtotal,
        }
    }

    /// Product snapshot this line was last written with
    #[must_use]
    pub const fn product(&self) -> &Product {
        &self.product
    }

    /// Id of the product on this line
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product.id
    }

    /// Units on this line
    #[must_use]
    pub const fn quantity(&self) -> i64 {
        self.quantity
    }

    /// `quantity × unit price`
    #[must_use]
    pub const fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub(crate) fn set_quantity(&mut self, quantity: i64) {
        self.quantity = quantity;
        self.subtotal = self.product.unit_price.times(quantity);
    }

    pub(crate) fn replace_product(&mut self, product: Product) {
        self.product = product;
        self.subtotal = self.product.unit_price.times(self.quantity);
    }
}

/// State of the cart
///
/// Totals are never stored; they are folded from `items` on every read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartState {
    pub(crate) items: Vec<CartItem>,
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
}

impl CartState {
    /// Creates an empty cart
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cart from arbitrary lines
    ///
    /// Lines with quantity ≤ 0 are dropped and duplicate products are merged
    /// into the first occurrence.
    #[must_use]
    pub fn with_items(items: Vec<CartItem>) -> Self {
        Self {
            items: normalize(items),
            ..Self::default()
        }
    }

    /// Lines in first-insertion order
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Loading hint for the UI
    #[must_use]
    pub const fn loading(&self) -> bool {
        self.loading
    }

    /// Last error, if any (set when persistence fails)
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Sum of all subtotals
    #[must_use]
    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Sum of all quantities
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(CartItem::quantity).sum()
    }

    /// Whether the cart has no lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of lines (distinct products)
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Line for `product_id`, if present
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product.id == product_id)
    }

    /// Whether `product_id` has a line
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Units of `product_id` in the cart, 0 if absent
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> i64 {
        self.get(product_id).map_or(0, CartItem::quantity)
    }

    pub(crate) fn position(&self, product_id: ProductId) -> Option<usize> {
        self.items.iter().position(|item| item.product.id == product_id)
    }
}

/// Merge duplicate products into their first line and drop empty lines
pub(crate) fn normalize(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if let Some(existing) = merged.iter_mut().find(|m| m.product.id == item.product.id) {
            let quantity = existing.quantity.saturating_add(item.quantity);
            existing.set_quantity(quantity);
        } else {
            merged.push(item);
        }
    }
    merged.retain(|item| item.quantity > 0);
    merged
}

/// Actions for the cart
///
/// The first four come from the UI; `LoadFromStorage` is sent once at
/// start-up; `SetLoading` and `SetError` are status updates, the latter fed
/// back by a failed persistence effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartAction {
    /// Add `quantity` units of `product`, merging with an existing line
    AddItem {
        /// Product to add (its current price and stock)
        product: Product,
        /// Units to add; may be any integer
        quantity: i64,
    },

    /// Set the quantity of an existing line; ≤ 0 removes it
    UpdateQuantity {
        /// Line to change
        product_id: ProductId,
        /// New quantity
        quantity: i64,
    },

    /// Remove a line if present
    RemoveItem {
        /// Line to remove
        product_id: ProductId,
    },

    /// Remove every line
    ClearCart,

    /// Replace all lines with ones read from device storage
    LoadFromStorage {
        /// Hydrated lines
        items: Vec<CartItem>,
    },

    /// Set the loading hint
    SetLoading {
        /// New value
        loading: bool,
    },

    /// Record (or clear) the last error
    SetError {
        /// Error message
        error: Option<String>,
    },
}

impl CartAction {
    /// `AddItem` shorthand
    #[must_use]
    pub const fn add(product: Product, quantity: i64) -> Self {
        Self::AddItem { product, quantity }
    }

    /// Whether this action can change the item list and must be persisted
    #[must_use]
    pub const fn changes_items(&self) -> bool {
        matches!(
            self,
            Self::AddItem { .. } | Self::UpdateQuantity { .. } | Self::RemoveItem { .. } | Self::ClearCart
        )
    }
}
