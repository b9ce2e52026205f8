use serde::{Deserialize, Serialize};

/// Product — the catalog entry a cart line points at.
///
/// Only the fields the order subsystem reads; catalog CRUD lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    #[serde(rename = "vendor_id")]
    pub vendor_id: i64,
    pub name: String,
    pub sku: String,
    /// Current catalog price in minor units. Checkout uses the cart line's
    /// stored price instead, so mid-checkout catalog edits cannot reprice
    /// an order.
    pub price: i64,
    #[serde(rename = "stock_quantity")]
    pub stock_quantity: i32,
    /// When false the inventory ledger never touches this product's stock.
    #[serde(rename = "track_stock")]
    pub track_stock: bool,
}

/// ProductVariation — one sellable variant of a product (size, pack, ...).
///
/// Carries its own SKU and stock; the `track_stock` gate stays on the
/// parent product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductVariation {
    pub id: i64,
    #[serde(rename = "product_id")]
    pub product_id: i64,
    pub name: String,
    pub sku: String,
    pub price: i64,
    #[serde(rename = "stock_quantity")]
    pub stock_quantity: i32,
}
