//! # Data Repository Layer
//!
//! Repository traits and PostgreSQL implementations for the order
//! subsystem: orders, order items, cart lines, addresses, and the inventory
//! ledger. Each repository supports both regular and transactional
//! operations for integration with the service layer, which owns the
//! transaction boundary.

use thiserror::Error;

mod addresses;
mod cart;
mod inventory;
mod orders;

pub use addresses::{AddressesRepository, PgAddressesRepository};
pub use cart::{CartRepository, PgCartRepository};
pub use inventory::{InventoryRepository, PgInventoryRepository};
pub use orders::{
    OrderItemsRepository, OrderScope, OrdersRepository, PgOrderItemsRepository,
    PgOrdersRepository,
};

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error.
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// No result found.
    #[error("Not found")]
    NotFound,
    /// A tracked inventory unit cannot cover the requested quantity.
    #[error("Insufficient stock for product {product_id}{}", variation_suffix(*variation_id))]
    InsufficientStock {
        product_id: i64,
        variation_id: Option<i64>,
    },
    /// A stored value could not be mapped back into a domain type.
    #[error("Corrupt stored value: {0}")]
    Data(String),
}

fn variation_suffix(variation_id: Option<i64>) -> String {
    match variation_id {
        Some(id) => format!(" (variation {id})"),
        None => String::new(),
    }
}
