use crate::RepositoryError;
use async_trait::async_trait;
use model::{CartLine, Product, ProductVariation, ResolvedCartLine};
use tokio_postgres::{Client, Row, Transaction};

/// # CartRepository
///
/// Checkout-facing view of the cart subsystem: load a customer's lines
/// resolved against the catalog, and clear them once the checkout
/// transaction has created the orders. Adding and updating lines is owned
/// by the cart subsystem, not this crate.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Loads every cart line for the customer, each joined to its product
    /// and (when selected) variation. Lines whose product has disappeared
    /// are not returned.
    async fn load_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<ResolvedCartLine>, RepositoryError>;

    /// Deletes exactly the given cart lines inside the checkout
    /// transaction, scoped to the customer. Lines added after the checkout
    /// snapshot was loaded are left alone. Returns the number of lines
    /// removed.
    async fn delete_lines_tx(
        &self,
        tx: &Transaction<'_>,
        customer_id: i64,
        line_ids: &[i64],
    ) -> Result<u64, RepositoryError>;
}

/// PostgreSQL implementation of the [`CartRepository`] trait.
pub struct PgCartRepository {
    db: Client,
}

impl PgCartRepository {
    pub fn new(db: Client) -> Self {
        Self { db }
    }
}

const RESOLVED_LINE_QUERY: &str = r#"
    SELECT c.id, c.customer_id, c.product_id, c.variation_id, c.quantity, c.unit_price,
           p.vendor_id, p.name AS product_name, p.sku AS product_sku,
           p.price AS product_price, p.stock_quantity AS product_stock, p.track_stock,
           v.name AS variation_name, v.sku AS variation_sku,
           v.price AS variation_price, v.stock_quantity AS variation_stock
    FROM cart_items c
    JOIN products p ON p.id = c.product_id
    LEFT JOIN product_variations v ON v.id = c.variation_id
    WHERE c.customer_id = $1
    ORDER BY c.id
"#;

fn resolved_line_from_row(row: &Row) -> ResolvedCartLine {
    let variation_id: Option<i64> = row.get("variation_id");
    let product_id: i64 = row.get("product_id");

    let variation = variation_id.map(|id| ProductVariation {
        id,
        product_id,
        name: row.get("variation_name"),
        sku: row.get("variation_sku"),
        price: row.get("variation_price"),
        stock_quantity: row.get("variation_stock"),
    });

    ResolvedCartLine {
        line: CartLine {
            id: row.get("id"),
            customer_id: row.get("customer_id"),
            product_id,
            variation_id,
            quantity: row.get("quantity"),
            unit_price: row.get("unit_price"),
        },
        product: Product {
            id: product_id,
            vendor_id: row.get("vendor_id"),
            name: row.get("product_name"),
            sku: row.get("product_sku"),
            price: row.get("product_price"),
            stock_quantity: row.get("product_stock"),
            track_stock: row.get("track_stock"),
        },
        variation,
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn load_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<ResolvedCartLine>, RepositoryError> {
        let rows = self.db.query(RESOLVED_LINE_QUERY, &[&customer_id]).await?;
        Ok(rows.iter().map(resolved_line_from_row).collect())
    }

    async fn delete_lines_tx(
        &self,
        tx: &Transaction<'_>,
        customer_id: i64,
        line_ids: &[i64],
    ) -> Result<u64, RepositoryError> {
        let deleted = tx
            .execute(
                "DELETE FROM cart_items WHERE customer_id = $1 AND id = ANY($2)",
                &[&customer_id, &line_ids],
            )
            .await?;
        Ok(deleted)
    }
}
