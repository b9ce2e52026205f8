use crate::RepositoryError;
use async_trait::async_trait;
use tokio_postgres::Transaction;

/// # InventoryRepository
///
/// The inventory ledger: atomic stock adjustments for a product or one of
/// its variations. Both operations are no-ops when the product's
/// `track_stock` flag is off, and both run inside the caller's transaction
/// so a failed checkout or cancellation leaves stock untouched.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Removes `qty` units from the product's (or variation's) stock.
    ///
    /// The decrement is a single guarded UPDATE: it only applies when the
    /// remaining stock covers `qty`, so concurrent checkouts cannot drive
    /// stock negative. A failed guard surfaces as
    /// [`RepositoryError::InsufficientStock`].
    async fn decrement_tx(
        &self,
        tx: &Transaction<'_>,
        product_id: i64,
        variation_id: Option<i64>,
        qty: i32,
    ) -> Result<(), RepositoryError>;

    /// Returns `qty` units to the product's (or variation's) stock.
    ///
    /// Used by cancellation compensation only; the status machine's
    /// terminal-state check guarantees it runs at most once per order.
    async fn increment_tx(
        &self,
        tx: &Transaction<'_>,
        product_id: i64,
        variation_id: Option<i64>,
        qty: i32,
    ) -> Result<(), RepositoryError>;
}

/// PostgreSQL implementation of the [`InventoryRepository`] trait.
///
/// Stateless: every operation runs on the transaction handed in by the
/// service layer.
pub struct PgInventoryRepository;

impl PgInventoryRepository {
    pub fn new() -> Self {
        Self
    }

    /// Distinguishes the three reasons a guarded stock UPDATE can touch
    /// zero rows: the unit does not exist, tracking is off (a legitimate
    /// no-op), or the stock cannot cover the quantity.
    async fn explain_no_update(
        tx: &Transaction<'_>,
        product_id: i64,
        variation_id: Option<i64>,
    ) -> Result<(), RepositoryError> {
        let track_stock: Option<bool> = match variation_id {
            Some(vid) => tx
                .query_opt(
                    r#"
                    SELECT p.track_stock
                    FROM product_variations v
                    JOIN products p ON p.id = v.product_id
                    WHERE v.id = $1 AND v.product_id = $2
                    "#,
                    &[&vid, &product_id],
                )
                .await?
                .map(|row| row.get(0)),
            None => tx
                .query_opt("SELECT track_stock FROM products WHERE id = $1", &[&product_id])
                .await?
                .map(|row| row.get(0)),
        };

        match track_stock {
            None => Err(RepositoryError::NotFound),
            Some(false) => Ok(()),
            Some(true) => Err(RepositoryError::InsufficientStock {
                product_id,
                variation_id,
            }),
        }
    }
}

impl Default for PgInventoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryRepository for PgInventoryRepository {
    async fn decrement_tx(
        &self,
        tx: &Transaction<'_>,
        product_id: i64,
        variation_id: Option<i64>,
        qty: i32,
    ) -> Result<(), RepositoryError> {
        let updated = match variation_id {
            Some(vid) => {
                tx.execute(
                    r#"
                    UPDATE product_variations v
                    SET stock_quantity = v.stock_quantity - $3
                    FROM products p
                    WHERE v.id = $1 AND v.product_id = $2 AND p.id = v.product_id
                      AND p.track_stock AND v.stock_quantity >= $3
                    "#,
                    &[&vid, &product_id, &qty],
                )
                .await?
            }
            None => {
                tx.execute(
                    r#"
                    UPDATE products
                    SET stock_quantity = stock_quantity - $2
                    WHERE id = $1 AND track_stock AND stock_quantity >= $2
                    "#,
                    &[&product_id, &qty],
                )
                .await?
            }
        };

        if updated == 1 {
            Ok(())
        } else {
            Self::explain_no_update(tx, product_id, variation_id).await
        }
    }

    async fn increment_tx(
        &self,
        tx: &Transaction<'_>,
        product_id: i64,
        variation_id: Option<i64>,
        qty: i32,
    ) -> Result<(), RepositoryError> {
        let updated = match variation_id {
            Some(vid) => {
                tx.execute(
                    r#"
                    UPDATE product_variations v
                    SET stock_quantity = v.stock_quantity + $3
                    FROM products p
                    WHERE v.id = $1 AND v.product_id = $2 AND p.id = v.product_id
                      AND p.track_stock
                    "#,
                    &[&vid, &product_id, &qty],
                )
                .await?
            }
            None => {
                tx.execute(
                    r#"
                    UPDATE products
                    SET stock_quantity = stock_quantity + $2
                    WHERE id = $1 AND track_stock
                    "#,
                    &[&product_id, &qty],
                )
                .await?
            }
        };

        if updated == 1 {
            Ok(())
        } else {
            // An increment has no stock guard; zero rows means the unit is
            // missing or untracked.
            match Self::explain_no_update(tx, product_id, variation_id).await {
                Err(RepositoryError::InsufficientStock { .. }) | Ok(()) => Ok(()),
                other => other,
            }
        }
    }
}
