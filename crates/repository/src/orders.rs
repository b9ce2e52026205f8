use crate::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, Transaction};

/// OrderScope — which slice of the orders table an actor may see.
///
/// Derived from the acting user's role by the service layer; the
/// repository only shapes the WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Orders placed by this customer.
    Customer(i64),
    /// Orders fulfilled by this vendor.
    Vendor(i64),
    /// Orders assigned to this delivery agent.
    DeliveryAgent(i64),
    /// Everything; admin only.
    All,
}

/// # OrdersRepository
///
/// Repository interface for order rows. Status updates and locking reads
/// are transactional so the service layer can serialize racing actors on
/// the same order.
#[async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Inserts the order row inside the checkout transaction and returns
    /// the generated id.
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        order: &NewOrder,
    ) -> Result<i64, RepositoryError>;

    /// Fetches one order row (items not loaded).
    async fn get_by_id(&self, order_id: i64) -> Result<Order, RepositoryError>;

    /// Fetches one order row under `FOR UPDATE`, blocking concurrent
    /// transitions on the same order until the transaction ends.
    async fn get_by_id_for_update_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
    ) -> Result<Order, RepositoryError>;

    /// Lists order rows visible in `scope`, optionally filtered by status,
    /// newest first.
    async fn list(
        &self,
        scope: OrderScope,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Applies a status change (and, when given, a delivery agent
    /// assignment) inside the caller's transaction.
    async fn update_status_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
        status: OrderStatus,
        delivery_boy_id: Option<i64>,
    ) -> Result<(), RepositoryError>;
}

/// # OrderItemsRepository
///
/// Repository interface for order item snapshots. Items are written once,
/// at checkout, and only ever read afterwards.
#[async_trait]
pub trait OrderItemsRepository: Send + Sync {
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError>;

    async fn get_by_order_id(&self, order_id: i64) -> Result<Vec<OrderItem>, RepositoryError>;

    /// Transactional read, used by cancellation to restock under the same
    /// transaction that flips the status.
    async fn get_by_order_id_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
    ) -> Result<Vec<OrderItem>, RepositoryError>;
}

const ORDER_COLUMNS: &str = "id, order_number, customer_id, vendor_id, address_id, status, \
     subtotal, tax, delivery_fee, discount, total, payment_method, payment_status, \
     delivery_boy_id, notes, created_at, updated_at";

fn order_from_row(row: &Row) -> Result<Order, RepositoryError> {
    let status: String = row.get("status");
    let payment_method: String = row.get("payment_method");
    let payment_status: String = row.get("payment_status");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Ok(Order {
        id: row.get("id"),
        order_number: row.get("order_number"),
        customer_id: row.get("customer_id"),
        vendor_id: row.get("vendor_id"),
        address_id: row.get("address_id"),
        status: status.parse().map_err(RepositoryError::Data)?,
        subtotal: row.get("subtotal"),
        tax: row.get("tax"),
        delivery_fee: row.get("delivery_fee"),
        discount: row.get("discount"),
        total: row.get("total"),
        payment_method: payment_method.parse().map_err(RepositoryError::Data)?,
        payment_status: payment_status.parse().map_err(RepositoryError::Data)?,
        delivery_boy_id: row.get("delivery_boy_id"),
        notes: row.get("notes"),
        items: Vec::new(), // filled in by the service layer
        created_at,
        updated_at,
    })
}

fn item_from_row(row: &Row) -> OrderItem {
    OrderItem {
        id: row.get("id"),
        order_id: row.get("order_id"),
        product_id: row.get("product_id"),
        variation_id: row.get("variation_id"),
        product_name: row.get("product_name"),
        product_sku: row.get("product_sku"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
        total_price: row.get("total_price"),
    }
}

/// PostgreSQL implementation of the [`OrdersRepository`] trait.
pub struct PgOrdersRepository {
    db: Client,
}

impl PgOrdersRepository {
    pub fn new(db: Client) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrdersRepository for PgOrdersRepository {
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        order: &NewOrder,
    ) -> Result<i64, RepositoryError> {
        let query = r#"
            INSERT INTO orders (
                order_number, customer_id, vendor_id, address_id, status,
                subtotal, tax, delivery_fee, discount, total,
                payment_method, payment_status, notes
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            RETURNING id
        "#;
        let row = tx
            .query_one(query, &[
                &order.order_number,
                &order.customer_id,
                &order.vendor_id,
                &order.address_id,
                &order.status.as_str(),
                &order.subtotal,
                &order.tax,
                &order.delivery_fee,
                &order.discount,
                &order.total,
                &order.payment_method.as_str(),
                &order.payment_status.as_str(),
                &order.notes,
            ])
            .await?;
        Ok(row.get(0))
    }

    async fn get_by_id(&self, order_id: i64) -> Result<Order, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = self.db.query_opt(&query, &[&order_id]).await?;
        match row {
            Some(row) => order_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn get_by_id_for_update_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
    ) -> Result<Order, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let row = tx.query_opt(&query, &[&order_id]).await?;
        match row {
            Some(row) => order_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list(
        &self,
        scope: OrderScope,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let scope_filter = match scope {
            OrderScope::Customer(id) => Some(("customer_id", id)),
            OrderScope::Vendor(id) => Some(("vendor_id", id)),
            OrderScope::DeliveryAgent(id) => Some(("delivery_boy_id", id)),
            OrderScope::All => None,
        };
        let status_filter = status.map(|s| s.as_str());

        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

        if let Some((column, id)) = &scope_filter {
            params.push(id);
            conditions.push(format!("{column} = ${}", params.len()));
        }
        if let Some(status) = &status_filter {
            params.push(status);
            conditions.push(format!("status = ${}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        params.push(&limit);
        let limit_idx = params.len();
        params.push(&offset);
        let offset_idx = params.len();

        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT ${limit_idx} OFFSET ${offset_idx}"
        );

        let rows = self.db.query(&query, &params).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn update_status_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
        status: OrderStatus,
        delivery_boy_id: Option<i64>,
    ) -> Result<(), RepositoryError> {
        let query = r#"
            UPDATE orders
            SET status = $2,
                delivery_boy_id = COALESCE($3, delivery_boy_id),
                updated_at = now()
            WHERE id = $1
        "#;
        let updated = tx
            .execute(query, &[&order_id, &status.as_str(), &delivery_boy_id])
            .await?;
        if updated == 1 {
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

/// PostgreSQL implementation of the [`OrderItemsRepository`] trait.
pub struct PgOrderItemsRepository {
    db: Client,
}

impl PgOrderItemsRepository {
    pub fn new(db: Client) -> Self {
        Self { db }
    }
}

const ITEM_INSERT: &str = r#"
    INSERT INTO order_items (
        order_id, product_id, variation_id, product_name, product_sku,
        quantity, unit_price, total_price
    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
"#;

const ITEM_SELECT: &str = r#"
    SELECT id, order_id, product_id, variation_id, product_name, product_sku,
           quantity, unit_price, total_price
    FROM order_items WHERE order_id = $1 ORDER BY id
"#;

#[async_trait]
impl OrderItemsRepository for PgOrderItemsRepository {
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError> {
        for item in items {
            tx.execute(ITEM_INSERT, &[
                &order_id,
                &item.product_id,
                &item.variation_id,
                &item.product_name,
                &item.product_sku,
                &item.quantity,
                &item.unit_price,
                &item.total_price,
            ])
            .await?;
        }
        Ok(())
    }

    async fn get_by_order_id(&self, order_id: i64) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = self.db.query(ITEM_SELECT, &[&order_id]).await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    async fn get_by_order_id_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = tx.query(ITEM_SELECT, &[&order_id]).await?;
        Ok(rows.iter().map(item_from_row).collect())
    }
}
