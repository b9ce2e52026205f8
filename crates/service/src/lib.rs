//! Business logic layer for the marketplace order subsystem.
//!
//! This crate defines the [`OrderService`] trait and its async
//! implementation [`OrderServiceImpl`]. The service owns the transaction
//! boundary: checkout (cart → per-vendor orders, stock decrements, cart
//! clearing) commits or rolls back as one unit, and status transitions
//! re-read the order under a row lock before applying an edge.
//!
//! # Features
//! - Atomic multi-order checkout with inventory decrements and cart clearing.
//! - Role-scoped status transitions driven by the `model::status` machine.
//! - Cancellation with exactly-once stock restoration.
//! - Dependency injection of repositories for testability.
//! - Well-typed error handling via [`ServiceError`].

use async_trait::async_trait;
use deadpool_postgres::{Pool, PoolError};
use model::status::{check_cancel, check_transition};
use model::{Actor, Order, OrderStatus, PaymentMethod, ResolvedCartLine, Role, TransitionError};
use repository::{
    AddressesRepository, CartRepository, InventoryRepository, OrderItemsRepository, OrderScope,
    OrdersRepository, RepositoryError,
};
use thiserror::Error;
use tracing::{info, instrument};

pub mod split;

pub use split::PricingPolicy;

/// Hard cap on page size for order listings.
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 20;

/// The main error type for all operations in [`OrderService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The address does not exist or belongs to another customer.
    #[error("Invalid address")]
    InvalidAddress,
    /// The customer's cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,
    /// A tracked inventory unit cannot cover a cart line's quantity.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock {
        product_id: i64,
        variation_id: Option<i64>,
    },
    /// Authority or edge violation from the status machine.
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// The order does not exist or is not visible to the actor.
    #[error("Order not found")]
    NotFound,
    /// The checkout transaction failed after it began mutating state; the
    /// whole checkout was rolled back.
    #[error("Checkout failed: {0}")]
    CheckoutFailed(#[source] Box<ServiceError>),
    /// A repository (database) operation failed.
    #[error("Database error: {0}")]
    Db(RepositoryError),
    /// Failed to obtain a database connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    /// Some unexpected or unhandled error.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ServiceError::NotFound,
            RepositoryError::InsufficientStock {
                product_id,
                variation_id,
            } => ServiceError::InsufficientStock {
                product_id,
                variation_id,
            },
            other => ServiceError::Db(other),
        }
    }
}

/// Mid-transaction checkout failures roll the whole checkout back; stock
/// shortfalls surface as themselves, everything else as [`CheckoutFailed`]
/// with the cause attached.
///
/// [`CheckoutFailed`]: ServiceError::CheckoutFailed
fn checkout_failure(err: ServiceError) -> ServiceError {
    match err {
        stock @ ServiceError::InsufficientStock { .. } => stock,
        other => ServiceError::CheckoutFailed(Box::new(other)),
    }
}

/// The cart lines a checkout consumes are exactly the ones in the loaded
/// snapshot; lines added afterwards belong to the next checkout.
fn consumed_line_ids(lines: &[ResolvedCartLine]) -> Vec<i64> {
    lines.iter().map(|l| l.line.id).collect()
}

/// Trait describing the order subsystem's operations.
///
/// Every method takes the acting user explicitly; nothing reads ambient
/// session state.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Converts the customer's cart into one order per vendor, decrements
    /// tracked stock, and clears the consumed cart lines — atomically.
    ///
    /// # Errors
    /// [`ServiceError::InvalidAddress`] / [`ServiceError::EmptyCart`] before
    /// any mutation; [`ServiceError::InsufficientStock`] when a line can no
    /// longer be satisfied; [`ServiceError::CheckoutFailed`] for any other
    /// mid-transaction failure. In every error case nothing is persisted.
    async fn create_orders(
        &self,
        customer_id: i64,
        address_id: i64,
        payment_method: PaymentMethod,
        notes: Option<String>,
    ) -> Result<Vec<Order>, ServiceError>;

    /// Fetches one order, items included, if the actor may see it.
    async fn get_order(&self, actor: Actor, order_id: i64) -> Result<Order, ServiceError>;

    /// Lists orders visible to the actor, optionally filtered by status,
    /// newest first.
    async fn list_orders(
        &self,
        actor: Actor,
        status: Option<OrderStatus>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Order>, ServiceError>;

    /// Applies a role-gated status transition to the order.
    ///
    /// `delivery_boy_id` is honored only for an admin moving the order to
    /// `on_the_way`.
    async fn update_status(
        &self,
        actor: Actor,
        order_id: i64,
        target: OrderStatus,
        delivery_boy_id: Option<i64>,
    ) -> Result<Order, ServiceError>;

    /// Cancels the order and restores every item's quantity to stock.
    async fn cancel_order(&self, actor: Actor, order_id: i64) -> Result<Order, ServiceError>;
}

/// Async implementation of [`OrderService`] over injected repositories.
pub struct OrderServiceImpl<R1, R2, R3, R4, R5> {
    db_pool: Pool,
    orders_repo: R1,
    items_repo: R2,
    cart_repo: R3,
    addresses_repo: R4,
    inventory_repo: R5,
    pricing: PricingPolicy,
}

impl<R1, R2, R3, R4, R5> OrderServiceImpl<R1, R2, R3, R4, R5>
where
    R1: OrdersRepository,
    R2: OrderItemsRepository,
    R3: CartRepository,
    R4: AddressesRepository,
    R5: InventoryRepository,
{
    pub fn new(
        db_pool: Pool,
        orders_repo: R1,
        items_repo: R2,
        cart_repo: R3,
        addresses_repo: R4,
        inventory_repo: R5,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            db_pool,
            orders_repo,
            items_repo,
            cart_repo,
            addresses_repo,
            inventory_repo,
            pricing,
        }
    }

    /// Role-scoped visibility: customers see their own orders, vendors the
    /// orders they fulfill, delivery agents their assignments, admins all.
    fn visible_to(actor: &Actor, order: &Order) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Customer => order.customer_id == actor.id,
            Role::Vendor => order.vendor_id == actor.id,
            Role::DeliveryAgent => order.delivery_boy_id == Some(actor.id),
        }
    }

    fn scope_for(actor: &Actor) -> OrderScope {
        match actor.role {
            Role::Admin => OrderScope::All,
            Role::Customer => OrderScope::Customer(actor.id),
            Role::Vendor => OrderScope::Vendor(actor.id),
            Role::DeliveryAgent => OrderScope::DeliveryAgent(actor.id),
        }
    }

    async fn load_with_items(&self, order_id: i64) -> Result<Order, ServiceError> {
        let mut order = self.orders_repo.get_by_id(order_id).await?;
        order.items = self.items_repo.get_by_order_id(order_id).await?;
        Ok(order)
    }
}

#[async_trait]
impl<R1, R2, R3, R4, R5> OrderService for OrderServiceImpl<R1, R2, R3, R4, R5>
where
    R1: OrdersRepository,
    R2: OrderItemsRepository,
    R3: CartRepository,
    R4: AddressesRepository,
    R5: InventoryRepository,
{
    #[instrument(skip(self, notes))]
    async fn create_orders(
        &self,
        customer_id: i64,
        address_id: i64,
        payment_method: PaymentMethod,
        notes: Option<String>,
    ) -> Result<Vec<Order>, ServiceError> {
        // Validation happens before any mutation.
        if !self
            .addresses_repo
            .belongs_to_customer(address_id, customer_id)
            .await?
        {
            return Err(ServiceError::InvalidAddress);
        }

        let lines = self.cart_repo.load_for_customer(customer_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        let line_ids = consumed_line_ids(&lines);

        let drafts = split::split_cart(
            &lines,
            customer_id,
            address_id,
            payment_method,
            notes.as_deref(),
            self.pricing,
        );

        let mut client = self.db_pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;

        // From here on any failure rolls the whole checkout back.
        let mut order_ids = Vec::with_capacity(drafts.len());
        let result: Result<(), ServiceError> = async {
            for draft in &drafts {
                let order_id = self.orders_repo.insert_tx(&tx, draft).await?;
                self.items_repo.insert_tx(&tx, order_id, &draft.items).await?;

                for item in &draft.items {
                    if item.track_stock {
                        self.inventory_repo
                            .decrement_tx(&tx, item.product_id, item.variation_id, item.quantity)
                            .await?;
                    }
                }
                order_ids.push(order_id);
            }
            self.cart_repo
                .delete_lines_tx(&tx, customer_id, &line_ids)
                .await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            // Dropping the transaction rolls it back.
            return Err(checkout_failure(err));
        }

        tx.commit()
            .await
            .map_err(|e| checkout_failure(ServiceError::Unexpected(format!("Commit failed: {e}"))))?;

        info!(
            customer_id,
            orders = order_ids.len(),
            "checkout committed"
        );

        let mut orders = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            orders.push(self.load_with_items(order_id).await?);
        }
        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn get_order(&self, actor: Actor, order_id: i64) -> Result<Order, ServiceError> {
        let order = self.load_with_items(order_id).await?;
        if !Self::visible_to(&actor, &order) {
            // Invisible orders are indistinguishable from missing ones.
            return Err(ServiceError::NotFound);
        }
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn list_orders(
        &self,
        actor: Actor,
        status: Option<OrderStatus>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Order>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        let mut orders = self
            .orders_repo
            .list(Self::scope_for(&actor), status, limit, offset)
            .await?;
        for order in &mut orders {
            order.items = self.items_repo.get_by_order_id(order.id).await?;
        }
        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        actor: Actor,
        order_id: i64,
        target: OrderStatus,
        delivery_boy_id: Option<i64>,
    ) -> Result<Order, ServiceError> {
        // Fail fast on authority and edge violations before taking a
        // connection and a row lock.
        let current = self.orders_repo.get_by_id(order_id).await?;
        check_transition(&actor, &current, target)?;

        let mut client = self.db_pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;

        // Re-read under a row lock so racing actors serialize on the
        // current status; the edge is re-checked against the locked row.
        let order = self.orders_repo.get_by_id_for_update_tx(&tx, order_id).await?;
        check_transition(&actor, &order, target)?;

        // Only an admin dispatching the order may assign the agent.
        let assign = match (actor.role, target) {
            (Role::Admin, OrderStatus::OnTheWay) => delivery_boy_id,
            _ => None,
        };

        self.orders_repo
            .update_status_tx(&tx, order_id, target, assign)
            .await?;
        tx.commit()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Commit failed: {e}")))?;

        info!(order_id, from = %order.status, to = %target, "status updated");
        self.load_with_items(order_id).await
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, actor: Actor, order_id: i64) -> Result<Order, ServiceError> {
        // Fail fast before taking a connection and a row lock; nothing is
        // restocked unless this gate passes.
        let current = self.orders_repo.get_by_id(order_id).await?;
        check_cancel(&actor, &current)?;

        let mut client = self.db_pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;

        // The gate is re-checked against the locked row; a racing cancel
        // or delivery wins or loses here, exactly once.
        let order = self.orders_repo.get_by_id_for_update_tx(&tx, order_id).await?;
        check_cancel(&actor, &order)?;

        self.orders_repo
            .update_status_tx(&tx, order_id, OrderStatus::Cancelled, None)
            .await?;

        // Restore exactly what checkout decremented. The terminal-state
        // check above guarantees this runs once per order; the ledger
        // itself skips untracked products.
        let items = self.items_repo.get_by_order_id_tx(&tx, order_id).await?;
        for item in &items {
            self.inventory_repo
                .increment_tx(&tx, item.product_id, item.variation_id, item.quantity)
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Commit failed: {e}")))?;

        info!(order_id, items = items.len(), "order cancelled, stock restored");
        self.load_with_items(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use deadpool_postgres::{Manager, ManagerConfig, Pool};
    use model::{
        CartLine, NewOrder, NewOrderItem, OrderItem, PaymentStatus, Product, ResolvedCartLine,
    };
    use repository::RepositoryError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_postgres::{Config as PgConfig, NoTls, Transaction};

    const POLICY: PricingPolicy = PricingPolicy {
        tax_rate_bps: 1000,
        delivery_fee: 500,
    };

    /// A pool that is never connected. The tests below only exercise paths
    /// that return before a connection is taken; reaching the pool would
    /// fail the test with a connection error.
    fn unconnected_pool() -> Pool {
        let cfg: PgConfig = "host=127.0.0.1 port=5432 user=test dbname=test"
            .parse()
            .expect("static test DSN");
        let mgr = Manager::from_config(cfg, NoTls, ManagerConfig::default());
        Pool::builder(mgr).max_size(1).build().expect("pool build")
    }

    fn sample_order(id: i64, status: OrderStatus) -> Order {
        Order {
            id,
            order_number: format!("ORD-20260401120000-{id:06}"),
            customer_id: 7,
            vendor_id: 3,
            address_id: 5,
            status,
            subtotal: 2000,
            tax: 200,
            delivery_fee: 500,
            discount: 0,
            total: 2700,
            payment_method: PaymentMethod::Stripe,
            payment_status: PaymentStatus::Pending,
            delivery_boy_id: Some(11),
            notes: None,
            items: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap(),
        }
    }

    fn sample_line(id: i64) -> ResolvedCartLine {
        ResolvedCartLine {
            line: CartLine {
                id,
                customer_id: 7,
                product_id: 10,
                variation_id: None,
                quantity: 2,
                unit_price: 1000,
            },
            product: Product {
                id: 10,
                vendor_id: 3,
                name: "Basmati Rice".into(),
                sku: "RICE-01".into(),
                price: 1000,
                stock_quantity: 50,
                track_stock: true,
            },
            variation: None,
        }
    }

    struct StubOrders {
        orders: Vec<Order>,
        listed: Arc<Mutex<Option<(OrderScope, Option<OrderStatus>, i64, i64)>>>,
    }

    impl StubOrders {
        fn new(orders: Vec<Order>) -> Self {
            Self {
                orders,
                listed: Arc::new(Mutex::new(None)),
            }
        }
    }

    #[async_trait]
    impl OrdersRepository for StubOrders {
        async fn insert_tx(
            &self,
            _tx: &Transaction<'_>,
            _order: &NewOrder,
        ) -> Result<i64, RepositoryError> {
            unimplemented!("transactional path requires a live database")
        }

        async fn get_by_id(&self, order_id: i64) -> Result<Order, RepositoryError> {
            self.orders
                .iter()
                .find(|o| o.id == order_id)
                .cloned()
                .ok_or(RepositoryError::NotFound)
        }

        async fn get_by_id_for_update_tx(
            &self,
            _tx: &Transaction<'_>,
            _order_id: i64,
        ) -> Result<Order, RepositoryError> {
            unimplemented!("transactional path requires a live database")
        }

        async fn list(
            &self,
            scope: OrderScope,
            status: Option<OrderStatus>,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<Order>, RepositoryError> {
            *self.listed.lock().unwrap() = Some((scope, status, limit, offset));
            Ok(Vec::new())
        }

        async fn update_status_tx(
            &self,
            _tx: &Transaction<'_>,
            _order_id: i64,
            _status: OrderStatus,
            _delivery_boy_id: Option<i64>,
        ) -> Result<(), RepositoryError> {
            unimplemented!("transactional path requires a live database")
        }
    }

    struct StubItems {
        items: Vec<OrderItem>,
    }

    #[async_trait]
    impl OrderItemsRepository for StubItems {
        async fn insert_tx(
            &self,
            _tx: &Transaction<'_>,
            _order_id: i64,
            _items: &[NewOrderItem],
        ) -> Result<(), RepositoryError> {
            unimplemented!("transactional path requires a live database")
        }

        async fn get_by_order_id(&self, order_id: i64) -> Result<Vec<OrderItem>, RepositoryError> {
            Ok(self
                .items
                .iter()
                .filter(|i| i.order_id == order_id)
                .cloned()
                .collect())
        }

        async fn get_by_order_id_tx(
            &self,
            _tx: &Transaction<'_>,
            _order_id: i64,
        ) -> Result<Vec<OrderItem>, RepositoryError> {
            unimplemented!("transactional path requires a live database")
        }
    }

    struct StubCart {
        lines: Vec<ResolvedCartLine>,
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CartRepository for StubCart {
        async fn load_for_customer(
            &self,
            _customer_id: i64,
        ) -> Result<Vec<ResolvedCartLine>, RepositoryError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.lines.clone())
        }

        async fn delete_lines_tx(
            &self,
            _tx: &Transaction<'_>,
            _customer_id: i64,
            _line_ids: &[i64],
        ) -> Result<u64, RepositoryError> {
            unimplemented!("transactional path requires a live database")
        }
    }

    struct StubAddresses {
        owned: bool,
    }

    #[async_trait]
    impl AddressesRepository for StubAddresses {
        async fn belongs_to_customer(
            &self,
            _address_id: i64,
            _customer_id: i64,
        ) -> Result<bool, RepositoryError> {
            Ok(self.owned)
        }
    }

    /// Panics if checkout or cancellation ever touches the ledger in these
    /// tests; every covered path must reject before any stock mutation.
    struct StubInventory;

    #[async_trait]
    impl InventoryRepository for StubInventory {
        async fn decrement_tx(
            &self,
            _tx: &Transaction<'_>,
            _product_id: i64,
            _variation_id: Option<i64>,
            _qty: i32,
        ) -> Result<(), RepositoryError> {
            unimplemented!("no stock mutation expected in this test")
        }

        async fn increment_tx(
            &self,
            _tx: &Transaction<'_>,
            _product_id: i64,
            _variation_id: Option<i64>,
            _qty: i32,
        ) -> Result<(), RepositoryError> {
            unimplemented!("no stock mutation expected in this test")
        }
    }

    type StubService = OrderServiceImpl<StubOrders, StubItems, StubCart, StubAddresses, StubInventory>;

    fn service_with(
        orders: StubOrders,
        items: StubItems,
        cart: StubCart,
        addresses: StubAddresses,
    ) -> StubService {
        OrderServiceImpl::new(
            unconnected_pool(),
            orders,
            items,
            cart,
            addresses,
            StubInventory,
            POLICY,
        )
    }

    #[tokio::test]
    async fn test_checkout_rejects_foreign_address_before_reading_the_cart() {
        let loads = Arc::new(AtomicUsize::new(0));
        let service = service_with(
            StubOrders::new(Vec::new()),
            StubItems { items: Vec::new() },
            StubCart {
                lines: vec![sample_line(1)],
                loads: loads.clone(),
            },
            StubAddresses { owned: false },
        );

        let err = service
            .create_orders(7, 5, PaymentMethod::Stripe, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAddress));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_checkout_rejects_empty_cart_before_any_write() {
        let loads = Arc::new(AtomicUsize::new(0));
        let service = service_with(
            StubOrders::new(Vec::new()),
            StubItems { items: Vec::new() },
            StubCart {
                lines: Vec::new(),
                loads: loads.clone(),
            },
            StubAddresses { owned: true },
        );

        let err = service
            .create_orders(7, 5, PaymentMethod::Stripe, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmptyCart));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_checkout_consumes_only_the_loaded_snapshot() {
        // A line added after the snapshot was taken keeps its id out of the
        // delete set.
        let snapshot = vec![sample_line(1), sample_line(2)];
        assert_eq!(consumed_line_ids(&snapshot), vec![1, 2]);

        let mut later = snapshot.clone();
        later.push(sample_line(3));
        assert_eq!(consumed_line_ids(&snapshot), vec![1, 2]);
        assert_eq!(consumed_line_ids(&later), vec![1, 2, 3]);
    }

    #[test]
    fn test_stock_shortfall_fails_checkout_as_itself() {
        let err = checkout_failure(ServiceError::InsufficientStock {
            product_id: 10,
            variation_id: None,
        });
        assert!(matches!(err, ServiceError::InsufficientStock { product_id: 10, .. }));

        let err = checkout_failure(ServiceError::Db(RepositoryError::Data("bad row".into())));
        assert!(matches!(err, ServiceError::CheckoutFailed(_)));

        let err = checkout_failure(ServiceError::NotFound);
        assert!(matches!(err, ServiceError::CheckoutFailed(_)));
    }

    #[test]
    fn test_repository_errors_map_into_service_errors() {
        assert!(matches!(
            ServiceError::from(RepositoryError::NotFound),
            ServiceError::NotFound
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::InsufficientStock {
                product_id: 10,
                variation_id: Some(99),
            }),
            ServiceError::InsufficientStock {
                product_id: 10,
                variation_id: Some(99),
            }
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::Data("bad row".into())),
            ServiceError::Db(_)
        ));
    }

    #[tokio::test]
    async fn test_get_order_visibility_matrix() {
        let order = sample_order(1, OrderStatus::Pending);
        let item = OrderItem {
            id: 1,
            order_id: 1,
            product_id: 10,
            variation_id: None,
            product_name: "Basmati Rice".into(),
            product_sku: "RICE-01".into(),
            quantity: 2,
            unit_price: 1000,
            total_price: 2000,
        };
        let service = service_with(
            StubOrders::new(vec![order]),
            StubItems { items: vec![item] },
            StubCart {
                lines: Vec::new(),
                loads: Arc::new(AtomicUsize::new(0)),
            },
            StubAddresses { owned: true },
        );

        let can_see = [
            Actor::new(7, Role::Customer),
            Actor::new(3, Role::Vendor),
            Actor::new(11, Role::DeliveryAgent),
            Actor::new(1, Role::Admin),
        ];
        for actor in can_see {
            let order = service.get_order(actor, 1).await.unwrap();
            assert_eq!(order.items.len(), 1, "items loaded for {actor:?}");
        }

        let cannot_see = [
            Actor::new(8, Role::Customer),
            Actor::new(4, Role::Vendor),
            Actor::new(12, Role::DeliveryAgent),
        ];
        for actor in cannot_see {
            let err = service.get_order(actor, 1).await.unwrap_err();
            assert!(matches!(err, ServiceError::NotFound), "{actor:?}");
        }
    }

    #[tokio::test]
    async fn test_list_orders_scopes_by_role_and_clamps_paging() {
        let orders = StubOrders::new(Vec::new());
        let listed = orders.listed.clone();
        let service = service_with(
            orders,
            StubItems { items: Vec::new() },
            StubCart {
                lines: Vec::new(),
                loads: Arc::new(AtomicUsize::new(0)),
            },
            StubAddresses { owned: true },
        );

        let cases = [
            (Actor::new(7, Role::Customer), OrderScope::Customer(7)),
            (Actor::new(3, Role::Vendor), OrderScope::Vendor(3)),
            (Actor::new(11, Role::DeliveryAgent), OrderScope::DeliveryAgent(11)),
            (Actor::new(1, Role::Admin), OrderScope::All),
        ];
        for (actor, expected_scope) in cases {
            service.list_orders(actor, None, None, None).await.unwrap();
            let (scope, status, limit, offset) = listed.lock().unwrap().take().unwrap();
            assert_eq!(scope, expected_scope);
            assert_eq!(status, None);
            assert_eq!((limit, offset), (20, 0));
        }

        service
            .list_orders(
                Actor::new(1, Role::Admin),
                Some(OrderStatus::Pending),
                Some(1000),
                Some(-3),
            )
            .await
            .unwrap();
        let (_, status, limit, offset) = listed.lock().unwrap().take().unwrap();
        assert_eq!(status, Some(OrderStatus::Pending));
        assert_eq!((limit, offset), (100, 0));
    }

    #[tokio::test]
    async fn test_update_status_rejects_before_taking_a_lock() {
        let service = service_with(
            StubOrders::new(vec![sample_order(1, OrderStatus::Pending)]),
            StubItems { items: Vec::new() },
            StubCart {
                lines: Vec::new(),
                loads: Arc::new(AtomicUsize::new(0)),
            },
            StubAddresses { owned: true },
        );

        // Vendor who does not own the order.
        let err = service
            .update_status(Actor::new(4, Role::Vendor), 1, OrderStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Transition(TransitionError::Forbidden)
        ));

        // Owning vendor, but an edge that is not theirs.
        let err = service
            .update_status(Actor::new(3, Role::Vendor), 1, OrderStatus::OnTheWay, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Transition(TransitionError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_rejects_before_touching_stock() {
        let service = service_with(
            StubOrders::new(vec![
                sample_order(1, OrderStatus::Pending),
                sample_order(2, OrderStatus::Delivered),
            ]),
            StubItems { items: Vec::new() },
            StubCart {
                lines: Vec::new(),
                loads: Arc::new(AtomicUsize::new(0)),
            },
            StubAddresses { owned: true },
        );

        // A stranger cannot cancel; the ledger stub would panic if the
        // service restocked anything.
        let err = service
            .cancel_order(Actor::new(8, Role::Customer), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Transition(TransitionError::Forbidden)
        ));

        // The owner cannot cancel a delivered order.
        let err = service
            .cancel_order(Actor::new(7, Role::Customer), 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Transition(TransitionError::NotCancellable)
        ));

        // A missing order is just not found.
        let err = service
            .cancel_order(Actor::new(7, Role::Customer), 99)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }
}
