//! Cart splitting: one cart, one order per vendor.
//!
//! Pure logic, no I/O. The checkout orchestrator feeds it resolved cart
//! lines and persists whatever comes out inside its transaction.

use chrono::Utc;
use model::{NewOrder, NewOrderItem, OrderStatus, PaymentMethod, PaymentStatus, ResolvedCartLine};
use rand::Rng;
use std::collections::BTreeMap;

/// PricingPolicy — the injected monetary knobs of the splitter.
///
/// The legacy system hard-coded a 10% tax and a flat delivery fee; here
/// both arrive from configuration so tests and future business rules do
/// not have to patch constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Tax rate in basis points (1000 = 10%).
    pub tax_rate_bps: i64,
    /// Flat delivery fee per order, in minor units.
    pub delivery_fee: i64,
}

impl PricingPolicy {
    /// Tax on a subtotal, rounded half-up on integer cents.
    pub fn tax_on(&self, subtotal: i64) -> i64 {
        (subtotal * self.tax_rate_bps + 5_000) / 10_000
    }
}

/// Generates a human-referenceable, globally unique order number.
///
/// Timestamp plus a random suffix; a UNIQUE constraint on
/// `orders.order_number` backs up the randomness.
pub fn generate_order_number() -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("ORD-{stamp}-{suffix:06}")
}

/// Partitions the cart by vendor and materializes one [`NewOrder`] (with
/// its item snapshots) per vendor present.
///
/// Every order starts `pending`/`pending` regardless of payment method.
/// Item snapshots use the cart line's stored price, never the current
/// catalog price. A single-vendor cart flows through the same path and
/// yields exactly one order.
pub fn split_cart(
    lines: &[ResolvedCartLine],
    customer_id: i64,
    address_id: i64,
    payment_method: PaymentMethod,
    notes: Option<&str>,
    pricing: PricingPolicy,
) -> Vec<NewOrder> {
    // BTreeMap keeps the output deterministic for tests; callers must not
    // rely on vendor ordering.
    let mut by_vendor: BTreeMap<i64, Vec<&ResolvedCartLine>> = BTreeMap::new();
    for line in lines {
        by_vendor.entry(line.vendor_id()).or_default().push(line);
    }

    by_vendor
        .into_iter()
        .map(|(vendor_id, group)| {
            let items: Vec<NewOrderItem> = group
                .iter()
                .map(|line| NewOrderItem {
                    product_id: line.line.product_id,
                    variation_id: line.line.variation_id,
                    product_name: line.snapshot_name(),
                    product_sku: line.snapshot_sku().to_string(),
                    quantity: line.line.quantity,
                    unit_price: line.line.unit_price,
                    total_price: line.line.unit_price * i64::from(line.line.quantity),
                    track_stock: line.product.track_stock,
                })
                .collect();

            let subtotal: i64 = items.iter().map(|i| i.total_price).sum();
            let tax = pricing.tax_on(subtotal);
            let delivery_fee = pricing.delivery_fee;
            let discount = 0;

            NewOrder {
                order_number: generate_order_number(),
                customer_id,
                vendor_id,
                address_id,
                status: OrderStatus::Pending,
                subtotal,
                tax,
                delivery_fee,
                discount,
                total: subtotal + tax + delivery_fee - discount,
                payment_method,
                payment_status: PaymentStatus::Pending,
                notes: notes.map(str::to_owned),
                items,
            }
        })
        .collect()
}
