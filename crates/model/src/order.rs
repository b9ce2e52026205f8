use crate::status::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// PaymentMethod — how the customer intends to pay.
///
/// Recorded at checkout; settlement itself is out of scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    Razorpay,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Razorpay => "razorpay",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentMethod::Stripe),
            "paypal" => Ok(PaymentMethod::Paypal),
            "razorpay" => Ok(PaymentMethod::Razorpay),
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PaymentStatus — recorded state of the payment, updated externally.
///
/// Every order starts `pending`, cash-on-delivery included.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// OrderItem — an immutable snapshot of one purchased cart line.
///
/// Name, SKU, and price are denormalized at checkout so later catalog edits
/// cannot rewrite historical orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub id: i64,
    #[serde(rename = "order_id")]
    pub order_id: i64,
    #[serde(rename = "product_id")]
    pub product_id: i64,
    #[serde(rename = "variation_id")]
    pub variation_id: Option<i64>,
    #[serde(rename = "product_name")]
    pub product_name: String,
    #[serde(rename = "product_sku")]
    pub product_sku: String,
    pub quantity: i32,
    #[serde(rename = "unit_price")]
    pub unit_price: i64,
    #[serde(rename = "total_price")]
    pub total_price: i64,
}

/// Order — one vendor's fulfillment of a portion of a customer's checkout.
///
/// A multi-vendor cart yields one order per vendor, all created in the same
/// checkout transaction but with independent lifecycles thereafter. Orders
/// are never deleted; cancellation is a status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    #[serde(rename = "order_number")]
    pub order_number: String,
    #[serde(rename = "customer_id")]
    pub customer_id: i64,
    #[serde(rename = "vendor_id")]
    pub vendor_id: i64,
    #[serde(rename = "address_id")]
    pub address_id: i64,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub tax: i64,
    #[serde(rename = "delivery_fee")]
    pub delivery_fee: i64,
    pub discount: i64,
    pub total: i64,
    #[serde(rename = "payment_method")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "payment_status")]
    pub payment_status: PaymentStatus,
    #[serde(rename = "delivery_boy_id")]
    pub delivery_boy_id: Option<i64>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updated_at")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Legacy cancellation gate: anything not yet delivered and not already
    /// cancelled may still be cancelled.
    pub fn can_be_cancelled(&self) -> bool {
        !matches!(self.status, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Checks the monetary invariants: `total = subtotal + tax + fee -
    /// discount` and `subtotal = Σ items.total_price` (when items are
    /// loaded).
    pub fn totals_consistent(&self) -> bool {
        let total_ok = self.total == self.subtotal + self.tax + self.delivery_fee - self.discount;
        if self.items.is_empty() {
            return total_ok;
        }
        total_ok && self.subtotal == self.items.iter().map(|i| i.total_price).sum::<i64>()
    }
}

/// NewOrder — an order as produced by the splitter, before persistence
/// assigns an id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_id: i64,
    pub vendor_id: i64,
    pub address_id: i64,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub tax: i64,
    pub delivery_fee: i64,
    pub discount: i64,
    pub total: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// NewOrderItem — an order item snapshot awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub variation_id: Option<i64>,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
    /// Whether checkout must decrement stock for this line.
    pub track_stock: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_order() -> Order {
        Order {
            id: 1,
            order_number: "ORD-20260401120000-000042".into(),
            customer_id: 7,
            vendor_id: 3,
            address_id: 5,
            status: OrderStatus::Pending,
            subtotal: 2000,
            tax: 200,
            delivery_fee: 500,
            discount: 0,
            total: 2700,
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            delivery_boy_id: None,
            notes: None,
            items: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_totals_invariant() {
        let mut order = base_order();
        assert!(order.totals_consistent());
        order.total += 1;
        assert!(!order.totals_consistent());
    }

    #[test]
    fn test_subtotal_must_match_items() {
        let mut order = base_order();
        order.items.push(OrderItem {
            id: 1,
            order_id: 1,
            product_id: 10,
            variation_id: None,
            product_name: "Basmati Rice".into(),
            product_sku: "RICE-01".into(),
            quantity: 2,
            unit_price: 1000,
            total_price: 2000,
        });
        assert!(order.totals_consistent());
        order.items[0].total_price = 1999;
        assert!(!order.totals_consistent());
    }

    #[test]
    fn test_cancellation_gate() {
        let mut order = base_order();
        for (status, expected) in [
            (OrderStatus::Pending, true),
            (OrderStatus::Processing, true),
            (OrderStatus::OnTheWay, true),
            (OrderStatus::Delivered, false),
            (OrderStatus::Cancelled, false),
        ] {
            order.status = status;
            assert_eq!(order.can_be_cancelled(), expected, "status {status:?}");
        }
    }

    #[test]
    fn test_order_serializes_with_snake_case_enums() {
        let order = base_order();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["payment_method"], "cash_on_delivery");
        assert_eq!(json["payment_status"], "pending");
    }
}
