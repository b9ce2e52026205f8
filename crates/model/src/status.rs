//! Order status machine.
//!
//! The single source of truth for which (actor, from, to) transitions are
//! legal. Controllers and services call [`check_transition`] /
//! [`check_cancel`] instead of comparing status strings ad hoc.
//!
//! Happy path: `pending → processing → on_the_way → delivered`.
//! `cancelled` is reachable only through the cancellation operation, never
//! through a generic status update, so the stock-restoration compensation
//! can never be skipped. `delivered` and `cancelled` are terminal.

use crate::actor::{Actor, Role};
use crate::order::Order;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// OrderStatus — the lifecycle state of one vendor order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::OnTheWay,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "on_the_way" => Ok(OrderStatus::OnTheWay),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a transition or cancellation is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The actor has no authority over this order's status at all.
    #[error("actor is not allowed to modify this order")]
    Forbidden,
    /// The actor is authorized for the order but the edge is not theirs.
    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    /// The order is past the point where cancellation is possible.
    #[error("order can no longer be cancelled")]
    NotCancellable,
}

/// Validates a generic status transition for the given actor.
///
/// Authority is evaluated first: a vendor must own the order, a delivery
/// agent must be assigned to it, an admin may touch any order, and a
/// customer has no generic transition authority (cancellation is a separate
/// operation). Once authority is established, the edge itself is checked
/// against the role's row of the transition table.
pub fn check_transition(
    actor: &Actor,
    order: &Order,
    target: OrderStatus,
) -> Result<(), TransitionError> {
    let from = order.status;
    let invalid = || TransitionError::InvalidTransition { from, to: target };

    match actor.role {
        Role::Vendor => {
            if order.vendor_id != actor.id {
                return Err(TransitionError::Forbidden);
            }
            if from == OrderStatus::Pending && target == OrderStatus::Processing {
                Ok(())
            } else {
                Err(invalid())
            }
        }
        Role::DeliveryAgent => {
            if order.delivery_boy_id != Some(actor.id) {
                return Err(TransitionError::Forbidden);
            }
            if from == OrderStatus::OnTheWay && target == OrderStatus::Delivered {
                Ok(())
            } else {
                Err(invalid())
            }
        }
        Role::Admin => {
            // Terminal states are frozen for everyone, and `cancelled` is
            // only reachable via the cancellation operation.
            if from.is_terminal() || target == OrderStatus::Cancelled || target == from {
                Err(invalid())
            } else {
                Ok(())
            }
        }
        Role::Customer => Err(TransitionError::Forbidden),
    }
}

/// Validates a cancellation request for the given actor.
///
/// Only the order's customer or an admin may cancel, and only while
/// [`Order::can_be_cancelled`] holds.
pub fn check_cancel(actor: &Actor, order: &Order) -> Result<(), TransitionError> {
    let authorized =
        actor.is_admin() || (actor.role == Role::Customer && order.customer_id == actor.id);
    if !authorized {
        return Err(TransitionError::Forbidden);
    }
    if !order.can_be_cancelled() {
        return Err(TransitionError::NotCancellable);
    }
    Ok(())
}
