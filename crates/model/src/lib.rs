//! Domain types for the marketplace order subsystem.
//!
//! All monetary values are integer minor units (cents). Entities here are
//! plain data plus pure domain logic; persistence lives in the `repository`
//! crate and orchestration in the `service` crate.

mod actor;
mod cart;
mod catalog;
mod order;
pub mod status;

pub use actor::{Actor, Role};
pub use cart::{CartLine, ResolvedCartLine};
pub use catalog::{Product, ProductVariation};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, PaymentMethod, PaymentStatus};
pub use status::{OrderStatus, TransitionError};
