//! Order aggregate and related types.

mod aggregate;
mod commands;
mod state;
mod totals;

pub use aggregate::{Order, OrderItem};
pub use commands::{OrderType, PlaceOrder, PlaceOrderItem};
pub use state::OrderStatus;
pub use totals::OrderTotals;

use common::ProductId;
use thiserror::Error;

use crate::Money;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity {quantity} for product {product_id} (must be at least 1)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// Invalid price.
    #[error("Invalid price {price} for product {product_id}")]
    InvalidPrice { product_id: ProductId, price: Money },

    /// Payment method is required.
    #[error("Payment method is required")]
    MissingPaymentMethod,

    /// Unknown order type.
    #[error("Invalid order type: {0}")]
    InvalidOrderType(String),

    /// Unknown order status.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Status change not allowed from the current status.
    #[error("Invalid state transition: cannot move order from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    /// Product exists but is switched off in the menu.
    #[error("Product {name} is not available")]
    ProductUnavailable { product_id: ProductId, name: String },

    /// Client price differs from the catalog price.
    #[error("Price for {name} is {catalog}, request says {supplied}")]
    PriceMismatch {
        product_id: ProductId,
        name: String,
        catalog: Money,
        supplied: Money,
    },

    /// Client totals differ from the server-side computation.
    #[error("{field} should be {expected}, request says {supplied}")]
    TotalsMismatch {
        field: &'static str,
        expected: Money,
        supplied: Money,
    },
}
