use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ProductId, StaffId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus, OrderType};
use crate::Money;

/// A placed order.
///
/// Orders are created once by the fulfillment transaction and afterwards only
/// change through [`Order::transition_to`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    /// Human-facing unique number, e.g. `ORD-241016-3FA4B2C1`.
    pub order_number: String,

    pub order_type: OrderType,
    pub status: OrderStatus,

    /// Staff member who took the order.
    pub staff_id: StaffId,

    pub customer_id: Option<CustomerId>,
    pub subtotal: Money,
    pub tax: Money,
    pub total_amount: Money,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Moves the order to `next`, maintaining the completion timestamp.
    ///
    /// Entering `completed` stamps `completed_at` only if it is not already
    /// set, so re-confirming a completed order keeps the original time. Any
    /// other target status clears it.
    ///
    /// Returns true if anything about the order changed.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }

        let before = (self.status, self.completed_at);
        self.status = next;
        if next == OrderStatus::Completed {
            if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
        } else {
            self.completed_at = None;
        }

        Ok(before != (self.status, self.completed_at))
    }

    /// Returns true if `total_amount == subtotal + tax`.
    pub fn totals_consistent(&self) -> bool {
        self.subtotal + self.tax == self.total_amount
    }
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,

    /// Units ordered, always at least 1.
    pub quantity: u32,

    /// Catalog price at the moment the order was placed.
    pub unit_price: Money,

    pub notes: Option<String>,
}
