//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of a placed order.
///
/// Status transitions:
/// ```text
/// Pending ──► InProgress ──► Completed
///    │            │             │
///    └────────────┴─────────────┴──► Cancelled
/// ```
///
/// Pending, InProgress and Completed may move freely between each other (a
/// completed order can be reopened by kitchen staff). Cancelled is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    /// Order placed and stock deducted, not yet picked up by the kitchen.
    #[default]
    Pending,

    /// Order is being prepared.
    InProgress,

    /// Order has been served or handed over.
    Completed,

    /// Order was cancelled. Stock deductions are not reversed.
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Returns true if an order in this status may move to `next`.
    ///
    /// Re-entering the current status is always allowed and is a no-op for
    /// everything except the completion timestamp rules on [`Order`].
    ///
    /// [`Order`]: super::Order
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        !self.is_terminal() || next == *self
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in-progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = super::OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| super::OrderError::InvalidStatus(s.to_string()))
    }
}
