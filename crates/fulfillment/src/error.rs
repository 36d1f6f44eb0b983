//! Fulfillment error types.

use std::time::Duration;

use common::IngredientId;
use domain::{InventoryError, OrderError, OrderStatus};
use rust_decimal::Decimal;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while placing or updating orders and moving stock.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The request is malformed or disagrees with the catalog.
    #[error("{0}")]
    Validation(String),

    /// A referenced product, ingredient or order does not exist.
    #[error("{0}")]
    NotFound(String),

    /// An ingredient does not hold enough stock for the requested deduction.
    #[error("Insufficient stock for {ingredient}{}.", to_make(.product))]
    InsufficientStock {
        ingredient_id: IngredientId,
        ingredient: String,
        /// Product being made, when the deduction came from an order.
        product: Option<String>,
        required: Decimal,
        available: Decimal,
    },

    /// The order's current status does not allow the requested move.
    #[error("Order cannot move from {from} to {to}.")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Lock wait timeout, serialization failure or deadlock.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// The whole operation did not finish in time and was rolled back.
    #[error("Operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Anything the storage layer reports that is not a conflict.
    #[error("Persistence error: {0}")]
    Persistence(#[source] StoreError),
}

fn to_make(product: &Option<String>) -> String {
    match product {
        Some(name) => format!(" to make {name}"),
        None => String::new(),
    }
}

impl FulfillmentError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FulfillmentError::Conflict(_) | FulfillmentError::Timeout(_)
        )
    }

    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::Validation(_) => "validation",
            FulfillmentError::NotFound(_) => "not_found",
            FulfillmentError::InsufficientStock { .. } => "insufficient_stock",
            FulfillmentError::InvalidTransition { .. } => "invalid_transition",
            FulfillmentError::Conflict(_) => "conflict",
            FulfillmentError::Timeout(_) => "timeout",
            FulfillmentError::Persistence(_) => "persistence",
        }
    }

    /// Names the product an insufficient-stock error was raised for.
    pub fn for_product(self, name: &str) -> Self {
        match self {
            FulfillmentError::InsufficientStock {
                ingredient_id,
                ingredient,
                required,
                available,
                ..
            } => FulfillmentError::InsufficientStock {
                ingredient_id,
                ingredient,
                product: Some(name.to_string()),
                required,
                available,
            },
            other => other,
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => FulfillmentError::Conflict(msg),
            other => FulfillmentError::Persistence(other),
        }
    }
}

impl From<OrderError> for FulfillmentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStateTransition { from, to } => {
                FulfillmentError::InvalidTransition { from, to }
            }
            other => FulfillmentError::Validation(other.to_string()),
        }
    }
}

impl From<InventoryError> for FulfillmentError {
    fn from(err: InventoryError) -> Self {
        FulfillmentError::Validation(err.to_string())
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn shortfall() -> FulfillmentError {
        FulfillmentError::InsufficientStock {
            ingredient_id: IngredientId::new(1),
            ingredient: "Flour".to_string(),
            product: None,
            required: dec!(12),
            available: dec!(10),
        }
    }

    #[test]
    fn insufficient_stock_message_names_product_when_known() {
        assert_eq!(shortfall().to_string(), "Insufficient stock for Flour.");
        assert_eq!(
            shortfall().for_product("Pizza").to_string(),
            "Insufficient stock for Flour to make Pizza."
        );
    }

    #[test]
    fn only_conflict_and_timeout_are_retryable() {
        assert!(FulfillmentError::Conflict("lock".into()).is_retryable());
        assert!(FulfillmentError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!shortfall().is_retryable());
        assert!(!FulfillmentError::NotFound("x".into()).is_retryable());
        assert!(!FulfillmentError::Validation("x".into()).is_retryable());
    }

    #[test]
    fn store_conflict_stays_retryable() {
        let err: FulfillmentError = StoreError::Conflict("55P03".into()).into();
        assert!(matches!(err, FulfillmentError::Conflict(_)));

        let err: FulfillmentError = StoreError::Constraint("check".into()).into();
        assert!(matches!(err, FulfillmentError::Persistence(_)));
    }

    #[test]
    fn invalid_transition_keeps_statuses() {
        let err: FulfillmentError = OrderError::InvalidStateTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Pending,
        }
        .into();
        assert_eq!(err.to_string(), "Order cannot move from cancelled to pending.");
    }
}
