//! Inventory ledger entries.

use chrono::{DateTime, Utc};
use common::{IngredientId, LedgerEntryId, OrderId, StaffId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Why an ingredient's quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Consumed by a placed order.
    OrderUsage,
    /// Stock received from a supplier.
    Purchase,
    /// Spoiled or discarded stock.
    Waste,
    /// Manual count correction.
    Correction,
    /// Opening balance written when the ingredient is registered.
    InitialStock,
}

impl LedgerReason {
    pub const ALL: [LedgerReason; 5] = [
        LedgerReason::OrderUsage,
        LedgerReason::Purchase,
        LedgerReason::Waste,
        LedgerReason::Correction,
        LedgerReason::InitialStock,
    ];

    /// Returns the stored name of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::OrderUsage => "order_usage",
            LedgerReason::Purchase => "purchase",
            LedgerReason::Waste => "waste",
            LedgerReason::Correction => "correction",
            LedgerReason::InitialStock => "initial_stock",
        }
    }

    /// Returns true for reasons staff may record by hand.
    ///
    /// `order_usage` is only written by order placement and `initial_stock`
    /// only by ingredient registration.
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            LedgerReason::Purchase | LedgerReason::Waste | LedgerReason::Correction
        )
    }
}

impl std::fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LedgerReason {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedgerReason::ALL
            .into_iter()
            .find(|reason| reason.as_str() == s)
            .ok_or_else(|| InventoryError::InvalidReason(s.to_string()))
    }
}

/// An immutable, signed record of an ingredient quantity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub ingredient_id: IngredientId,

    /// Positive for additions, negative for deductions.
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity_change: Decimal,

    pub reason: LedgerReason,

    /// Staff member responsible for the change.
    pub user_id: StaffId,

    /// Order that consumed the stock, for `order_usage` entries.
    pub order_id: Option<OrderId>,

    pub timestamp: DateTime<Utc>,
}

/// A ledger entry before it is assigned an id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub ingredient_id: IngredientId,
    pub quantity_change: Decimal,
    pub reason: LedgerReason,
    pub user_id: StaffId,
    pub order_id: Option<OrderId>,
}
