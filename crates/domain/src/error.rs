//! Domain error types.

use thiserror::Error;

use crate::access::{Capability, Role};
use crate::ledger::LedgerReason;

/// Errors raised by stock-ledger rules.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Unknown ledger reason.
    #[error("Invalid ledger reason: {0}")]
    InvalidReason(String),

    /// Reason reserved for system-written entries.
    #[error("Ledger reason {0} cannot be recorded manually")]
    ReasonNotManual(LedgerReason),

    /// Deductions and adjustments must move stock.
    #[error("Quantity change must be non-zero")]
    ZeroChange,

    /// Deduction amounts must be positive.
    #[error("Deduction amount must be positive, got {0}")]
    NonPositiveDeduction(rust_decimal::Decimal),
}

/// Errors raised by role checks.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Unknown role name.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Role lacks the capability.
    #[error("Role {role} is not allowed to {capability:?}")]
    Forbidden { role: Role, capability: Capability },
}
