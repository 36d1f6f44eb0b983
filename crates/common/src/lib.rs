//! Shared identifier types used across the POS fulfillment crates.

mod types;

pub use types::{
    CustomerId, IngredientId, LedgerEntryId, OrderId, ProductId, StaffId, SupplierId,
};
