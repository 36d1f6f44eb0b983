//! Domain layer for POS order fulfillment.
//!
//! This crate holds the plain data and rules of the fulfillment subsystem:
//! - Products, ingredients and recipe lines
//! - Inventory ledger entries and their reasons
//! - The order aggregate, its status state machine and totals
//! - Staff roles and the capability table

pub mod access;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod order;
pub mod value_objects;

pub use access::{Capability, Role};
pub use catalog::{Ingredient, NewIngredient, NewProduct, Product, RecipeLine};
pub use error::{AccessError, InventoryError};
pub use ledger::{LedgerEntry, LedgerReason, NewLedgerEntry};
pub use order::{
    Order, OrderError, OrderItem, OrderStatus, OrderTotals, OrderType, PlaceOrder, PlaceOrderItem,
};
pub use value_objects::Money;
