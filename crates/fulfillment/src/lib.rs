//! Order fulfillment for the POS.
//!
//! Placing an order creates the order, its items, the ingredient decrements
//! and their ledger entries in one transaction:
//! 1. Check products, prices and totals against the catalog
//! 2. Resolve recipes into per-ingredient deductions
//! 3. Lock the touched ingredients in ascending id order
//! 4. Deduct and log each one, aborting everything on the first shortfall
//! 5. Write the order and its items
//!
//! Every component takes the store transaction explicitly.

pub mod catalog;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod order_number;
pub mod recipe;
pub mod repository;
pub mod service;
pub mod status;

pub use catalog::Catalog;
pub use error::{FulfillmentError, Result};
pub use inventory::InventoryService;
pub use ledger::{DeductionContext, Reconciliation, StockLedger};
pub use recipe::RecipeResolver;
pub use repository::{OrderDetails, OrderRepository};
pub use service::{FulfillmentConfig, OrderConfirmation, OrderFulfillmentService};
pub use status::OrderStatusService;

/// Registers help text for the series recorded by this crate.
///
/// Call once after installing a metrics recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "order_placement_attempts_total",
        "Calls to place_order, including rejected ones"
    );
    metrics::describe_counter!("orders_placed_total", "Orders committed");
    metrics::describe_counter!(
        "orders_rejected_total",
        "Orders rolled back, labelled by error kind"
    );
    metrics::describe_histogram!(
        "order_placement_duration_seconds",
        metrics::Unit::Seconds,
        "Wall time of one place_order call"
    );
    metrics::describe_counter!(
        "inventory_ledger_entries_total",
        "Ledger entries written, labelled by reason"
    );
    metrics::describe_counter!(
        "order_status_transitions_total",
        "Applied order status changes"
    );
}
