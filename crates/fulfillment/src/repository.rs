//! Order persistence inside a fulfillment transaction.

use common::OrderId;
use domain::{Order, OrderItem};
use serde::Serialize;
use store::StoreTx;

use crate::error::Result;

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Reads and writes orders through the caller's transaction.
pub struct OrderRepository;

impl OrderRepository {
    /// Inserts an order row.
    ///
    /// Returns the raw store error so callers can react to
    /// `DuplicateOrderNumber` without the transaction being aborted.
    pub async fn insert<T: StoreTx>(tx: &mut T, order: &Order) -> store::Result<()> {
        tx.insert_order(order).await
    }

    /// Inserts the lines of an order.
    pub async fn insert_items<T: StoreTx>(tx: &mut T, items: &[OrderItem]) -> Result<()> {
        Ok(tx.insert_order_items(items).await?)
    }

    /// Loads an order with its lines.
    pub async fn load<T: StoreTx>(tx: &mut T, id: OrderId) -> Result<Option<OrderDetails>> {
        let Some(order) = tx.order(id).await? else {
            return Ok(None);
        };
        let items = tx.order_items(id).await?;
        Ok(Some(OrderDetails { order, items }))
    }

    /// Locks an order row for a status change.
    pub async fn lock<T: StoreTx>(tx: &mut T, id: OrderId) -> Result<Option<Order>> {
        Ok(tx.lock_order(id).await?)
    }

    /// Persists the status and completion time of a locked order.
    pub async fn save_status<T: StoreTx>(tx: &mut T, order: &Order) -> Result<()> {
        Ok(tx.update_order_status(order).await?)
    }
}
