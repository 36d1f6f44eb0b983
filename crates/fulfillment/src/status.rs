//! Order status changes.

use chrono::Utc;
use common::OrderId;
use domain::{Order, OrderStatus};
use store::{Store, StoreTx};

use crate::error::{FulfillmentError, Result};
use crate::repository::OrderRepository;

/// Moves orders through their status state machine.
#[derive(Clone)]
pub struct OrderStatusService<S: Store> {
    store: S,
}

impl<S: Store> OrderStatusService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Sets the status of an order, holding its row lock for the change.
    ///
    /// Moving an order to the status it already has succeeds without writing
    /// anything, which keeps the original `completed_at` of a completed order.
    /// Stock consumed by a cancelled order stays consumed.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, next: OrderStatus) -> Result<Order> {
        let mut tx = self.store.begin().await?;

        let mut order = OrderRepository::lock(&mut tx, order_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound(format!("Order {order_id} not found.")))?;
        let previous = order.status;

        let changed = order.transition_to(next, Utc::now())?;
        if changed {
            OrderRepository::save_status(&mut tx, &order).await?;
        }
        tx.commit().await?;

        if changed {
            metrics::counter!(
                "order_status_transitions_total",
                "from" => previous.as_str(),
                "to" => next.as_str()
            )
            .increment(1);
            tracing::info!(from = %previous, to = %next, "order status changed");
        }
        Ok(order)
    }
}
