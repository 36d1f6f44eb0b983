//! Order placement, lookup and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ProductId};
use domain::{Capability, Money, OrderError, OrderStatus, OrderType, PlaceOrder, PlaceOrderItem};
use fulfillment::{FulfillmentError, OrderDetails};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::actor::authorize;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub order_type: String,
    pub payment_method: String,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub subtotal: Money,
    pub tax: Money,
    pub total_amount: Money,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub order_number: String,
}

#[derive(Serialize)]
pub struct StatusUpdatedResponse {
    pub success: bool,
    pub new_status: OrderStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PlaceOrderRequest {
    fn into_command(self, staff_id: common::StaffId) -> Result<PlaceOrder, FulfillmentError> {
        let order_type: OrderType = self.order_type.parse()?;
        let items = self
            .items
            .into_iter()
            .map(|item| {
                let quantity = u32::try_from(item.quantity)
                    .ok()
                    .filter(|q| *q > 0)
                    .ok_or(OrderError::InvalidQuantity {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    })?;
                Ok(PlaceOrderItem {
                    product_id: item.product_id,
                    quantity,
                    unit_price: item.price,
                    notes: item.notes.filter(|n| !n.trim().is_empty()),
                })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        Ok(PlaceOrder {
            order_type,
            staff_id,
            customer_id: self.customer_id,
            payment_method: self.payment_method,
            items,
            subtotal: self.subtotal,
            tax: self.tax,
            total_amount: self.total_amount,
        })
    }
}

// -- Handlers --

/// POST /orders: place an order and deduct its ingredients.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn place<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<Json<OrderPlacedResponse>, ApiError> {
    let actor = authorize(&headers, Capability::PlaceOrder)?;
    let Json(req) = payload?;

    let command = req.into_command(actor.staff_id)?;
    let confirmation = state.fulfillment.place_order(command).await?;

    Ok(Json(OrderPlacedResponse {
        success: true,
        order_id: confirmation.order_id,
        order_number: confirmation.order_number,
    }))
}

/// GET /orders/{id}: order with its items.
#[tracing::instrument(skip(state, headers, path))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<OrderDetails>, ApiError> {
    authorize(&headers, Capability::ViewOrder)?;
    let Path(id) = path?;
    let details = state.fulfillment.get_order(OrderId::new(id)).await?;
    Ok(Json(details))
}

/// POST /orders/{id}/status: move an order to another status.
#[tracing::instrument(skip(state, headers, path, payload))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusUpdatedResponse>, ApiError> {
    authorize(&headers, Capability::UpdateOrderStatus)?;
    let Path(id) = path?;
    let Json(req) = payload?;

    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid status.".to_string()))?;
    let order = state
        .status
        .update_status(OrderId::new(id), status)
        .await?;

    Ok(Json(StatusUpdatedResponse {
        success: true,
        new_status: order.status,
        completed_at: order.completed_at,
    }))
}
