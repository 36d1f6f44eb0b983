//! Stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use common::IngredientId;
use domain::{Capability, Ingredient, LedgerEntry, LedgerReason};
use fulfillment::{FulfillmentError, Reconciliation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::actor::authorize;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity_change: Decimal,
    pub reason: String,
}

#[derive(Serialize)]
pub struct AdjustmentResponse {
    pub success: bool,
    pub entry: LedgerEntry,
}

/// GET /inventory/low-stock
#[tracing::instrument(skip(state, headers))]
pub async fn low_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    authorize(&headers, Capability::ViewInventory)?;
    Ok(Json(state.inventory.low_stock().await?))
}

/// GET /inventory/{id}/ledger?limit=n: newest entries first.
#[tracing::instrument(skip(state, headers, path, query))]
pub async fn ledger<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    authorize(&headers, Capability::ViewInventory)?;
    let Path(id) = path?;
    let Query(query) = query?;
    let entries = state
        .inventory
        .history(IngredientId::new(id), query.limit)
        .await?;
    Ok(Json(entries))
}

/// GET /inventory/{id}/reconciliation
#[tracing::instrument(skip(state, headers, path))]
pub async fn reconciliation<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Reconciliation>, ApiError> {
    authorize(&headers, Capability::ViewInventory)?;
    let Path(id) = path?;
    Ok(Json(state.inventory.reconcile(IngredientId::new(id)).await?))
}

/// POST /inventory/{id}/adjustments: record a purchase, waste or correction.
#[tracing::instrument(skip(state, headers, path, payload))]
pub async fn adjust<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AdjustmentRequest>, JsonRejection>,
) -> Result<Json<AdjustmentResponse>, ApiError> {
    let actor = authorize(&headers, Capability::AdjustInventory)?;
    let Path(id) = path?;
    let Json(req) = payload?;

    let reason: LedgerReason = req
        .reason
        .parse()
        .map_err(FulfillmentError::from)?;
    let entry = state
        .inventory
        .adjust(IngredientId::new(id), req.quantity_change, reason, actor.staff_id)
        .await?;

    Ok(Json(AdjustmentResponse {
        success: true,
        entry,
    }))
}
