//! HTTP API server with observability for POS order fulfillment.
//!
//! Provides REST endpoints for order placement, order status changes and
//! stock inspection, with structured logging (tracing) and Prometheus metrics.

pub mod actor;
pub mod config;
pub mod demo;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use fulfillment::{FulfillmentConfig, InventoryService, OrderFulfillmentService, OrderStatusService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub fulfillment: OrderFulfillmentService<S>,
    pub status: OrderStatusService<S>,
    pub inventory: InventoryService<S>,
}

/// Creates the application state over a store.
pub fn create_state<S: Store>(store: S, config: FulfillmentConfig) -> Arc<AppState<S>> {
    Arc::new(AppState {
        fulfillment: OrderFulfillmentService::with_config(store.clone(), config),
        status: OrderStatusService::new(store.clone()),
        inventory: InventoryService::new(store),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", post(routes::orders::update_status::<S>))
        .route("/inventory/low-stock", get(routes::inventory::low_stock::<S>))
        .route("/inventory/{id}/ledger", get(routes::inventory::ledger::<S>))
        .route(
            "/inventory/{id}/reconciliation",
            get(routes::inventory::reconciliation::<S>),
        )
        .route(
            "/inventory/{id}/adjustments",
            post(routes::inventory::adjust::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}
