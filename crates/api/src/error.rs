//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::AccessError;
use fulfillment::FulfillmentError;

const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred.";

/// API-level error type that maps to HTTP responses.
///
/// Every error body has the shape `{"success": false, "message": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed staff identity.
    Unauthorized(String),
    /// Role lacks the capability for the endpoint.
    Forbidden(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Error from the fulfillment layer.
    Fulfillment(FulfillmentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
        };

        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    match &err {
        FulfillmentError::Validation(_) | FulfillmentError::InsufficientStock { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        FulfillmentError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        FulfillmentError::InvalidTransition { .. } | FulfillmentError::Conflict(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        FulfillmentError::Timeout(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        FulfillmentError::Persistence(source) => {
            tracing::error!(error = %source, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
            )
        }
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::UnknownRole(_) => ApiError::Unauthorized(err.to_string()),
            AccessError::Forbidden { .. } => ApiError::Forbidden("Permission denied.".to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn status_of(err: FulfillmentError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            status_of(FulfillmentError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(FulfillmentError::NotFound("gone".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(FulfillmentError::Conflict("lock".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(FulfillmentError::Timeout(Duration::from_secs(5))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(FulfillmentError::Persistence(store::StoreError::Decode(
                "status".into()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
