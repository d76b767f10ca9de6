//! # Request Handlers
//!
//! Axum request handlers for the Dropics API, grouped by resource.

pub mod crypto;
pub mod newsletter;
pub mod products;
pub mod solana;
pub mod stripe;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pay_core::CommerceError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

// =============================================================================
// Error Responses
// =============================================================================

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Handler error; renders as `{"error", "code"}` with the mapped status
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub CommerceError);

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.status_code();
        if code >= 500 {
            error!(error = %self.0, retryable = self.0.is_retryable(), "Request failed");
        }
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::new(self.0.public_message(), code))).into_response()
    }
}

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "dropics-pay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Order not found", 404).with_details("order 42");
        assert_eq!(err.error, "Order not found");
        assert_eq!(err.code, 404);
        assert_eq!(err.details.as_deref(), Some("order 42"));
    }

    #[test]
    fn test_api_error_status() {
        let response = ApiError(CommerceError::PaymentExpired).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError(CommerceError::Forbidden).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ApiError(CommerceError::Storage("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
