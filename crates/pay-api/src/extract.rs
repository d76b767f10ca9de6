//! # Request Extractors
//!
//! Bearer-token authentication for user and admin routes, plus JSON body
//! and query helpers that turn rejections into `{"error", "code"}` bodies.

use crate::handlers::ApiError;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use pay_core::{AuthUser, CommerceError};
use tracing::debug;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or(CommerceError::Unauthorized)?
            .to_string();

        let user = state.auth.authenticate(&token).await.map_err(|e| {
            debug!(
                error = %e,
                authenticator = state.auth.authenticator_name(),
                "Authentication failed"
            );
            e
        })?;
        Ok(CurrentUser(user))
    }
}

/// Caller presented the admin API token
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) if state.is_admin_token(token) => Ok(AdminAccess),
            _ => Err(CommerceError::Unauthorized.into()),
        }
    }
}

/// Unwrap a JSON body, mapping malformed input to a 400
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!(error = %rejection, "Rejected request body");
        CommerceError::InvalidRequest("Invalid request body".to_string()).into()
    })
}

/// Unwrap query parameters, mapping parse failures to "Invalid query parameters"
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query.map(|Query(params)| params).map_err(|rejection| {
        debug!(error = %rejection, "Rejected query string");
        CommerceError::InvalidRequest("Invalid query parameters".to_string()).into()
    })
}

/// Non-blank string field
pub fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
