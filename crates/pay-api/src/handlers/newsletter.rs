//! Newsletter: `/api/newsletter`

use super::ApiResult;
use crate::extract::{json_body, query_params, AdminAccess};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use pay_core::{CommerceError, Pagination, SubscribeOutcome, Subscriber, SubscriberQuery};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsletterMessage {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeQuery {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListSubscribersQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub subscribed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriberList {
    pub subscribers: Vec<Subscriber>,
    pub pagination: Pagination,
}

/// Untrimmed: surrounding whitespace is a format error on subscribe
fn email_required(raw: Option<String>) -> Result<String, CommerceError> {
    raw.filter(|email| !email.is_empty())
        .ok_or_else(|| CommerceError::InvalidRequest("Email is required".to_string()))
}

/// Subscribe (201) or reactivate (200)
#[instrument(skip_all)]
pub async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<NewsletterMessage>)> {
    let request = json_body(payload)?;
    let email = email_required(request.email)?;

    let response = match state.newsletter.subscribe(&email).await? {
        SubscribeOutcome::Created(subscriber) => (
            StatusCode::CREATED,
            Json(NewsletterMessage {
                message: "Successfully subscribed to newsletter",
                id: Some(subscriber.id),
            }),
        ),
        SubscribeOutcome::Reactivated => (
            StatusCode::OK,
            Json(NewsletterMessage {
                message: "Successfully subscribed to newsletter",
                id: None,
            }),
        ),
    };
    Ok(response)
}

/// One-click unsubscribe
#[instrument(skip_all)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    query: Result<Query<UnsubscribeQuery>, QueryRejection>,
) -> ApiResult<Json<NewsletterMessage>> {
    let query = query_params(query)?;
    let email = email_required(query.email)?;

    state
        .newsletter
        .unsubscribe(&email, query.token.as_deref())
        .await?;

    Ok(Json(NewsletterMessage {
        message: "Successfully unsubscribed from newsletter",
        id: None,
    }))
}

/// Paginated subscriber listing (admin only)
#[instrument(skip_all)]
pub async fn list_subscribers(
    State(state): State<AppState>,
    _admin: AdminAccess,
    query: Result<Query<ListSubscribersQuery>, QueryRejection>,
) -> ApiResult<Json<SubscriberList>> {
    let params = query_params(query)?;
    let defaults = SubscriberQuery::default();
    let query = SubscriberQuery {
        subscribed: params.subscribed.map(|flag| flag == "true"),
        page: params.page.unwrap_or(defaults.page),
        limit: params.limit.unwrap_or(defaults.limit),
    };
    if query.page == 0 || query.limit == 0 {
        return Err(CommerceError::InvalidRequest("Invalid query parameters".to_string()).into());
    }

    let page = state.newsletter.list(query).await?;

    Ok(Json(SubscriberList {
        pagination: Pagination::new(query.page, query.limit, page.total),
        subscribers: page.items,
    }))
}
