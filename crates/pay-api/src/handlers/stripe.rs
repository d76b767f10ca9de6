//! Card rail: `/api/payments/stripe` and its webhook

use super::ApiResult;
use crate::extract::{json_body, present, CurrentUser};
use crate::handlers::crypto::order_id;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use pay_core::{CommerceError, Order};
use pay_stripe::SIGNATURE_HEADER;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    /// Where the browser lands after 3-D Secure; confirmation happens client-side
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntentCreated {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncIntentRequest {
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    /// Client's view of the intent; the gateway's status is authoritative
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntentSynced {
    pub order: Order,
    pub payment_status: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookReceived {
    pub received: bool,
}

// ===== Handlers =====

/// Open a card payment intent for one of the caller's orders
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_intent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateIntentRequest>, JsonRejection>,
) -> ApiResult<Json<IntentCreated>> {
    let request = json_body(payload)?;
    let order_id_raw = present(request.order_id)
        .ok_or_else(|| CommerceError::InvalidRequest("Order ID is required".to_string()))?;

    let intent = state
        .card_payments()?
        .create_intent(&user, order_id(&order_id_raw)?)
        .await?;

    Ok(Json(IntentCreated {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
    }))
}

/// Sync an intent the browser confirmed and settle the order
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn sync_intent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<SyncIntentRequest>, JsonRejection>,
) -> ApiResult<Json<IntentSynced>> {
    let request = json_body(payload)?;

    let (Some(intent_id), Some(_)) = (present(request.payment_intent_id), present(request.status))
    else {
        return Err(CommerceError::InvalidRequest(
            "Payment intent ID and status are required".to_string(),
        )
        .into());
    };

    let synced = state
        .card_payments()?
        .sync_intent(&user, &intent_id)
        .await?;

    Ok(Json(IntentSynced {
        order: synced.order,
        payment_status: synced.intent_status,
    }))
}

/// Signed gateway callback; the raw body is what the signature covers
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookReceived>> {
    let cards = state.card_payments()?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook delivered without a signature header");
            CommerceError::WebhookVerificationFailed {
                reason: format!("Missing {} header", SIGNATURE_HEADER),
            }
        })?;

    cards.handle_webhook(&body, signature).await?;
    Ok(Json(WebhookReceived { received: true }))
}
