//! Generic crypto rail: `/api/payments/crypto`

use super::ApiResult;
use crate::extract::{json_body, present, query_params, CurrentUser};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use pay_core::{
    CommerceError, CryptoCurrency, CryptoPayment, CryptoPaymentStatus, Order, PaymentRail,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
pub struct CreateCryptoPaymentRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CryptoPaymentCreated {
    pub payment_id: Uuid,
    pub currency: CryptoCurrency,
    pub amount: f64,
    pub address: String,
    pub qr_code_data: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmCryptoPaymentRequest {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentConfirmed {
    pub payment_status: CryptoPaymentStatus,
    pub order: Order,
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusQuery {
    #[serde(default)]
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub payment_id: Uuid,
    pub status: CryptoPaymentStatus,
    pub currency: CryptoCurrency,
    pub amount: f64,
    pub address: String,
    pub transaction_hash: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl From<CryptoPayment> for PaymentStatusResponse {
    fn from(payment: CryptoPayment) -> Self {
        Self {
            payment_id: payment.id,
            status: payment.status,
            currency: payment.currency,
            amount: payment.amount,
            address: payment.address,
            transaction_hash: payment.transaction_hash,
            expires_at: payment.expires_at,
            confirmed_at: payment.confirmed_at,
        }
    }
}

/// Payment ids that are not UUIDs cannot exist
pub(crate) fn payment_id(raw: &str, rail: PaymentRail) -> Result<Uuid, CommerceError> {
    Uuid::parse_str(raw).map_err(|_| CommerceError::PaymentNotFound { rail: rail.label() })
}

pub(crate) fn order_id(raw: &str) -> Result<Uuid, CommerceError> {
    Uuid::parse_str(raw).map_err(|_| CommerceError::OrderNotFound)
}

// ===== Handlers =====

/// Open a pending payment for one of the caller's orders
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateCryptoPaymentRequest>, JsonRejection>,
) -> ApiResult<Json<CryptoPaymentCreated>> {
    let request = json_body(payload)?;

    let order_id_raw = present(request.order_id)
        .ok_or_else(|| CommerceError::InvalidRequest("Order ID is required".to_string()))?;
    let currency: CryptoCurrency = request.currency.as_deref().unwrap_or_default().parse()?;

    let quote = state
        .payments
        .open_crypto_payment(&user, order_id(&order_id_raw)?, currency)
        .await?;

    Ok(Json(CryptoPaymentCreated {
        payment_id: quote.payment.id,
        currency: quote.payment.currency,
        amount: quote.payment.amount,
        address: quote.payment.address,
        qr_code_data: quote.qr_code_data,
        expires_at: quote.payment.expires_at,
    }))
}

/// Accept a transaction hash and settle the order
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ConfirmCryptoPaymentRequest>, JsonRejection>,
) -> ApiResult<Json<PaymentConfirmed>> {
    let request = json_body(payload)?;

    let (Some(id), Some(hash)) = (present(request.payment_id), present(request.transaction_hash))
    else {
        return Err(CommerceError::InvalidRequest(
            "Payment ID and transaction hash are required".to_string(),
        )
        .into());
    };

    let confirmation = state
        .payments
        .confirm_payment(
            &user,
            payment_id(&id, PaymentRail::Crypto)?,
            &hash,
            PaymentRail::Crypto,
        )
        .await?;

    Ok(Json(PaymentConfirmed {
        payment_status: confirmation.payment.status,
        order: confirmation.order,
    }))
}

/// Current status of one payment
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn payment_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<PaymentStatusQuery>, QueryRejection>,
) -> ApiResult<Json<PaymentStatusResponse>> {
    let query = query_params(query)?;
    let id = present(query.payment_id)
        .ok_or_else(|| CommerceError::InvalidRequest("Payment ID is required".to_string()))?;

    let payment = state
        .payments
        .payment_status(&user, payment_id(&id, PaymentRail::Crypto)?)
        .await?;

    Ok(Json(payment.into()))
}
