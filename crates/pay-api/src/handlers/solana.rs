//! Solana rail: `/api/payments/solana`

use super::crypto::{order_id, payment_id};
use super::ApiResult;
use crate::extract::{json_body, present, query_params, CurrentUser};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use pay_core::{CommerceError, CryptoPaymentStatus, Order, PaymentRail};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
pub struct CreateSolanaPaymentRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub payer_wallet: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SolanaPaymentCreated {
    pub payment_id: Uuid,
    pub amount_sol: f64,
    pub amount_lamports: u64,
    pub recipient_address: String,
    pub payer_address: String,
    pub expires_at: DateTime<Utc>,
    /// The wallet builds and signs the transfer itself
    pub transaction_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmSolanaPaymentRequest {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SolanaPaymentConfirmed {
    pub payment_status: CryptoPaymentStatus,
    pub transaction_signature: String,
    pub order: Order,
}

#[derive(Debug, Deserialize)]
pub struct SignatureQuery {
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignatureStatusResponse {
    pub signature: String,
    pub confirmed: bool,
    pub finalized: bool,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<CryptoPaymentStatus>,
}

// ===== Handlers =====

/// Open a pending SOL payment
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateSolanaPaymentRequest>, JsonRejection>,
) -> ApiResult<Json<SolanaPaymentCreated>> {
    let request = json_body(payload)?;

    let (Some(order), Some(payer)) = (present(request.order_id), present(request.payer_wallet))
    else {
        return Err(CommerceError::InvalidRequest(
            "Order ID and payer wallet are required".to_string(),
        )
        .into());
    };

    let quote = state
        .payments
        .open_solana_payment(&user, order_id(&order)?, &payer)
        .await?;

    Ok(Json(SolanaPaymentCreated {
        payment_id: quote.payment.id,
        amount_sol: quote.payment.amount,
        amount_lamports: quote.amount_lamports,
        recipient_address: quote.payment.address,
        payer_address: quote.payer_wallet,
        expires_at: quote.payment.expires_at,
        transaction_data: None,
    }))
}

/// Accept a transaction signature and settle the order
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ConfirmSolanaPaymentRequest>, JsonRejection>,
) -> ApiResult<Json<SolanaPaymentConfirmed>> {
    let request = json_body(payload)?;

    let (Some(id), Some(signature)) = (present(request.payment_id), present(request.signature))
    else {
        return Err(CommerceError::InvalidRequest(
            "Payment ID and transaction signature are required".to_string(),
        )
        .into());
    };

    let confirmation = state
        .payments
        .confirm_payment(
            &user,
            payment_id(&id, PaymentRail::Solana)?,
            &signature,
            PaymentRail::Solana,
        )
        .await?;

    Ok(Json(SolanaPaymentConfirmed {
        payment_status: confirmation.payment.status,
        transaction_signature: signature,
        order: confirmation.order,
    }))
}

/// On-chain status of a signature
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn signature_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<SignatureQuery>, QueryRejection>,
) -> ApiResult<Json<SignatureStatusResponse>> {
    let query = query_params(query)?;
    let signature = present(query.signature).ok_or_else(|| {
        CommerceError::InvalidRequest("Transaction signature is required".to_string())
    })?;

    let status = state.payments.signature_status(&user, &signature).await?;

    Ok(Json(SignatureStatusResponse {
        signature: status.chain.signature,
        confirmed: status.chain.confirmed,
        finalized: status.chain.finalized,
        error: status.chain.error,
        payment_id: status.payment.as_ref().map(|p| p.id),
        payment_status: status.payment.map(|p| p.status),
    }))
}
