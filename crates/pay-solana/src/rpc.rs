//! # Solana JSON-RPC Client
//!
//! The read-only call the checkout needs: `getSignatureStatuses`.

use crate::config::SolanaConfig;
use pay_core::{CommerceError, CommerceResult, TransactionStatus};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

const PROVIDER: &str = "solana";

/// Minimal Solana RPC client
#[derive(Debug, Clone)]
pub struct SolanaRpcClient {
    rpc_url: String,
    client: Client,
}

impl SolanaRpcClient {
    pub fn new(config: &SolanaConfig) -> CommerceResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                CommerceError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            client,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> CommerceResult<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Solana RPC error: method={}, status={}, body={}", method, status, body);
            return Err(CommerceError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let envelope: RpcResponse<T> = serde_json::from_str(&body).map_err(|e| {
            CommerceError::Serialization(format!("Failed to parse {} response: {}", method, e))
        })?;

        match (envelope.result, envelope.error) {
            (_, Some(rpc_error)) => {
                error!(method, code = rpc_error.code, "Solana RPC returned an error");
                Err(CommerceError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: format!("RPC {}: {}", rpc_error.code, rpc_error.message),
                })
            }
            (Some(result), None) => Ok(result),
            (None, None) => Err(CommerceError::Serialization(format!(
                "{} response had neither result nor error",
                method
            ))),
        }
    }

    /// Status of one signature, searching the full ledger history
    #[instrument(skip(self))]
    pub async fn signature_status(&self, signature: &str) -> CommerceResult<TransactionStatus> {
        let result: RpcContext<Vec<Option<RpcSignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;

        let status = match result.value.into_iter().next().flatten() {
            Some(found) => found.into_status(signature),
            None => TransactionStatus::unknown(signature),
        };

        debug!(
            confirmed = status.confirmed,
            finalized = status.finalized,
            "Fetched signature status"
        );
        Ok(status)
    }
}

// =============================================================================
// JSON-RPC Types
// =============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcSignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<String>,
}

impl RpcSignatureStatus {
    fn into_status(self, signature: &str) -> TransactionStatus {
        let commitment = self.confirmation_status.as_deref();
        TransactionStatus {
            signature: signature.to_string(),
            confirmed: matches!(commitment, Some("confirmed") | Some("finalized")),
            finalized: commitment == Some("finalized"),
            error: self.err.map(|e| e.to_string()),
        }
    }
}
