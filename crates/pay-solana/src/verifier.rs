//! # Solana Transaction Verifier
//!
//! `TransactionVerifier` for SOL backed by `getSignatureStatuses`.

use crate::config::SolanaConfig;
use crate::rpc::SolanaRpcClient;
use async_trait::async_trait;
use pay_core::{
    is_solana_signature, CommerceError, CommerceResult, CryptoCurrency, TransactionStatus,
    TransactionVerifier,
};
use tracing::{info, instrument};

/// Verifies SOL payments against a Solana RPC node
#[derive(Debug, Clone)]
pub struct SolanaRpcVerifier {
    rpc: SolanaRpcClient,
}

impl SolanaRpcVerifier {
    pub fn new(config: &SolanaConfig) -> CommerceResult<Self> {
        let rpc = SolanaRpcClient::new(config)?;
        info!(network = %config.network, rpc_url = %config.rpc_url, "Solana verifier ready");
        Ok(Self { rpc })
    }

    /// Create from environment variables
    pub fn from_env() -> CommerceResult<Self> {
        Self::new(&SolanaConfig::from_env()?)
    }

    pub fn rpc(&self) -> &SolanaRpcClient {
        &self.rpc
    }
}

#[async_trait]
impl TransactionVerifier for SolanaRpcVerifier {
    #[instrument(skip(self))]
    async fn transaction_status(
        &self,
        currency: CryptoCurrency,
        reference: &str,
    ) -> CommerceResult<TransactionStatus> {
        if currency != CryptoCurrency::SOL {
            return Err(CommerceError::Internal(format!(
                "solana verifier asked to check {}",
                currency
            )));
        }

        // Malformed signatures never reach the node
        if !is_solana_signature(reference) {
            return Ok(TransactionStatus {
                error: Some("malformed transaction signature".to_string()),
                ..TransactionStatus::unknown(reference)
            });
        }

        self.rpc.signature_status(reference).await
    }

    fn verifier_name(&self) -> &'static str {
        "solana-rpc"
    }

    fn supports(&self, currency: CryptoCurrency) -> bool {
        currency == CryptoCurrency::SOL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolanaNetwork;
    use pay_core::VerifierSelector;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SIG: &str =
        "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW";

    #[tokio::test]
    async fn test_confirmed_signature_verifies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "context": { "slot": 82 },
                    "value": [{
                        "slot": 72,
                        "confirmations": 3,
                        "err": null,
                        "confirmationStatus": "confirmed"
                    }]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = SolanaConfig::new(SolanaNetwork::Devnet, server.uri());
        let verifier = SolanaRpcVerifier::new(&config).unwrap();
        let status = verifier
            .transaction_status(CryptoCurrency::SOL, SIG)
            .await
            .unwrap();
        assert!(status.is_success());
        assert!(!status.finalized);
    }

    #[tokio::test]
    async fn test_malformed_signature_skips_rpc() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let config = SolanaConfig::new(SolanaNetwork::Devnet, server.uri());
        let verifier = SolanaRpcVerifier::new(&config).unwrap();
        let status = verifier
            .transaction_status(CryptoCurrency::SOL, "0xnot-a-signature")
            .await
            .unwrap();
        assert!(!status.is_success());
        assert!(status.error.is_some());
    }

    #[test]
    fn test_routes_only_sol() {
        let verifier = SolanaRpcVerifier::new(&SolanaConfig::default()).unwrap();
        let selector = VerifierSelector::default().with_verifier(Arc::new(verifier));

        assert_eq!(selector.get(CryptoCurrency::SOL).verifier_name(), "solana-rpc");
        assert_eq!(selector.get(CryptoCurrency::ETH).verifier_name(), "trusting");
    }
}
