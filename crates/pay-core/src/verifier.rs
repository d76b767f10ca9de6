//! # Transaction Verifier Trait
//!
//! Strategy seam for checking a customer-submitted transaction reference
//! before a payment is confirmed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                TransactionVerifier (trait)                  │
//! │  ├── transaction_status()                                   │
//! │  ├── supports()                                             │
//! │  └── verifier_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!            ┌───────────────┴───────────────┐
//!    ┌───────┴────────┐             ┌────────┴─────────┐
//!    │TrustingVerifier│             │SolanaRpcVerifier │
//!    │ (no chain I/O) │             │  (pay-solana)    │
//!    └────────────────┘             └──────────────────┘
//! ```

use crate::crypto::CryptoCurrency;
use crate::error::CommerceResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// On-chain view of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub signature: String,
    /// Landed in a block at `confirmed` commitment or better
    pub confirmed: bool,
    /// Rooted (`finalized` commitment)
    pub finalized: bool,
    /// Execution error reported by the chain
    pub error: Option<String>,
}

impl TransactionStatus {
    /// Status for a transaction the node has never seen
    pub fn unknown(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            confirmed: false,
            finalized: false,
            error: None,
        }
    }

    /// Confirmed without an execution error
    pub fn is_success(&self) -> bool {
        self.confirmed && self.error.is_none()
    }
}

/// Checks a transaction reference against a chain.
#[async_trait]
pub trait TransactionVerifier: Send + Sync {
    /// Look up the status of `reference` (hash or signature) on `currency`'s chain
    async fn transaction_status(
        &self,
        currency: CryptoCurrency,
        reference: &str,
    ) -> CommerceResult<TransactionStatus>;

    /// Verifier name (for logging and registration)
    fn verifier_name(&self) -> &'static str;

    /// Currencies this verifier can check
    fn supports(&self, currency: CryptoCurrency) -> bool {
        let _ = currency;
        true
    }
}

/// Type alias for a shared verifier (dynamic dispatch)
pub type SharedVerifier = Arc<dyn TransactionVerifier>;

/// Accepts every reference as confirmed and finalized.
///
/// No chain is consulted, so confirmation trusts the client. Register a
/// chain-backed verifier for any currency where that is not acceptable.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustingVerifier;

#[async_trait]
impl TransactionVerifier for TrustingVerifier {
    async fn transaction_status(
        &self,
        _currency: CryptoCurrency,
        reference: &str,
    ) -> CommerceResult<TransactionStatus> {
        Ok(TransactionStatus {
            signature: reference.to_string(),
            confirmed: true,
            finalized: true,
            error: None,
        })
    }

    fn verifier_name(&self) -> &'static str {
        "trusting"
    }
}

/// Picks a verifier per currency, falling back to a default
#[derive(Clone)]
pub struct VerifierSelector {
    by_currency: HashMap<CryptoCurrency, SharedVerifier>,
    fallback: SharedVerifier,
}

impl VerifierSelector {
    /// Create a selector with a fallback verifier
    pub fn new(fallback: SharedVerifier) -> Self {
        Self {
            by_currency: HashMap::new(),
            fallback,
        }
    }

    /// Route every currency the verifier supports to it
    pub fn register(&mut self, verifier: SharedVerifier) {
        for currency in CryptoCurrency::ALL {
            if verifier.supports(currency) {
                self.by_currency.insert(currency, verifier.clone());
            }
        }
    }

    /// Register with builder pattern
    pub fn with_verifier(mut self, verifier: SharedVerifier) -> Self {
        self.register(verifier);
        self
    }

    /// Verifier responsible for `currency`
    pub fn get(&self, currency: CryptoCurrency) -> &SharedVerifier {
        self.by_currency.get(&currency).unwrap_or(&self.fallback)
    }

    /// Currencies that fall through to the fallback verifier
    pub fn unverified_currencies(&self) -> Vec<CryptoCurrency> {
        CryptoCurrency::ALL
            .into_iter()
            .filter(|c| !self.by_currency.contains_key(c))
            .collect()
    }

    /// `(currency, verifier name)` pairs for startup logging
    pub fn routes(&self) -> Vec<(CryptoCurrency, &'static str)> {
        CryptoCurrency::ALL
            .into_iter()
            .map(|c| (c, self.get(c).verifier_name()))
            .collect()
    }
}

impl Default for VerifierSelector {
    fn default() -> Self {
        Self::new(Arc::new(TrustingVerifier))
    }
}

impl std::fmt::Debug for VerifierSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierSelector")
            .field("routes", &self.routes())
            .finish()
    }
}
