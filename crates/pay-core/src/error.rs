//! # Commerce Error Types
//!
//! Typed error handling for the dropics-pay backend.
//! All repository and service operations return `Result<T, CommerceError>`.
//!
//! Client-facing variants display the exact message returned in the
//! `{"error": ...}` body. Server-side variants carry detail for logs and are
//! collapsed by [`CommerceError::public_message`].

use thiserror::Error;

/// Core error type for all commerce operations
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data (message is returned verbatim)
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing or invalid credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated, but the resource belongs to someone else
    #[error("Unauthorized")]
    Forbidden,

    /// Order missing, or not owned by the caller
    #[error("Order not found")]
    OrderNotFound,

    /// Order payment is no longer pending
    #[error("Order payment already processed")]
    OrderAlreadyProcessed,

    /// Currency missing or outside the supported set
    #[error("Valid cryptocurrency currency is required")]
    UnsupportedCurrency { currency: String },

    /// Crypto payment record not found (`rail` is "Crypto" or "Solana")
    #[error("{rail} payment not found")]
    PaymentNotFound { rail: &'static str },

    /// Payment is no longer pending
    #[error("Payment already processed")]
    PaymentAlreadyProcessed,

    /// Payment passed its expiry before confirmation
    #[error("Payment has expired")]
    PaymentExpired,

    /// Transaction reference already settles a different payment
    #[error("Transaction already used for another payment")]
    TransactionAlreadyUsed,

    /// The submitted transaction did not verify
    #[error("Transaction verification failed")]
    VerificationFailed { reason: String },

    /// Product not found in catalog
    #[error("Product not found")]
    ProductNotFound { product_id: String },

    /// Newsletter email is already active
    #[error("Email already subscribed")]
    AlreadySubscribed,

    /// Unsubscribe token did not match
    #[error("Invalid unsubscribe token")]
    InvalidUnsubscribeToken,

    /// Card provider webhook failed signature verification
    #[error("Invalid signature")]
    WebhookVerificationFailed { reason: String },

    /// Optional payment provider is not configured on this deployment
    #[error("{0} payments are not available")]
    Unavailable(&'static str),

    /// Unique constraint rejected a write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Managed database rejected or failed a query
    #[error("Storage error: {0}")]
    Storage(String),

    /// Upstream provider API error (RPC node, email API, auth API)
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with a provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommerceError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CommerceError::NetworkError(_) | CommerceError::ProviderError { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CommerceError::InvalidRequest(_)
            | CommerceError::OrderAlreadyProcessed
            | CommerceError::UnsupportedCurrency { .. }
            | CommerceError::PaymentAlreadyProcessed
            | CommerceError::PaymentExpired
            | CommerceError::TransactionAlreadyUsed
            | CommerceError::VerificationFailed { .. }
            | CommerceError::WebhookVerificationFailed { .. }
            | CommerceError::AlreadySubscribed => 400,
            CommerceError::Unauthorized => 401,
            CommerceError::Forbidden | CommerceError::InvalidUnsubscribeToken => 403,
            CommerceError::OrderNotFound
            | CommerceError::PaymentNotFound { .. }
            | CommerceError::ProductNotFound { .. } => 404,
            CommerceError::Conflict(_) => 409,
            CommerceError::Unavailable(_) => 503,
            CommerceError::Configuration(_)
            | CommerceError::Storage(_)
            | CommerceError::ProviderError { .. }
            | CommerceError::NetworkError(_)
            | CommerceError::Serialization(_)
            | CommerceError::Internal(_) => 500,
        }
    }

    /// Message safe to return to the client.
    ///
    /// Server errors and conflicts never leak provider or query details.
    pub fn public_message(&self) -> String {
        if let CommerceError::Conflict(_) = self {
            return "Conflict".to_string();
        }
        if self.status_code() >= 500 && !matches!(self, CommerceError::Unavailable(_)) {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Result type alias for commerce operations
pub type CommerceResult<T> = Result<T, CommerceError>;
