//! # Crypto Payment Records
//!
//! A `crypto_payments` row tracks one attempt to settle an order on-chain.
//!
//! ```text
//!   pending ──confirm (before expires_at)──▶ confirmed
//!      │
//!      └──read or confirm after expires_at──▶ expired
//! ```
//!
//! Expiry is lazy: nothing sweeps stale rows, they flip when next read.

use crate::crypto::CryptoCurrency;
use crate::order::Order;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a crypto payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptoPaymentStatus {
    /// Awaiting a transaction reference from the customer
    Pending,
    /// Transaction accepted, order marked paid
    Confirmed,
    /// Window closed before confirmation
    Expired,
}

impl CryptoPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoPaymentStatus::Pending => "pending",
            CryptoPaymentStatus::Confirmed => "confirmed",
            CryptoPaymentStatus::Expired => "expired",
        }
    }
}

impl Default for CryptoPaymentStatus {
    fn default() -> Self {
        CryptoPaymentStatus::Pending
    }
}

impl std::fmt::Display for CryptoPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which endpoint family a payment was opened through.
///
/// Both rails share the `crypto_payments` table; they differ in payment
/// window and in how records are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentRail {
    /// `/api/payments/crypto`: any supported coin
    Crypto,
    /// `/api/payments/solana`: SOL only
    Solana,
}

impl PaymentRail {
    /// How long the customer has to pay
    pub fn payment_window(&self) -> Duration {
        match self {
            PaymentRail::Crypto => Duration::minutes(30),
            PaymentRail::Solana => Duration::minutes(15),
        }
    }

    /// Label used in "... payment not found"
    pub fn label(&self) -> &'static str {
        match self {
            PaymentRail::Crypto => "Crypto",
            PaymentRail::Solana => "Solana",
        }
    }

    /// Whether a stored payment is visible through this rail
    pub fn accepts(&self, currency: CryptoCurrency) -> bool {
        match self {
            PaymentRail::Crypto => true,
            PaymentRail::Solana => currency == CryptoCurrency::SOL,
        }
    }
}

/// A crypto payment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoPayment {
    pub id: Uuid,

    pub order_id: Uuid,

    pub currency: CryptoCurrency,

    /// Amount due in `currency`
    pub amount: f64,

    /// Merchant receiving address
    pub address: String,

    #[serde(default)]
    pub status: CryptoPaymentStatus,

    pub expires_at: DateTime<Utc>,

    /// Customer-submitted transaction hash / signature
    #[serde(default)]
    pub transaction_hash: Option<String>,

    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl CryptoPayment {
    /// Open a pending payment for `order`, expiring after the rail's window
    pub fn open(
        order: &Order,
        currency: CryptoCurrency,
        amount: f64,
        address: impl Into<String>,
        rail: PaymentRail,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            currency,
            amount,
            address: address.into(),
            status: CryptoPaymentStatus::Pending,
            expires_at: now + rail.payment_window(),
            transaction_hash: None,
            confirmed_at: None,
            created_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == CryptoPaymentStatus::Pending
    }

    /// Strictly past the expiry instant
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Pending, but its window has closed
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.is_past_expiry(now)
    }

    /// Apply the confirmation transition
    pub fn confirm(&mut self, transaction_hash: impl Into<String>, now: DateTime<Utc>) {
        self.transaction_hash = Some(transaction_hash.into());
        self.status = CryptoPaymentStatus::Confirmed;
        self.confirmed_at = Some(now);
    }
}
