//! # pay-core
//!
//! Core types, repositories and services for the Dropics payment backend.
//!
//! This crate provides:
//! - `CryptoCurrency`, `ExchangeRates` and `MerchantWallets` for quoting
//! - `CryptoPayment` and its lifecycle (`pending` → `confirmed` | `expired`)
//! - `CardGateway` trait and `CardPaymentService` for card checkout
//! - `Store` repository traits plus an `InMemoryStore`
//! - `TransactionVerifier` trait for chain-backed confirmation checks
//! - `Authenticator` and `Mailer` seams
//! - `PaymentService` and `NewsletterService` business flows
//! - `CommerceError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{CryptoCurrency, InMemoryStore, PaymentRail, PaymentService};
//!
//! let service = PaymentService::new(Arc::new(InMemoryStore::new()));
//!
//! // Quote an order in BTC
//! let quote = service.open_crypto_payment(&user, order_id, CryptoCurrency::BTC).await?;
//!
//! // Show quote.qr_code_data, then confirm once the customer has paid
//! let done = service
//!     .confirm_payment(&user, quote.payment.id, &tx_hash, PaymentRail::Crypto)
//!     .await?;
//! ```

pub mod auth;
pub mod card;
pub mod crypto;
pub mod error;
pub mod mailer;
pub mod memory;
pub mod newsletter;
pub mod order;
pub mod payment;
pub mod product;
pub mod service;
pub mod store;
pub mod verifier;
pub mod wallet;

// Re-exports for convenience
pub use auth::{
    constant_time_eq, AuthUser, Authenticator, SharedAuthenticator, StaticAuthenticator,
};
pub use card::{
    amount_in_cents, order_description, CardEvent, CardEventKind, CardGateway, CardPaymentService,
    IntentSync, PaymentIntent, SharedCardGateway,
};
pub use crypto::{sol_to_lamports, CryptoCurrency, ExchangeRates};
pub use error::{CommerceError, CommerceResult};
pub use mailer::{Email, LoggingMailer, Mailer, SharedMailer};
pub use memory::InMemoryStore;
pub use newsletter::{
    SubscribeOutcome, Subscriber, SubscriberEmail, SubscriberQuery, UnsubscribeSigner,
};
pub use order::{Order, OrderStatus, PaymentMethod, PaymentStatus, Settlement};
pub use payment::{CryptoPayment, CryptoPaymentStatus, PaymentRail};
pub use product::{Product, ProductCatalog, ProductCategory, ProductQuery, ProductSort, SortOrder};
pub use service::{
    Confirmation, CryptoQuote, NewsletterService, PaymentService, SignatureStatus, SolanaQuote,
};
pub use store::{
    OrderRepository, Page, Pagination, PaymentRepository, ProductRepository, SharedStore, Store,
    SubscriberRepository,
};
pub use verifier::{
    SharedVerifier, TransactionStatus, TransactionVerifier, TrustingVerifier, VerifierSelector,
};
pub use wallet::{
    is_plausible_address, is_solana_address, is_solana_signature, payment_uri, MerchantWallets,
};
