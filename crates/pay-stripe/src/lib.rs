//! # pay-stripe
//!
//! Stripe card gateway for dropics-pay.
//!
//! [`StripeGateway`] implements `pay_core::CardGateway` on the
//! PaymentIntents API:
//!
//! - `create_intent` opens an intent for the order total (USD cents), tagged
//!   with `metadata[order_id]` and `metadata[user_id]`
//! - `retrieve_intent` reads an intent back for client-side sync
//! - `verify_webhook` checks the `Stripe-Signature` header and parses
//!   `payment_intent.*` events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_core::CardPaymentService;
//! use pay_stripe::StripeGateway;
//!
//! let gateway = StripeGateway::from_env()?;
//! let cards = CardPaymentService::new(store, Arc::new(gateway));
//!
//! let intent = cards.create_intent(&user, order_id).await?;
//! // Hand intent.client_secret to Stripe.js
//! ```

pub mod config;
pub mod gateway;
pub mod webhook;

pub use config::StripeConfig;
pub use gateway::StripeGateway;
pub use webhook::{signature_header, SIGNATURE_HEADER, REQUIRED_WEBHOOK_EVENTS};
