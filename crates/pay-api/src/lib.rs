//! # pay-api
//!
//! HTTP API layer for dropics-pay.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Crypto, Solana and card payment endpoints
//! - Newsletter and read-only catalog endpoints
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST/PUT/GET | `/api/payments/crypto` | Crypto payment initiate / confirm / status |
//! | POST/PUT/GET | `/api/payments/solana` | Solana payment initiate / confirm / signature status |
//! | POST/PUT | `/api/payments/stripe` | Card payment intent open / sync |
//! | POST | `/api/payments/stripe/webhook` | Signed card gateway events |
//! | POST/DELETE/GET | `/api/newsletter` | Subscribe / unsubscribe / list (admin) |
//! | GET | `/api/products` | List products |
//! | GET | `/api/products/{id}` | Get product |

pub mod extract;
pub mod handlers;
pub mod mailer;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState, StoreBackend};
