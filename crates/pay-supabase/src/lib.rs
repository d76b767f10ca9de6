//! # pay-supabase
//!
//! Supabase backend for dropics-pay.
//!
//! 1. **SupabaseStore** - every repository trait over PostgREST
//!    - Conditional status updates (`status=eq.pending`)
//!    - Exact counts for paginated listings
//!
//! 2. **SupabaseAuthenticator** - bearer token → user via the auth server
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_supabase::{SupabaseAuthenticator, SupabaseConfig, SupabaseStore};
//!
//! let config = SupabaseConfig::from_env()?;
//! let store = Arc::new(SupabaseStore::new(config.clone())?);
//! let auth = Arc::new(SupabaseAuthenticator::new(config)?);
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod store;

// Re-exports
pub use auth::SupabaseAuthenticator;
pub use client::PostgrestClient;
pub use config::SupabaseConfig;
pub use store::SupabaseStore;
