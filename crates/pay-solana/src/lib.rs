//! # pay-solana
//!
//! On-chain confirmation checks for SOL payments.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_core::VerifierSelector;
//! use pay_solana::{SolanaConfig, SolanaRpcVerifier};
//!
//! let config = SolanaConfig::from_env()?;
//! let mut verifiers = VerifierSelector::default();
//! if config.verify_transactions {
//!     verifiers.register(Arc::new(SolanaRpcVerifier::new(&config)?));
//! }
//! ```

pub mod config;
pub mod rpc;
pub mod verifier;

// Re-exports
pub use config::{SolanaConfig, SolanaNetwork};
pub use rpc::SolanaRpcClient;
pub use verifier::SolanaRpcVerifier;
