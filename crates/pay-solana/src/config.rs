//! # Solana Configuration

use pay_core::CommerceError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Cluster the RPC endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolanaNetwork {
    MainnetBeta,
    Testnet,
    Devnet,
}

impl SolanaNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolanaNetwork::MainnetBeta => "mainnet-beta",
            SolanaNetwork::Testnet => "testnet",
            SolanaNetwork::Devnet => "devnet",
        }
    }

    /// Public RPC endpoint for the cluster
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            SolanaNetwork::MainnetBeta => "https://api.mainnet-beta.solana.com",
            SolanaNetwork::Testnet => "https://api.testnet.solana.com",
            SolanaNetwork::Devnet => "https://api.devnet.solana.com",
        }
    }
}

impl FromStr for SolanaNetwork {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(SolanaNetwork::MainnetBeta),
            "testnet" => Ok(SolanaNetwork::Testnet),
            "devnet" => Ok(SolanaNetwork::Devnet),
            other => Err(CommerceError::Configuration(format!(
                "Unknown SOLANA_NETWORK: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SolanaNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Solana RPC configuration
#[derive(Debug, Clone)]
pub struct SolanaConfig {
    pub network: SolanaNetwork,

    /// JSON-RPC endpoint
    pub rpc_url: String,

    /// Check SOL confirmations on chain instead of trusting the client
    pub verify_transactions: bool,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl SolanaConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `SOLANA_NETWORK` (default `devnet`)
    /// - `SOLANA_RPC_URL` (default: the network's public endpoint)
    /// - `SOLANA_VERIFY_TRANSACTIONS` (default `false`)
    pub fn from_env() -> Result<Self, CommerceError> {
        dotenvy::dotenv().ok();

        let network = match env::var("SOLANA_NETWORK") {
            Ok(value) => value.parse()?,
            Err(_) => SolanaNetwork::Devnet,
        };

        let rpc_url = env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| network.default_rpc_url().to_string());

        if !rpc_url.starts_with("https://") && !rpc_url.starts_with("http://") {
            return Err(CommerceError::Configuration(
                "SOLANA_RPC_URL must start with http:// or https://".to_string(),
            ));
        }

        let verify_transactions = env::var("SOLANA_VERIFY_TRANSACTIONS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            network,
            rpc_url,
            verify_transactions,
            timeout_secs: 30,
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(network: SolanaNetwork, rpc_url: impl Into<String>) -> Self {
        Self {
            network,
            rpc_url: rpc_url.into(),
            verify_transactions: true,
            timeout_secs: 30,
        }
    }
}

impl Default for SolanaConfig {
    fn default() -> Self {
        let network = SolanaNetwork::Devnet;
        Self {
            network,
            rpc_url: network.default_rpc_url().to_string(),
            verify_transactions: false,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing() {
        assert_eq!("mainnet".parse::<SolanaNetwork>().unwrap(), SolanaNetwork::MainnetBeta);
        assert_eq!("Devnet".parse::<SolanaNetwork>().unwrap(), SolanaNetwork::Devnet);
        assert!("localnet".parse::<SolanaNetwork>().is_err());
    }

    #[test]
    fn test_default_is_devnet_unverified() {
        let config = SolanaConfig::default();
        assert_eq!(config.rpc_url, "https://api.devnet.solana.com");
        assert!(!config.verify_transactions);
    }
}
