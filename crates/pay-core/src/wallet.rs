//! # Merchant Wallets & Payment URIs
//!
//! Static receiving addresses per currency and the wallet deep links
//! rendered as QR codes at checkout.

use crate::crypto::{CryptoCurrency, WEI_PER_ETHER};
use std::collections::HashMap;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Receiving address per currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantWallets {
    addresses: HashMap<CryptoCurrency, String>,
}

impl MerchantWallets {
    /// Environment variable that overrides the address for `currency`
    pub fn env_var(currency: CryptoCurrency) -> &'static str {
        match currency {
            CryptoCurrency::BTC => "BTC_MERCHANT_ADDRESS",
            CryptoCurrency::ETH => "ETH_MERCHANT_ADDRESS",
            CryptoCurrency::USDT => "USDT_MERCHANT_ADDRESS",
            CryptoCurrency::USDC => "USDC_MERCHANT_ADDRESS",
            CryptoCurrency::SOL => "SOLANA_MERCHANT_WALLET",
        }
    }

    /// Built-in placeholder addresses
    pub fn defaults() -> Self {
        let evm = "0x0000000000000000000000000000000000000000";
        let addresses = HashMap::from([
            (
                CryptoCurrency::BTC,
                "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
            ),
            (CryptoCurrency::ETH, evm.to_string()),
            (CryptoCurrency::USDT, evm.to_string()),
            (CryptoCurrency::USDC, evm.to_string()),
            (
                CryptoCurrency::SOL,
                "So11111111111111111111111111111111111111112".to_string(),
            ),
        ]);
        Self { addresses }
    }

    /// Defaults overridden by any non-empty `*_MERCHANT_*` variables
    pub fn from_env() -> Self {
        let mut wallets = Self::defaults();
        wallets.apply_env();
        wallets
    }

    /// Overlay any non-empty `*_MERCHANT_*` variables
    pub fn apply_env(&mut self) {
        for currency in CryptoCurrency::ALL {
            if let Ok(address) = std::env::var(Self::env_var(currency)) {
                if !address.trim().is_empty() {
                    self.set(currency, address.trim());
                }
            }
        }
    }

    /// Replace the address for one currency
    pub fn set(&mut self, currency: CryptoCurrency, address: impl Into<String>) {
        self.addresses.insert(currency, address.into());
    }

    /// Builder: set address
    pub fn with_address(mut self, currency: CryptoCurrency, address: impl Into<String>) -> Self {
        self.set(currency, address);
        self
    }

    /// Receiving address for `currency`
    pub fn address(&self, currency: CryptoCurrency) -> &str {
        self.addresses
            .get(&currency)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl Default for MerchantWallets {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Wallet deep link encoded into the checkout QR code
pub fn payment_uri(currency: CryptoCurrency, address: &str, amount: f64) -> String {
    match currency {
        CryptoCurrency::BTC => format!("bitcoin:{}?amount={}", address, amount),
        CryptoCurrency::ETH | CryptoCurrency::USDT | CryptoCurrency::USDC => {
            let wei = (amount * WEI_PER_ETHER).round() as u128;
            format!("ethereum:{}?value={}", address, wei)
        }
        CryptoCurrency::SOL => format!("solana:{}?amount={}&spl-token=native", address, amount),
    }
}

fn is_base58(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| BASE58_ALPHABET.contains(c))
}

/// A Solana public key is 32 bytes, i.e. 32–44 base58 characters
pub fn is_solana_address(address: &str) -> bool {
    (32..=44).contains(&address.len()) && is_base58(address)
}

/// A Solana transaction signature is 64 bytes, at most 88 base58 characters
pub fn is_solana_signature(signature: &str) -> bool {
    (64..=88).contains(&signature.len()) && is_base58(signature)
}

/// Loose shape check for the address of any accepted currency
pub fn is_plausible_address(currency: CryptoCurrency, address: &str) -> bool {
    match currency {
        CryptoCurrency::SOL => is_solana_address(address),
        CryptoCurrency::BTC => {
            let legacy = (26..=35).contains(&address.len()) && is_base58(address);
            let bech32 = address.starts_with("bc1")
                && (14..=74).contains(&address.len())
                && address.chars().all(|c| c.is_ascii_alphanumeric());
            legacy || bech32
        }
        _ => {
            address.len() == 42
                && address.starts_with("0x")
                && address[2..].chars().all(|c| c.is_ascii_hexdigit())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addresses() {
        let wallets = MerchantWallets::defaults();
        assert_eq!(
            wallets.address(CryptoCurrency::BTC),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        );
        assert_eq!(
            wallets.address(CryptoCurrency::USDT),
            wallets.address(CryptoCurrency::ETH)
        );
    }

    #[test]
    fn test_override_address() {
        let wallets = MerchantWallets::defaults()
            .with_address(CryptoCurrency::SOL, "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU");
        assert_eq!(
            wallets.address(CryptoCurrency::SOL),
            "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
        );
    }

    #[test]
    fn test_bitcoin_uri() {
        let uri = payment_uri(CryptoCurrency::BTC, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", 0.0016);
        assert_eq!(uri, "bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa?amount=0.0016");
    }

    #[test]
    fn test_ethereum_uri_uses_wei() {
        let uri = payment_uri(CryptoCurrency::USDC, "0xabc", 2.5);
        assert_eq!(uri, "ethereum:0xabc?value=2500000000000000000");
    }

    #[test]
    fn test_solana_uri() {
        let uri = payment_uri(
            CryptoCurrency::SOL,
            "So11111111111111111111111111111111111111112",
            1.5,
        );
        assert_eq!(
            uri,
            "solana:So11111111111111111111111111111111111111112?amount=1.5&spl-token=native"
        );
    }

    #[test]
    fn test_address_shapes() {
        assert!(is_solana_address("So11111111111111111111111111111111111111112"));
        assert!(!is_solana_address("0x0000000000000000000000000000000000000000"));
        assert!(!is_solana_address("short"));
        assert!(is_plausible_address(
            CryptoCurrency::ETH,
            "0x0000000000000000000000000000000000000000"
        ));
        assert!(is_plausible_address(
            CryptoCurrency::BTC,
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        ));
        assert!(!is_plausible_address(CryptoCurrency::BTC, "0OIl"));
    }
}
