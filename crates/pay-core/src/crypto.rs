//! # Crypto Currencies & Exchange Rates
//!
//! The fixed set of accepted coins and the USD → coin rate table used to
//! quote order totals. Rates are static (optionally overridden from
//! `config/payments.toml`), never fetched live.

use crate::error::{CommerceError, CommerceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Lamports in one SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Wei in one ether (ERC-20 stablecoins are quoted the same way)
pub const WEI_PER_ETHER: f64 = 1e18;

/// Accepted cryptocurrencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoCurrency {
    BTC,
    ETH,
    USDT,
    USDC,
    SOL,
}

impl CryptoCurrency {
    pub const ALL: [CryptoCurrency; 5] = [
        CryptoCurrency::BTC,
        CryptoCurrency::ETH,
        CryptoCurrency::USDT,
        CryptoCurrency::USDC,
        CryptoCurrency::SOL,
    ];

    /// Ticker symbol as stored in `crypto_payments.currency`
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoCurrency::BTC => "BTC",
            CryptoCurrency::ETH => "ETH",
            CryptoCurrency::USDT => "USDT",
            CryptoCurrency::USDC => "USDC",
            CryptoCurrency::SOL => "SOL",
        }
    }

    /// Decimal places shown to shoppers at checkout
    pub fn display_precision(&self) -> usize {
        match self {
            CryptoCurrency::BTC => 8,
            CryptoCurrency::ETH => 6,
            _ => 2,
        }
    }

    /// Tokens settled on an EVM chain (deep links are denominated in wei)
    pub fn is_evm(&self) -> bool {
        matches!(
            self,
            CryptoCurrency::ETH | CryptoCurrency::USDT | CryptoCurrency::USDC
        )
    }

    /// Format an amount with this currency's display precision
    pub fn format_amount(&self, amount: f64) -> String {
        format!("{:.*} {}", self.display_precision(), amount, self.as_str())
    }
}

impl FromStr for CryptoCurrency {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BTC" => Ok(CryptoCurrency::BTC),
            "ETH" => Ok(CryptoCurrency::ETH),
            "USDT" => Ok(CryptoCurrency::USDT),
            "USDC" => Ok(CryptoCurrency::USDC),
            "SOL" => Ok(CryptoCurrency::SOL),
            _ => Err(CommerceError::UnsupportedCurrency {
                currency: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for CryptoCurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert SOL to lamports, truncating any fractional lamport
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).floor() as u64
}

/// USD → coin exchange rate table
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRates {
    rates: HashMap<CryptoCurrency, f64>,
}

impl ExchangeRates {
    /// Units of `currency` bought by one USD
    pub fn rate(&self, currency: CryptoCurrency) -> CommerceResult<f64> {
        self.rates
            .get(&currency)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
            .ok_or_else(|| CommerceError::UnsupportedCurrency {
                currency: currency.to_string(),
            })
    }

    /// Quote a USD amount in `currency`
    pub fn convert(&self, usd: f64, currency: CryptoCurrency) -> CommerceResult<f64> {
        Ok(usd * self.rate(currency)?)
    }

    /// Builder: override one rate
    pub fn with_rate(mut self, currency: CryptoCurrency, rate: f64) -> Self {
        self.rates.insert(currency, rate);
        self
    }

    /// Apply overrides on top of the current table
    pub fn merge(&mut self, overrides: &ExchangeRates) {
        for (currency, rate) in &overrides.rates {
            self.rates.insert(*currency, *rate);
        }
    }
}

impl Default for ExchangeRates {
    fn default() -> Self {
        let rates = HashMap::from([
            (CryptoCurrency::BTC, 0.000016),
            (CryptoCurrency::ETH, 0.00025),
            (CryptoCurrency::USDT, 1.0),
            (CryptoCurrency::USDC, 1.0),
            (CryptoCurrency::SOL, 0.01),
        ]);
        Self { rates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency() {
        assert_eq!("BTC".parse::<CryptoCurrency>().unwrap(), CryptoCurrency::BTC);
        assert_eq!("usdc".parse::<CryptoCurrency>().unwrap(), CryptoCurrency::USDC);
        assert!(matches!(
            "DOGE".parse::<CryptoCurrency>(),
            Err(CommerceError::UnsupportedCurrency { .. })
        ));
    }

    #[test]
    fn test_btc_quote() {
        let rates = ExchangeRates::default();
        let amount = rates.convert(100.0, CryptoCurrency::BTC).unwrap();
        assert_eq!(amount, 100.0 * 0.000016);
    }

    #[test]
    fn test_rate_override() {
        let mut rates = ExchangeRates::default();
        rates.merge(&ExchangeRates::default().with_rate(CryptoCurrency::SOL, 0.0065));
        assert_eq!(rates.rate(CryptoCurrency::SOL).unwrap(), 0.0065);
        assert_eq!(rates.rate(CryptoCurrency::ETH).unwrap(), 0.00025);
    }

    #[test]
    fn test_non_positive_rate_is_unsupported() {
        let rates = ExchangeRates::default().with_rate(CryptoCurrency::ETH, 0.0);
        assert!(rates.rate(CryptoCurrency::ETH).is_err());
    }

    #[test]
    fn test_lamports() {
        assert_eq!(sol_to_lamports(1.0), LAMPORTS_PER_SOL);
        assert_eq!(sol_to_lamports(0.4999999999), 499_999_999);
    }

    #[test]
    fn test_display_precision() {
        assert_eq!(CryptoCurrency::BTC.format_amount(0.0016), "0.00160000 BTC");
        assert_eq!(CryptoCurrency::ETH.format_amount(0.025), "0.025000 ETH");
        assert_eq!(CryptoCurrency::USDT.format_amount(100.0), "100.00 USDT");
    }
}
