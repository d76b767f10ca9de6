//! # pay-wasm
//!
//! WebAssembly bindings for the Dropics checkout widget.
//!
//! The storefront uses these to show the shopper a quote, render the
//! wallet deep link as a QR code and sanity-check a pasted address or
//! signature before calling the payments API.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { quote, validate_wallet_address } from 'dropics-pay-wasm';
//!
//! await init();
//!
//! const q = quote(24.0, 'SOL', merchantAddress);
//! console.log(q.display, q.qr_code_data);
//! ```
//!
//! ## Building
//!
//! ```bash
//! wasm-pack build --target web
//! ```

use pay_core::{
    is_plausible_address, is_solana_signature, payment_uri, sol_to_lamports, CommerceResult,
    CryptoCurrency, ExchangeRates,
};
use wasm_bindgen::prelude::*;

fn js_error(err: pay_core::CommerceError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Checkout quote for one currency
#[derive(Debug, Clone)]
#[wasm_bindgen]
pub struct WasmQuote {
    currency: CryptoCurrency,
    amount_usd: f64,
    amount: f64,
    address: String,
}

impl WasmQuote {
    fn build(amount_usd: f64, currency: &str, address: &str) -> CommerceResult<Self> {
        let currency: CryptoCurrency = currency.parse()?;
        let amount = ExchangeRates::default().convert(amount_usd, currency)?;
        Ok(Self {
            currency,
            amount_usd,
            amount,
            address: address.trim().to_string(),
        })
    }
}

#[wasm_bindgen]
impl WasmQuote {
    #[wasm_bindgen(getter)]
    pub fn currency(&self) -> String {
        self.currency.to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn amount_usd(&self) -> f64 {
        self.amount_usd
    }

    #[wasm_bindgen(getter)]
    pub fn amount(&self) -> f64 {
        self.amount
    }

    #[wasm_bindgen(getter)]
    pub fn address(&self) -> String {
        self.address.clone()
    }

    /// Amount rounded for display, e.g. "0.00038400 BTC"
    #[wasm_bindgen(getter)]
    pub fn display(&self) -> String {
        self.currency.format_amount(self.amount)
    }

    /// Wallet deep link to encode as a QR code
    #[wasm_bindgen(getter)]
    pub fn qr_code_data(&self) -> String {
        payment_uri(self.currency, &self.address, self.amount)
    }

    /// Whole lamports due (SOL quotes only, 0 otherwise)
    #[wasm_bindgen(getter)]
    pub fn lamports(&self) -> u64 {
        match self.currency {
            CryptoCurrency::SOL => sol_to_lamports(self.amount),
            _ => 0,
        }
    }
}

/// Quote a USD order total in `currency` at the built-in rates
#[wasm_bindgen]
pub fn quote(amount_usd: f64, currency: &str, address: &str) -> Result<WasmQuote, JsValue> {
    WasmQuote::build(amount_usd, currency, address).map_err(js_error)
}

/// Format a coin amount with the currency's display precision
#[wasm_bindgen]
pub fn format_crypto_amount(amount: f64, currency: &str) -> Result<String, JsValue> {
    let currency: CryptoCurrency = currency.parse().map_err(js_error)?;
    Ok(currency.format_amount(amount))
}

/// Tickers accepted at checkout
#[wasm_bindgen]
pub fn supported_currencies() -> Vec<String> {
    CryptoCurrency::ALL.iter().map(|c| c.to_string()).collect()
}

/// Loose shape check of a receiving or payer address
#[wasm_bindgen]
pub fn validate_wallet_address(currency: &str, address: &str) -> bool {
    currency
        .parse::<CryptoCurrency>()
        .map(|c| is_plausible_address(c, address.trim()))
        .unwrap_or(false)
}

/// Shape check of a Solana transaction signature
#[wasm_bindgen]
pub fn validate_solana_signature(signature: &str) -> bool {
    is_solana_signature(signature.trim())
}

/// Log to browser console
#[wasm_bindgen]
pub fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
