//! # Application State
//!
//! Shared state for the Axum application.
//! Wires the store, authenticator, verifiers, card gateway and mailer chosen
//! by environment and config files into the payment and newsletter services.

use crate::mailer::ResendMailer;
use anyhow::{bail, Context};
use pay_core::{
    constant_time_eq, CardPaymentService, CommerceError, CryptoCurrency, ExchangeRates,
    InMemoryStore, LoggingMailer, MerchantWallets, NewsletterService, PaymentService,
    ProductCatalog, SharedAuthenticator, SharedMailer, SharedStore, StaticAuthenticator, Store,
    UnsubscribeSigner, VerifierSelector,
};
use pay_solana::{SolanaConfig, SolanaRpcVerifier};
use pay_stripe::{StripeGateway, REQUIRED_WEBHOOK_EVENTS};
use pay_supabase::{SupabaseAuthenticator, SupabaseConfig, SupabaseStore};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Where durable state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Supabase => "supabase",
            StoreBackend::Memory => "memory",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StoreBackend::Supabase),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("STORE_BACKEND must be supabase or memory, got {}", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL (unsubscribe links)
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Persistence backend
    pub store_backend: StoreBackend,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StoreBackend::Supabase,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            store_backend,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            store_backend: StoreBackend::Memory,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Repositories
    pub store: SharedStore,
    /// Bearer token → user
    pub auth: SharedAuthenticator,
    /// Crypto payment flows
    pub payments: PaymentService,
    /// Card payment flows, when a gateway is configured
    pub cards: Option<CardPaymentService>,
    /// Newsletter flows
    pub newsletter: NewsletterService,
    /// Token guarding the subscriber listing
    admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Build the full state from environment variables and config files
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store = build_store(&config)?;
        let auth = build_authenticator(&config)?;

        let settings = load_payment_settings()?;
        let payments = PaymentService::new(store.clone())
            .with_rates(settings.rates()?)
            .with_wallets(settings.wallets()?)
            .with_verifiers(build_verifiers()?);
        let cards = build_cards(&store)?;

        let mut newsletter =
            NewsletterService::new(store.clone(), build_mailer()?, config.base_url.clone());
        match non_empty_env("NEWSLETTER_SIGNING_SECRET") {
            Some(secret) => newsletter = newsletter.with_signer(UnsubscribeSigner::new(secret)?),
            None => warn!("NEWSLETTER_SIGNING_SECRET not set; unsubscribe links are unsigned"),
        }

        let admin_token = non_empty_env("ADMIN_API_TOKEN").map(Arc::from);
        if admin_token.is_none() {
            warn!("ADMIN_API_TOKEN not set; subscriber listing is disabled");
        }

        Ok(Self {
            config,
            store,
            auth,
            payments,
            cards,
            newsletter,
            admin_token,
        })
    }

    /// State over explicit backends with default services
    /// (trusting verifier, logging mailer, built-in rates and wallets, no card gateway)
    pub fn with_backends(config: AppConfig, store: SharedStore, auth: SharedAuthenticator) -> Self {
        let payments = PaymentService::new(store.clone());
        let newsletter = NewsletterService::new(
            store.clone(),
            Arc::new(LoggingMailer),
            config.base_url.clone(),
        );
        Self {
            config,
            store,
            auth,
            payments,
            cards: None,
            newsletter,
            admin_token: None,
        }
    }

    /// Builder: replace the payment service
    pub fn with_payments(mut self, payments: PaymentService) -> Self {
        self.payments = payments;
        self
    }

    /// Builder: enable card payments
    pub fn with_cards(mut self, cards: CardPaymentService) -> Self {
        self.cards = Some(cards);
        self
    }

    /// Card service, or `Unavailable` when no gateway is configured
    pub fn card_payments(&self) -> Result<&CardPaymentService, CommerceError> {
        self.cards.as_ref().ok_or(CommerceError::Unavailable("Card"))
    }

    /// Builder: replace the newsletter service
    pub fn with_newsletter(mut self, newsletter: NewsletterService) -> Self {
        self.newsletter = newsletter;
        self
    }

    /// Builder: set the admin token
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(Arc::from(token.into()));
        self
    }

    /// Whether `presented` matches the configured admin token
    pub fn is_admin_token(&self, presented: &str) -> bool {
        self.admin_token
            .as_deref()
            .map(|expected| constant_time_eq(expected, presented))
            .unwrap_or(false)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn build_store(config: &AppConfig) -> anyhow::Result<SharedStore> {
    let store: SharedStore = match config.store_backend {
        StoreBackend::Supabase => {
            let supabase = SupabaseConfig::from_env()
                .map_err(|e| anyhow::anyhow!("Failed to initialize Supabase: {}", e))?;
            Arc::new(SupabaseStore::new(supabase)?)
        }
        StoreBackend::Memory => {
            if config.is_production() {
                bail!("STORE_BACKEND=memory is not allowed in production");
            }
            Arc::new(InMemoryStore::with_catalog(load_product_catalog()?))
        }
    };
    info!("Store backend: {}", store.backend_name());
    Ok(store)
}

fn build_authenticator(config: &AppConfig) -> anyhow::Result<SharedAuthenticator> {
    if let Some(tokens) = non_empty_env("DEV_AUTH_TOKENS") {
        if config.is_production() {
            bail!("DEV_AUTH_TOKENS must not be set in production");
        }
        let auth = StaticAuthenticator::parse_tokens(&tokens)?;
        warn!("Using {} static development auth tokens", auth.len());
        return Ok(Arc::new(auth));
    }

    match config.store_backend {
        StoreBackend::Supabase => {
            let supabase = SupabaseConfig::from_env()
                .map_err(|e| anyhow::anyhow!("Failed to initialize Supabase auth: {}", e))?;
            Ok(Arc::new(SupabaseAuthenticator::new(supabase)?))
        }
        StoreBackend::Memory => {
            warn!("No DEV_AUTH_TOKENS configured; every authenticated route will return 401");
            Ok(Arc::new(StaticAuthenticator::new()))
        }
    }
}

fn build_verifiers() -> anyhow::Result<VerifierSelector> {
    let solana = SolanaConfig::from_env()?;
    let mut verifiers = VerifierSelector::default();
    if solana.verify_transactions {
        verifiers.register(Arc::new(SolanaRpcVerifier::new(&solana)?));
    }

    for (currency, verifier) in verifiers.routes() {
        info!("Verifier for {}: {}", currency, verifier);
    }
    let unverified = verifiers.unverified_currencies();
    if !unverified.is_empty() {
        warn!(
            "Transaction hashes for {:?} are accepted without on-chain verification",
            unverified
        );
    }
    Ok(verifiers)
}

fn build_cards(store: &SharedStore) -> anyhow::Result<Option<CardPaymentService>> {
    if non_empty_env("STRIPE_SECRET_KEY").is_none() {
        warn!("STRIPE_SECRET_KEY not set; card payments are disabled");
        return Ok(None);
    }

    let gateway = StripeGateway::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
    if gateway.config().is_test_mode() {
        info!("Stripe is in test mode");
    }
    info!("Stripe webhook events: {}", REQUIRED_WEBHOOK_EVENTS.join(", "));
    Ok(Some(CardPaymentService::new(store.clone(), Arc::new(gateway))))
}

fn build_mailer() -> anyhow::Result<SharedMailer> {
    match non_empty_env("RESEND_API_KEY") {
        Some(key) => {
            let from =
                non_empty_env("FROM_EMAIL").unwrap_or_else(|| "noreply@dropics.com".to_string());
            Ok(Arc::new(ResendMailer::new(key, from)?))
        }
        None => {
            warn!("RESEND_API_KEY not set; welcome emails will only be logged");
            Ok(Arc::new(LoggingMailer))
        }
    }
}

// ===== Config Files =====

/// `config/payments.toml`: exchange-rate and wallet overrides keyed by ticker
#[derive(Debug, Default, Deserialize)]
pub struct PaymentSettings {
    #[serde(default)]
    pub rates: HashMap<String, f64>,
    #[serde(default)]
    pub wallets: HashMap<String, String>,
}

impl PaymentSettings {
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Built-in table with file overrides applied
    pub fn rates(&self) -> anyhow::Result<ExchangeRates> {
        let mut rates = ExchangeRates::default();
        for (ticker, rate) in &self.rates {
            let currency: CryptoCurrency = ticker
                .parse()
                .with_context(|| format!("unknown currency in [rates]: {}", ticker))?;
            if !rate.is_finite() || *rate <= 0.0 {
                bail!("rate for {} must be positive", ticker);
            }
            rates = rates.with_rate(currency, *rate);
        }
        Ok(rates)
    }

    /// Defaults, then file overrides, then `*_MERCHANT_*` env vars
    pub fn wallets(&self) -> anyhow::Result<MerchantWallets> {
        let mut wallets = MerchantWallets::defaults();
        for (ticker, address) in &self.wallets {
            let currency: CryptoCurrency = ticker
                .parse()
                .with_context(|| format!("unknown currency in [wallets]: {}", ticker))?;
            wallets.set(currency, address.trim());
        }
        wallets.apply_env();
        Ok(wallets)
    }
}

const CONFIG_DIRS: [&str; 3] = ["config", "../config", "../../config"];

/// First readable `<dir>/<name>` among the config search paths
fn read_config_file(name: &str) -> Option<(String, String)> {
    CONFIG_DIRS.iter().find_map(|dir| {
        let path = format!("{}/{}", dir, name);
        std::fs::read_to_string(&path).ok().map(|content| (path, content))
    })
}

fn load_payment_settings() -> anyhow::Result<PaymentSettings> {
    match read_config_file("payments.toml") {
        Some((path, content)) => {
            let settings = PaymentSettings::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", path))?;
            info!("Loaded payment settings from {}", path);
            Ok(settings)
        }
        None => {
            warn!("No payments.toml found, using built-in rates and wallets");
            Ok(PaymentSettings::default())
        }
    }
}

/// Load product catalog from config file
fn load_product_catalog() -> anyhow::Result<ProductCatalog> {
    match read_config_file("products.toml") {
        Some((path, content)) => {
            let catalog = ProductCatalog::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", path))?;
            info!("Loaded {} products from {}", catalog.products.len(), path);
            Ok(catalog)
        }
        None => {
            warn!("No product catalog found, using empty catalog");
            Ok(ProductCatalog::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ..Default::default()
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("supabase".parse::<StoreBackend>().unwrap(), StoreBackend::Supabase);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_payment_settings_overrides() {
        let settings = PaymentSettings::from_toml(
            r#"
            [rates]
            BTC = 0.00002
            sol = 0.02

            [wallets]
            ETH = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e"
            "#,
        )
        .unwrap();

        let rates = settings.rates().unwrap();
        assert_eq!(rates.rate(CryptoCurrency::BTC).unwrap(), 0.00002);
        assert_eq!(rates.rate(CryptoCurrency::SOL).unwrap(), 0.02);
        assert_eq!(rates.rate(CryptoCurrency::USDT).unwrap(), 1.0);
    }

    #[test]
    fn test_payment_settings_rejects_unknown_ticker() {
        let settings = PaymentSettings::from_toml("[rates]\nDOGE = 0.5").unwrap();
        assert!(settings.rates().is_err());

        let settings = PaymentSettings::from_toml("[rates]\nBTC = -1.0").unwrap();
        assert!(settings.rates().is_err());
    }

    #[test]
    fn test_admin_token_check() {
        let state = AppState::with_backends(
            AppConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(StaticAuthenticator::new()),
        );
        assert!(!state.is_admin_token("anything"));

        let state = state.with_admin_token("s3cret");
        assert!(state.is_admin_token("s3cret"));
        assert!(!state.is_admin_token("s3cre"));
    }

    #[test]
    fn test_cards_unavailable_without_gateway() {
        let state = AppState::with_backends(
            AppConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(StaticAuthenticator::new()),
        );
        let err = state.card_payments().err().unwrap();
        assert_eq!(err.status_code(), 503);
    }
}
