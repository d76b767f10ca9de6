//! # Stripe PaymentIntents
//!
//! Card checkout through the PaymentIntents API. The browser confirms the
//! card with the returned `client_secret`; the order is settled either by
//! the client syncing the intent or by the webhook.

use crate::config::StripeConfig;
use crate::webhook;
use async_trait::async_trait;
use chrono::Utc;
use pay_core::{
    amount_in_cents, order_description, CardEvent, CardGateway, CommerceError, CommerceResult,
    Order, PaymentIntent,
};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe card gateway
#[derive(Debug, Clone)]
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> CommerceResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CommerceError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> CommerceResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Form body for `POST /v1/payment_intents`
    fn intent_params(order: &Order) -> Vec<(String, String)> {
        vec![
            ("amount".to_string(), amount_in_cents(order.total_amount).to_string()),
            ("currency".to_string(), "usd".to_string()),
            ("metadata[order_id]".to_string(), order.id.to_string()),
            ("metadata[user_id]".to_string(), order.user_id.to_string()),
            ("description".to_string(), order_description(order.id)),
        ]
    }

    async fn send(&self, request: RequestBuilder) -> CommerceResult<PaymentIntent> {
        let response = request
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(CommerceError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: error_response.error.describe(),
                });
            }

            return Err(CommerceError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            CommerceError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

/// `pi_` followed by Stripe's id alphabet
fn is_intent_id(id: &str) -> bool {
    id.strip_prefix("pi_").is_some_and(|rest| {
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

#[async_trait]
impl CardGateway for StripeGateway {
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    async fn create_intent(&self, order: &Order) -> CommerceResult<PaymentIntent> {
        let params = Self::intent_params(order);
        // One intent per order and amount, however often checkout is retried
        let idempotency_key = format!("order-{}-{}", order.id, amount_in_cents(order.total_amount));
        debug!(idempotency_key = %idempotency_key, "Creating Stripe payment intent");

        let url = format!("{}/v1/payment_intents", self.config.api_base_url);
        let intent = self
            .send(
                self.client
                    .post(&url)
                    .header("Idempotency-Key", &idempotency_key)
                    .form(&params),
            )
            .await?;

        info!(intent_id = %intent.id, status = %intent.status, "Created Stripe payment intent");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> CommerceResult<PaymentIntent> {
        if !is_intent_id(intent_id) {
            return Err(CommerceError::InvalidRequest(
                "Invalid payment intent ID".to_string(),
            ));
        }

        let url = format!("{}/v1/payment_intents/{}", self.config.api_base_url, intent_id);
        self.send(self.client.get(&url)).await
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> CommerceResult<CardEvent> {
        webhook::verify_event(
            &self.config.webhook_secret,
            payload,
            signature,
            Utc::now().timestamp(),
            self.config.webhook_tolerance_secs,
        )
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    param: Option<String>,
}

impl StripeError {
    fn describe(&self) -> String {
        match (&self.code, &self.param) {
            (Some(code), Some(param)) => format!("{} ({}, param {})", self.message, code, param),
            (Some(code), None) => format!("{} ({})", self.message, code),
            _ => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> StripeGateway {
        let config =
            StripeConfig::new("sk_test_abc123", "whsec_secret").with_api_base_url(server.uri());
        StripeGateway::new(config).unwrap()
    }

    fn intent_body(order: &Order, status: &str) -> serde_json::Value {
        json!({
            "id": "pi_3Abc",
            "object": "payment_intent",
            "client_secret": "pi_3Abc_secret_xyz",
            "status": status,
            "amount": amount_in_cents(order.total_amount),
            "currency": "usd",
            "metadata": {
                "order_id": order.id.to_string(),
                "user_id": order.user_id.to_string()
            }
        })
    }

    #[test]
    fn test_intent_id_shape() {
        assert!(is_intent_id("pi_3Abc_123"));
        assert!(!is_intent_id("pi_"));
        assert!(!is_intent_id("ch_3Abc"));
        assert!(!is_intent_id("pi_3Abc/../../v1/charges"));
    }

    #[tokio::test]
    async fn test_create_intent_sends_order_params() {
        let server = MockServer::start().await;
        let order = Order::new(Uuid::new_v4(), 42.499);
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("Authorization", "Bearer sk_test_abc123"))
            .and(header("Stripe-Version", "2024-12-18.acacia"))
            .and(body_string_contains("amount=4250"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains(format!(
                "metadata%5Border_id%5D={}",
                order.id
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(intent_body(&order, "requires_payment_method")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let intent = gateway(&server).create_intent(&order).await.unwrap();
        assert_eq!(intent.client_secret.as_deref(), Some("pi_3Abc_secret_xyz"));
        assert_eq!(intent.order_id(), Some(order.id));
        assert_eq!(intent.user_id(), Some(order.user_id));
    }

    #[tokio::test]
    async fn test_retrieve_intent() {
        let server = MockServer::start().await;
        let order = Order::new(Uuid::new_v4(), 10.0);
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_3Abc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(intent_body(&order, "succeeded")),
            )
            .mount(&server)
            .await;

        let intent = gateway(&server).retrieve_intent("pi_3Abc").await.unwrap();
        assert_eq!(intent.status, "succeeded");
        assert!(intent.settlement().is_some());

        let err = gateway(&server).retrieve_intent("../charges").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid payment intent ID");
    }

    #[tokio::test]
    async fn test_stripe_error_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "message": "Amount must be at least $0.50 usd",
                    "code": "amount_too_small",
                    "param": "amount"
                }
            })))
            .mount(&server)
            .await;

        let order = Order::new(Uuid::new_v4(), 0.1);
        let err = gateway(&server).create_intent(&order).await.unwrap_err();
        match &err {
            CommerceError::ProviderError { provider, message } => {
                assert_eq!(provider, "stripe");
                assert!(message.contains("amount_too_small"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_verify_webhook_uses_configured_secret() {
        let config = StripeConfig::new("sk_test_abc123", "whsec_secret");
        let gateway = StripeGateway::new(config).unwrap();
        let payload = br#"{"id":"evt_1","type":"customer.created","data":{"object":{}}}"#;
        let now = Utc::now().timestamp();

        let header = webhook::signature_header("whsec_secret", now, payload).unwrap();
        let event = gateway.verify_webhook(payload, &header).unwrap();
        assert_eq!(event.id, "evt_1");

        let header = webhook::signature_header("whsec_other", now, payload).unwrap();
        assert!(gateway.verify_webhook(payload, &header).is_err());
    }
}
