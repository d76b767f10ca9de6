//! # Resend Mailer
//!
//! Sends transactional email through the Resend HTTP API.

use async_trait::async_trait;
use pay_core::{CommerceError, CommerceResult, Email, Mailer};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

const RESEND_API_BASE: &str = "https://api.resend.com";

/// `Mailer` backed by Resend
#[derive(Clone)]
pub struct ResendMailer {
    api_key: String,
    from: String,
    api_base_url: String,
    client: Client,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> CommerceResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CommerceError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            api_key: api_key.into(),
            from: from.into(),
            api_base_url: RESEND_API_BASE.to_string(),
            client,
        })
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

impl std::fmt::Debug for ResendMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendMailer")
            .field("from", &self.from)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendErrorResponse {
    message: String,
}

#[async_trait]
impl Mailer for ResendMailer {
    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send(&self, email: &Email) -> CommerceResult<()> {
        let request = SendEmailRequest {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Resend API error: status={}, body={}", status, body);
            let message = serde_json::from_str::<ResendErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));
            return Err(CommerceError::ProviderError {
                provider: "resend".to_string(),
                message,
            });
        }

        let sent: SendEmailResponse = serde_json::from_str(&body).map_err(|e| {
            CommerceError::Serialization(format!("Failed to parse Resend response: {}", e))
        })?;
        info!(email_id = %sent.id, "Sent email");
        Ok(())
    }

    fn mailer_name(&self) -> &'static str {
        "resend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pay_core::SubscriberEmail;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn welcome() -> Email {
        Email::welcome(&SubscriberEmail::parse("baker@example.com").unwrap(), None)
    }

    #[tokio::test]
    async fn test_send_posts_to_resend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("Authorization", "Bearer re_test"))
            .and(body_partial_json(json!({
                "from": "noreply@dropics.com",
                "to": ["baker@example.com"],
                "subject": "Welcome to Dropics Newsletter!"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email_123"})))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = ResendMailer::new("re_test", "noreply@dropics.com")
            .unwrap()
            .with_api_base_url(server.uri());
        mailer.send(&welcome()).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "statusCode": 422,
                "name": "validation_error",
                "message": "Invalid `from` field."
            })))
            .mount(&server)
            .await;

        let mailer = ResendMailer::new("re_test", "bad")
            .unwrap()
            .with_api_base_url(server.uri());
        let err = mailer.send(&welcome()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid `from` field."));
    }
}
