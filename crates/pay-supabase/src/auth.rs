//! # Supabase Auth
//!
//! Resolves a user access token by asking GoTrue (`GET /auth/v1/user`).

use crate::client::PostgrestClient;
use crate::config::SupabaseConfig;
use async_trait::async_trait;
use pay_core::{AuthUser, Authenticator, CommerceError, CommerceResult};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Authenticator backed by the Supabase auth server
#[derive(Debug, Clone)]
pub struct SupabaseAuthenticator {
    client: PostgrestClient,
}

impl SupabaseAuthenticator {
    pub fn new(config: SupabaseConfig) -> CommerceResult<Self> {
        Ok(Self {
            client: PostgrestClient::new(config)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[async_trait]
impl Authenticator for SupabaseAuthenticator {
    #[instrument(skip(self, token))]
    async fn authenticate(&self, token: &str) -> CommerceResult<AuthUser> {
        let config = self.client.config();
        let response = self
            .client
            .http()
            .get(config.auth_user_url())
            .header("apikey", &config.service_role_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            debug!("Access token rejected by auth server");
            return Err(CommerceError::Unauthorized);
        }

        let body = response
            .text()
            .await
            .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Supabase auth error: status={}, body={}", status, body);
            return Err(CommerceError::ProviderError {
                provider: "supabase".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let user: GoTrueUser = serde_json::from_str(&body).map_err(|e| {
            CommerceError::Serialization(format!("Failed to parse auth user: {}", e))
        })?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
        })
    }

    fn authenticator_name(&self) -> &'static str {
        "supabase"
    }
}
