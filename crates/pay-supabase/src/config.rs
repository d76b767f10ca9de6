//! # Supabase Configuration
//!
//! Project URL and service-role key, loaded from environment variables.

use pay_core::CommerceError;
use std::env;

/// Supabase project configuration
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL (https://<ref>.supabase.co)
    pub url: String,

    /// Service-role key; bypasses row level security, server-side only
    pub service_role_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl SupabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_SERVICE_ROLE_KEY`
    pub fn from_env() -> Result<Self, CommerceError> {
        dotenvy::dotenv().ok();

        let url = env::var("SUPABASE_URL")
            .map_err(|_| CommerceError::Configuration("SUPABASE_URL not set".to_string()))?;

        let service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY").map_err(|_| {
            CommerceError::Configuration("SUPABASE_SERVICE_ROLE_KEY not set".to_string())
        })?;

        let config = Self::new(url, service_role_key);
        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
            timeout_secs: 30,
        }
    }

    pub fn validate(&self) -> Result<(), CommerceError> {
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(CommerceError::Configuration(
                "SUPABASE_URL must start with http:// or https://".to_string(),
            ));
        }
        if self.service_role_key.trim().is_empty() {
            return Err(CommerceError::Configuration(
                "SUPABASE_SERVICE_ROLE_KEY is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// PostgREST endpoint for `table`
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    /// GoTrue endpoint returning the user behind an access token
    pub fn auth_user_url(&self) -> String {
        format!("{}/auth/v1/user", self.url)
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.service_role_key)
    }
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}
