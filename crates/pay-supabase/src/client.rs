//! # PostgREST Client
//!
//! Thin typed wrapper over the Supabase REST API. Filters are passed as
//! PostgREST query pairs (`("status", "eq.pending")`).

use crate::config::SupabaseConfig;
use pay_core::{CommerceError, CommerceResult};
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const PROVIDER: &str = "supabase";

/// Postgres `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Query pair sent to PostgREST
pub type Filter = (&'static str, String);

/// `("column", "eq.value")`
pub fn eq(column: &'static str, value: impl std::fmt::Display) -> Filter {
    (column, format!("eq.{}", value))
}

/// Supabase REST client
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    config: SupabaseConfig,
    client: Client,
}

impl PostgrestClient {
    pub fn new(config: SupabaseConfig) -> CommerceResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                CommerceError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    fn request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.config.rest_url(table))
            .header("apikey", &self.config.service_role_key)
            .header("Authorization", self.config.auth_header())
    }

    /// Rows matching `filters`
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> CommerceResult<Vec<T>> {
        let request = self
            .request(reqwest::Method::GET, table)
            .query(&[("select", "*")])
            .query(filters);
        let (body, _) = send(request, table).await?;
        parse(&body, table)
    }

    /// First row matching `filters`
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> CommerceResult<Option<T>> {
        let mut filters = filters.to_vec();
        filters.push(("limit", "1".to_string()));
        Ok(self.select(table, &filters).await?.into_iter().next())
    }

    /// Rows matching `filters` plus the exact total count (`Prefer: count=exact`)
    pub async fn select_counted<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> CommerceResult<(Vec<T>, u64)> {
        let request = self
            .request(reqwest::Method::GET, table)
            .header("Prefer", "count=exact")
            .query(&[("select", "*")])
            .query(filters);
        let (body, content_range) = send(request, table).await?;

        let rows: Vec<T> = parse(&body, table)?;
        let total = content_range
            .as_deref()
            .and_then(parse_content_range_total)
            .unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    /// Insert one row and return it as stored
    pub async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> CommerceResult<T> {
        let request = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(row);
        let (body, _) = send(request, table).await?;

        parse::<Vec<T>>(&body, table)?
            .into_iter()
            .next()
            .ok_or_else(|| CommerceError::Storage(format!("insert into {} returned no row", table)))
    }

    /// Patch every row matching `filters`; returns the updated rows
    pub async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
        patch: &B,
    ) -> CommerceResult<Vec<T>> {
        let request = self
            .request(reqwest::Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(filters)
            .json(patch);
        let (body, _) = send(request, table).await?;
        parse(&body, table)
    }
}

/// Send, check status, and return the body plus any `Content-Range` header
async fn send(request: RequestBuilder, table: &str) -> CommerceResult<(String, Option<String>)> {
    let response = request
        .send()
        .await
        .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

    let status = response.status();
    let content_range = response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = response
        .text()
        .await
        .map_err(|e| CommerceError::NetworkError(e.to_string()))?;

    if !status.is_success() {
        error!("Supabase API error: table={}, status={}, body={}", table, status, body);

        if let Ok(error_response) = serde_json::from_str::<PostgrestError>(&body) {
            if error_response.code.as_deref() == Some(UNIQUE_VIOLATION) {
                return Err(CommerceError::Conflict(error_response.describe()));
            }
            return Err(CommerceError::ProviderError {
                provider: PROVIDER.to_string(),
                message: error_response.describe(),
            });
        }

        return Err(CommerceError::ProviderError {
            provider: PROVIDER.to_string(),
            message: format!("HTTP {}: {}", status, body),
        });
    }

    debug!(table, status = %status, "Supabase request ok");
    Ok((body, content_range))
}

fn parse<T: DeserializeOwned>(body: &str, table: &str) -> CommerceResult<T> {
    serde_json::from_str(body).map_err(|e| {
        CommerceError::Serialization(format!("Failed to parse {} rows: {}", table, e))
    })
}

/// Total from `0-19/57` or `*/0`
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.parse().ok()
}

// =============================================================================
// PostgREST Error Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl PostgrestError {
    fn describe(&self) -> String {
        let mut message = self.message.clone();
        if let Some(code) = &self.code {
            message = format!("{} ({})", message, code);
        }
        if let Some(details) = &self.details {
            message = format!("{}: {}", message, details);
        }
        message
    }
}
