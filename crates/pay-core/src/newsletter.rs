//! # Newsletter Subscribers
//!
//! Subscriber rows, email normalisation and signed unsubscribe tokens.

use crate::error::{CommerceError, CommerceResult};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// A trimmed, lowercased email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    /// Validate the input as given, then normalise.
    ///
    /// Accepts `local@domain.tld` with no whitespace and exactly one `@`,
    /// the same shape as `^[^\s@]+@[^\s@]+\.[^\s@]+$`. Surrounding
    /// whitespace fails the shape check.
    pub fn parse(raw: &str) -> CommerceResult<Self> {
        if raw.is_empty() {
            return Err(CommerceError::InvalidRequest("Email is required".to_string()));
        }
        if !is_valid_email(raw) {
            return Err(CommerceError::InvalidRequest("Invalid email format".to_string()));
        }
        Ok(Self(raw.to_lowercase()))
    }

    /// Trim and lowercase without a shape check; used to match existing rows
    pub fn normalize(raw: &str) -> CommerceResult<Self> {
        if raw.is_empty() {
            return Err(CommerceError::InvalidRequest("Email is required".to_string()));
        }
        Ok(Self(raw.trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubscriberEmail {
    type Error = CommerceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SubscriberEmail> for String {
    fn from(email: SubscriberEmail) -> Self {
        email.0
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // needs a dot with something on both sides
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// A `newsletter_subscribers` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub subscribed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Subscriber {
    pub fn new(email: SubscriberEmail, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            subscribed: true,
            created_at: now,
            updated_at: None,
        }
    }
}

/// Result of a subscribe request
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeOutcome {
    /// First-time subscriber
    Created(Subscriber),
    /// Previously unsubscribed address switched back on
    Reactivated,
}

/// Filters for listing subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberQuery {
    pub subscribed: Option<bool>,
    pub page: u32,
    pub limit: u32,
}

impl Default for SubscriberQuery {
    fn default() -> Self {
        Self {
            subscribed: None,
            page: 1,
            limit: 50,
        }
    }
}

/// Signs and checks unsubscribe links
#[derive(Clone)]
pub struct UnsubscribeSigner {
    mac: HmacSha256,
}

impl UnsubscribeSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> CommerceResult<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| CommerceError::Configuration(format!("Invalid signing secret: {}", e)))?;
        Ok(Self { mac })
    }

    /// hex(HMAC-SHA256(secret, email))
    pub fn token(&self, email: &SubscriberEmail) -> String {
        let mut mac = self.mac.clone();
        mac.update(email.as_str().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a presented token
    pub fn verify(&self, email: &SubscriberEmail, token: &str) -> bool {
        let Ok(bytes) = hex::decode(token) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(email.as_str().as_bytes());
        mac.verify_slice(&bytes).is_ok()
    }
}

impl std::fmt::Debug for UnsubscribeSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsubscribeSigner").finish_non_exhaustive()
    }
}
