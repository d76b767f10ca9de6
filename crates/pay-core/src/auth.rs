//! # Authentication
//!
//! Resolves a bearer token to the calling user.

use crate::error::{CommerceError, CommerceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthUser {
    pub fn new(id: Uuid) -> Self {
        Self { id, email: None }
    }
}

/// Resolves bearer tokens
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the user for `token`, or `CommerceError::Unauthorized`
    async fn authenticate(&self, token: &str) -> CommerceResult<AuthUser>;

    fn authenticator_name(&self) -> &'static str;
}

pub type SharedAuthenticator = Arc<dyn Authenticator>;

/// Fixed token → user table for development and tests
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, AuthUser>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: accept `token` as `user`
    pub fn with_user(mut self, token: impl Into<String>, user: AuthUser) -> Self {
        self.users.insert(token.into(), user);
        self
    }

    /// Parse `"token:uuid,token2:uuid2"` (the `DEV_AUTH_TOKENS` format)
    pub fn parse_tokens(tokens: &str) -> CommerceResult<Self> {
        let mut auth = Self::new();
        for entry in tokens.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, user_id) = entry.split_once(':').ok_or_else(|| {
                CommerceError::Configuration(format!(
                    "DEV_AUTH_TOKENS entry must be token:user-id, got {}",
                    entry
                ))
            })?;
            let id = Uuid::parse_str(user_id.trim()).map_err(|e| {
                CommerceError::Configuration(format!("invalid user id in DEV_AUTH_TOKENS: {}", e))
            })?;
            auth.users.insert(token.trim().to_string(), AuthUser::new(id));
        }
        Ok(auth)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> CommerceResult<AuthUser> {
        self.users
            .get(token)
            .cloned()
            .ok_or(CommerceError::Unauthorized)
    }

    fn authenticator_name(&self) -> &'static str {
        "static"
    }
}

/// Compare secrets without short-circuiting on the first differing byte
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
