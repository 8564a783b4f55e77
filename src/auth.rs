//! Authentication
//!
//! Bearer tokens are verified by an [`AuthProvider`]: the hosted auth service
//! (`SupabaseAuth`) in production, or a static token table for local setups.
//! Admin access additionally requires the `admin` role in `user_roles`.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::db::{Database, ADMIN_ROLE};

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin role required")]
    Forbidden,

    #[error("Auth service unavailable: {0}")]
    Unavailable(String),

    #[error("Role lookup failed: {0}")]
    RoleLookup(String),
}

/// Verifies bearer tokens
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// Pull the token out of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .unwrap_or_default();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Authenticate the caller and check the admin role
pub async fn require_admin(
    provider: &dyn AuthProvider,
    db: &Database,
    headers: &HeaderMap,
) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers)?;
    let user = provider.verify(token).await?;

    let is_admin = db
        .has_role(&user.id, ADMIN_ROLE)
        .await
        .map_err(|e| AuthError::RoleLookup(e.to_string()))?;

    if !is_admin {
        tracing::warn!(user_id = %user.id, "Non-admin user attempted admin action");
        return Err(AuthError::Forbidden);
    }

    Ok(user)
}

// ============================================
// Hosted auth service
// ============================================

/// Verifies tokens against the hosted auth service's `/auth/v1/user` endpoint
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuth {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<AuthUser>()
                .await
                .map_err(|e| AuthError::Unavailable(format!("Malformed user response: {}", e))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
                Err(AuthError::InvalidToken)
            }
            status => Err(AuthError::Unavailable(format!(
                "Auth service returned {}",
                status
            ))),
        }
    }
}

// ============================================
// Static tokens
// ============================================

/// Fixed token → user-id table, for local development and tests
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuth {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.tokens
            .get(token)
            .map(|id| AuthUser {
                id: id.clone(),
                email: None,
            })
            .ok_or(AuthError::InvalidToken)
    }
}
