//! Authentication types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::SignUpFieldErrors;

/// Authenticated session with tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

impl AuthSession {
    /// Check if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the token will expire soon (within 5 minutes)
    pub fn expires_soon(&self) -> bool {
        Utc::now() + chrono::Duration::minutes(5) >= self.expires_at
    }
}

/// User information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
}

/// Token grant response from the backend auth API
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: RemoteUser,
}

/// Registration response.
///
/// Tokens are absent while email confirmation is pending; the backend
/// only grants a session once the address has been verified.
#[derive(Debug, Deserialize)]
pub struct SignUpResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: RemoteUser,
}

impl SignUpResponse {
    /// Extract a full token grant, if the backend issued one immediately.
    pub fn into_token_response(self) -> Option<TokenResponse> {
        match (self.access_token, self.refresh_token, self.expires_in) {
            (Some(access_token), Some(refresh_token), Some(expires_in)) => Some(TokenResponse {
                access_token,
                refresh_token,
                expires_in,
                user: self.user,
            }),
            _ => None,
        }
    }
}

/// User object embedded in auth responses
#[derive(Debug, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    pub email: Option<String>,
}

/// Error types for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Local sign-in validation failure; never reaches the network
    #[error("{0}")]
    Validation(String),

    /// Local sign-up validation failure; both fields reported independently
    #[error("{0}")]
    SignUpValidation(SignUpFieldErrors),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Session expired, please sign in again")]
    RefreshTokenInvalid,
}

/// Remote auth surface.
///
/// Implemented by [`super::AuthClient`] against the hosted backend and
/// by in-memory fakes in tests.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResponse, AuthError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}
