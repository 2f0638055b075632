//! HTTP client for the backend auth API

use super::types::{AuthApi, AuthError, SignUpResponse, TokenResponse};
use crate::config::BackendConfig;
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde_json::json;

/// HTTP client for authentication API calls
pub struct AuthClient {
    client: Client,
    config: BackendConfig,
}

impl AuthClient {
    /// Create a new AuthClient
    pub fn new(config: BackendConfig) -> Self {
        let client = Client::builder()
            .user_agent("Loftly/0.1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    /// Sign in with email and password
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.config.url);

        debug!("Signing in user: {}", email);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .header("Content-Type", "application/json")
            .json(&json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Sign in failed: {} - {}", status, body);
            return Err(AuthError::ApiError(remote_error_message(status, &body)));
        }

        let data: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ApiError(format!("Failed to parse response: {}", e)))?;

        info!("Sign in successful for user {}", data.user.id);
        Ok(data)
    }

    /// Register a new account.
    ///
    /// The response may carry no tokens: the backend requires email
    /// confirmation before a session is granted.
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResponse, AuthError> {
        let url = format!("{}/auth/v1/signup", self.config.url);

        debug!("Registering user: {}", email);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .header("Content-Type", "application/json")
            .json(&json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Sign up failed: {} - {}", status, body);
            return Err(AuthError::ApiError(remote_error_message(status, &body)));
        }

        let data: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ApiError(format!("Failed to parse response: {}", e)))?;

        info!(
            "Sign up accepted for user {} (session granted: {})",
            data.user.id,
            data.access_token.is_some()
        );
        Ok(data)
    }

    /// Exchange a refresh token for a new token grant
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let url = format!(
            "{}/auth/v1/token?grant_type=refresh_token",
            self.config.url
        );

        debug!("Refreshing access token");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .header("Content-Type", "application/json")
            .json(&json!({
                "refresh_token": refresh_token,
            }))
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Refresh token failed: {} - {}", status, body);

            // Revoked, rotated, or unknown refresh tokens will never succeed
            if is_refresh_token_permanently_invalid(&body) {
                return Err(AuthError::RefreshTokenInvalid);
            }

            return Err(AuthError::ApiError(remote_error_message(status, &body)));
        }

        let data: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ApiError(format!("Failed to parse response: {}", e)))?;

        info!("Token refresh successful");
        Ok(data)
    }

    /// Revoke the session server-side
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/v1/logout", self.config.url);

        debug!("Revoking session");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Sign out failed: {} - {}", status, body);
            return Err(AuthError::ApiError(remote_error_message(status, &body)));
        }

        info!("Session revoked");
        Ok(())
    }
}

/// Extract the backend's error message from a failed response.
///
/// The backend wraps its message in a JSON envelope (`msg`, `message`,
/// or `error_description` depending on the endpoint); the message
/// itself is surfaced to the caller unchanged. Non-JSON bodies pass
/// through as-is, and an empty body falls back to the status line.
pub(crate) fn remote_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["msg", "message", "error_description"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    if body.is_empty() {
        format!("Request failed: {}", status)
    } else {
        body.to_string()
    }
}

/// Classify a refresh-token error response body.
///
/// Returns `true` if the error indicates a permanently invalid refresh
/// token (revoked, rotated, or not found). These errors force a
/// re-login instead of being treated as transient.
pub(crate) fn is_refresh_token_permanently_invalid(body: &str) -> bool {
    body.contains("refresh_token_not_found")
        || body.contains("Invalid Refresh Token")
        || body.contains("refresh_token_already_used")
}
