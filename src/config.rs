//! Backend endpoint configuration
//!
//! The client is a configured handle to the hosted backend: base URL
//! plus the public (anon) API key sent with every request.

use serde::{Deserialize, Serialize};

const URL_ENV: &str = "LOFTLY_BACKEND_URL";
const ANON_KEY_ENV: &str = "LOFTLY_ANON_KEY";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Backend environment variable is missing: {0}")]
    MissingEnv(&'static str),
}

/// Connection settings for the hosted backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend (stored without a trailing slash)
    pub url: String,
    /// Public anon key, sent as the `apikey` header
    pub anon_key: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    /// Read the configuration from the environment.
    ///
    /// Missing variables are a hard error; the app cannot run without
    /// a backend to talk to.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var(URL_ENV).map_err(|_| ConfigError::MissingEnv(URL_ENV))?;
        let anon_key =
            std::env::var(ANON_KEY_ENV).map_err(|_| ConfigError::MissingEnv(ANON_KEY_ENV))?;
        Ok(Self::new(url, anon_key))
    }
}
