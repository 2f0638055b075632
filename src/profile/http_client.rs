//! HTTP client for the profile table and avatar bucket

use super::types::{AvatarStore, ProfileApi, ProfileError, ProfileRow};
use crate::config::BackendConfig;
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::{Client, StatusCode};

const PROFILE_COLUMNS: &str = "id,username,full_name,website,avatar_url";
const AVATAR_BUCKET: &str = "avatars";

/// HTTP client for profile and avatar API calls
pub struct ProfileClient {
    client: Client,
    config: BackendConfig,
}

impl ProfileClient {
    /// Create a new ProfileClient
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
impl ProfileApi for ProfileClient {
    /// Fetch the single profile row for a user id
    async fn fetch(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<ProfileRow>, ProfileError> {
        let url = format!(
            "{}/rest/v1/profiles?id=eq.{}&select={}",
            self.config.url, user_id, PROFILE_COLUMNS
        );

        debug!("Fetching profile for user {}", user_id);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            // Single-object response: exactly one row or 406
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(|e| ProfileError::NetworkError(e.to_string()))?;

        // 406 means no row yet; new users have no profile row
        if response.status() == StatusCode::NOT_ACCEPTABLE {
            debug!("No profile row for user {}", user_id);
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Profile fetch failed: {} - {}", status, body);
            return Err(ProfileError::ApiError(format!(
                "Profile fetch failed: {} - {}",
                status, body
            )));
        }

        let row: ProfileRow = response
            .json()
            .await
            .map_err(|e| ProfileError::ApiError(format!("Failed to parse profile: {}", e)))?;

        info!("Fetched profile for user {}", user_id);
        Ok(Some(row))
    }

    /// Upsert the profile row, keyed by id
    async fn upsert(&self, access_token: &str, row: &ProfileRow) -> Result<(), ProfileError> {
        let url = format!("{}/rest/v1/profiles", self.config.url);

        debug!("Upserting profile for user {}", row.id);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| ProfileError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Profile upsert failed: {} - {}", status, body);
            return Err(ProfileError::ApiError(format!(
                "Profile update failed: {} - {}",
                status, body
            )));
        }

        info!("Profile upserted for user {}", row.id);
        Ok(())
    }
}

#[async_trait]
impl AvatarStore for ProfileClient {
    /// Upload raw image bytes to the avatar bucket
    async fn upload(
        &self,
        access_token: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ProfileError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, AVATAR_BUCKET, path
        );

        debug!("Uploading avatar to {} ({} bytes)", path, bytes.len());

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", content_type)
            // Replace any previous avatar at the same path
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProfileError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Avatar upload failed: {} - {}", status, body);
            return Err(ProfileError::ApiError(format!(
                "Avatar upload failed: {} - {}",
                status, body
            )));
        }

        info!("Avatar uploaded to {}", path);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, AVATAR_BUCKET, path
        )
    }
}
