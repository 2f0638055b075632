//! Profile types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row in the profiles table.
///
/// One row per user, keyed by the user id; created implicitly on first
/// upsert and never deleted by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Image selected by the platform picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedImage {
    /// Source file name; the storage extension is derived from it
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Result of an image pick request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Picked(PickedImage),
    Cancelled,
}

/// Awaited request/response seam over the platform image picker
#[async_trait]
pub trait ImagePicker: Send + Sync {
    async fn pick_image(&self) -> Result<PickOutcome, ProfileError>;
}

/// Error types for the profile flow
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("No user on the session")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error: {0}")]
    ApiError(String),

    /// Any failure in the upload-then-persist chain collapses to this
    #[error("Failed to upload image")]
    UploadFailed,
}

/// Remote profile table surface.
///
/// Implemented by [`super::ProfileClient`] against the hosted backend
/// and by in-memory fakes in tests.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Fetch the row for a user id; `None` means no row yet (new user)
    async fn fetch(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<ProfileRow>, ProfileError>;

    /// Insert-if-absent, else update, keyed by id; last write wins
    async fn upsert(&self, access_token: &str, row: &ProfileRow) -> Result<(), ProfileError>;
}

/// Object storage surface for avatar images
#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn upload(
        &self,
        access_token: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ProfileError>;

    /// Durable public URL for an object path (pure formatting)
    fn public_url(&self, path: &str) -> String;
}
