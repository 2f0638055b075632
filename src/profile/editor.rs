//! Profile screen state machine
//!
//! Load-on-mount, upsert-on-save, and the avatar upload chain. The
//! editor reads the current session from the shared store, so every
//! remote call is scoped to the signed-in user's id.

use super::types::{
    AvatarStore, ImagePicker, PickOutcome, PickedImage, ProfileApi, ProfileError, ProfileRow,
};
use crate::auth::types::AuthSession;
use crate::session::SessionStore;
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;

/// Per-screen load state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Editable profile fields plus the per-screen state machine.
///
/// Concurrent saves are not deduplicated here; the UI disables the
/// submit control while a save is in flight, and the last write wins.
pub struct ProfileEditor {
    store: Arc<SessionStore>,
    api: Arc<dyn ProfileApi>,
    avatars: Arc<dyn AvatarStore>,
    pub state: LoadState,
    pub username: String,
    pub full_name: String,
    pub website: String,
    pub avatar_url: String,
}

impl ProfileEditor {
    pub fn new(
        store: Arc<SessionStore>,
        api: Arc<dyn ProfileApi>,
        avatars: Arc<dyn AvatarStore>,
    ) -> Self {
        Self {
            store,
            api,
            avatars,
            state: LoadState::Idle,
            username: String::new(),
            full_name: String::new(),
            website: String::new(),
            avatar_url: String::new(),
        }
    }

    fn session(&self) -> Result<AuthSession, ProfileError> {
        self.store.current().ok_or(ProfileError::NotAuthenticated)
    }

    /// Fetch the profile row for the current user and populate the
    /// editable fields.
    ///
    /// A missing row is not an error: new users have no profile row
    /// yet and the fields stay at their defaults.
    pub async fn load(&mut self) -> Result<(), ProfileError> {
        let session = self.session()?;
        self.state = LoadState::Loading;

        let fetched = self.api.fetch(&session.access_token, &session.user.id).await;
        match fetched {
            Ok(Some(row)) => {
                self.username = row.username.unwrap_or_default();
                self.full_name = row.full_name.unwrap_or_default();
                self.website = row.website.unwrap_or_default();
                self.avatar_url = row.avatar_url.unwrap_or_default();
                self.state = LoadState::Ready;
                Ok(())
            }
            Ok(None) => {
                info!("No profile row yet for user {}", session.user.id);
                self.state = LoadState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("Profile load failed: {}", e);
                self.state = LoadState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Upsert the row built from the current field values plus the
    /// session user id and the current timestamp.
    pub async fn save(&mut self) -> Result<(), ProfileError> {
        let session = self.session()?;
        self.state = LoadState::Loading;

        let row = self.to_row(&session.user.id);
        let result = self.api.upsert(&session.access_token, &row).await;
        match result {
            Ok(()) => {
                info!("Profile updated for user {}", session.user.id);
                self.state = LoadState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("Profile update failed: {}", e);
                self.state = LoadState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Upload avatar bytes, resolve the public URL, and persist it on
    /// the profile row.
    ///
    /// Strictly upload-then-persist: the row is only touched after the
    /// storage service has confirmed the upload, so no rollback is
    /// needed on failure. Every failure in the chain collapses to one
    /// generic upload error.
    pub async fn upload_avatar(&mut self, image: &PickedImage) -> Result<(), ProfileError> {
        let session = self.session()?;

        let (path, ext) = match avatar_object_path(&session.user.id, &image.file_name) {
            Some(parts) => parts,
            None => {
                warn!("Picked image has no usable extension: {}", image.file_name);
                return Err(ProfileError::UploadFailed);
            }
        };
        let content_type = format!("image/{}", ext);

        if let Err(e) = self
            .avatars
            .upload(&session.access_token, &path, image.bytes.clone(), &content_type)
            .await
        {
            error!("Avatar upload failed: {}", e);
            return Err(ProfileError::UploadFailed);
        }

        self.avatar_url = self.avatars.public_url(&path);

        if let Err(e) = self.save().await {
            error!("Failed to persist avatar URL: {}", e);
            return Err(ProfileError::UploadFailed);
        }

        info!("Avatar updated for user {}", session.user.id);
        Ok(())
    }

    /// Await the image picker and upload the result; cancellation is a
    /// no-op.
    pub async fn pick_and_upload(&mut self, picker: &dyn ImagePicker) -> Result<(), ProfileError> {
        match picker.pick_image().await {
            Ok(PickOutcome::Picked(image)) => self.upload_avatar(&image).await,
            Ok(PickOutcome::Cancelled) => Ok(()),
            Err(e) => {
                warn!("Image pick failed: {}", e);
                Err(ProfileError::UploadFailed)
            }
        }
    }

    fn to_row(&self, user_id: &str) -> ProfileRow {
        fn field(value: &str) -> Option<String> {
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }

        ProfileRow {
            id: user_id.to_string(),
            username: field(&self.username),
            full_name: field(&self.full_name),
            website: field(&self.website),
            avatar_url: field(&self.avatar_url),
            updated_at: Some(Utc::now()),
        }
    }
}

/// Storage object path for a user's avatar, derived from the source
/// file's extension: `avatars/<user_id>.<ext>`.
///
/// Returns the path and the lowercased extension, or `None` when the
/// file name has no extension.
fn avatar_object_path(user_id: &str, file_name: &str) -> Option<(String, String)> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    let ext = ext.to_lowercase();
    Some((format!("avatars/{}.{}", user_id, ext), ext))
}
