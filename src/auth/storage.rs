//! Dual session storage: file-based (primary) + platform keyring (secondary)
//!
//! The obfuscated file in the app data directory is the primary store
//! since it behaves the same on every platform. The keyring (Credential
//! Manager / Keychain / Secret Service) is an additional layer; a
//! session found only there is migrated back to the file.

use super::types::{AuthError, AuthSession};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use keyring::Entry;
use log::{debug, error, info, warn};
use std::path::PathBuf;

const SERVICE_NAME: &str = "Loftly";
const SESSION_KEY: &str = "auth_session";
const AUTH_SESSION_FILE: &str = "auth_session.dat";

// Simple obfuscation key - prevents casual reading of the session file,
// not a substitute for the keyring layer
const OBFUSCATION_KEY: &[u8] = b"LoftlyAuthSessionStorage";

/// Persistent storage for the authenticated session
pub struct SecureStorage {
    keyring_entry: Option<Entry>,
    data_dir: PathBuf,
}

impl SecureStorage {
    /// Create storage rooted at the platform data directory
    pub fn new() -> Result<Self, AuthError> {
        let data_dir = dirs::data_local_dir()
            .map(|d| d.join(SERVICE_NAME))
            .ok_or_else(|| {
                AuthError::StorageError("Could not determine data directory".to_string())
            })?;

        std::fs::create_dir_all(&data_dir).map_err(|e| {
            AuthError::StorageError(format!("Failed to create data directory: {}", e))
        })?;

        // Keyring availability varies by platform; file storage carries
        // the session when it is missing
        let keyring_entry = match Entry::new(SERVICE_NAME, SESSION_KEY) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Keyring not available ({}). Using file storage only.", e);
                None
            }
        };

        info!("SecureStorage initialized at {}", data_dir.display());

        Ok(Self {
            keyring_entry,
            data_dir,
        })
    }

    /// Create file-only storage rooted at an explicit directory.
    ///
    /// Used by tests and portable builds; the keyring layer is skipped.
    pub fn with_dir(data_dir: PathBuf) -> Result<Self, AuthError> {
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            AuthError::StorageError(format!("Failed to create data directory: {}", e))
        })?;
        Ok(Self {
            keyring_entry: None,
            data_dir,
        })
    }

    fn session_file_path(&self) -> PathBuf {
        self.data_dir.join(AUTH_SESSION_FILE)
    }

    /// Simple XOR obfuscation; applying it twice recovers the input
    fn obfuscate(data: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, &byte)| byte ^ OBFUSCATION_KEY[i % OBFUSCATION_KEY.len()])
            .collect()
    }

    fn store_to_file(&self, session: &AuthSession) -> Result<(), AuthError> {
        let path = self.session_file_path();

        let json = serde_json::to_string(session)
            .map_err(|e| AuthError::StorageError(format!("Failed to serialize session: {}", e)))?;

        let encoded = BASE64.encode(Self::obfuscate(json.as_bytes()));

        std::fs::write(&path, &encoded).map_err(|e| {
            error!("Failed to write session file: {}", e);
            AuthError::StorageError(format!("Failed to write session file: {}", e))
        })?;

        debug!("Session stored to {} ({} bytes)", path.display(), encoded.len());
        Ok(())
    }

    fn load_from_file(&self) -> Result<Option<AuthSession>, AuthError> {
        let path = self.session_file_path();

        if !path.exists() {
            debug!("Session file does not exist (first run or signed out)");
            return Ok(None);
        }

        let encoded = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to read session file: {}", e);
                return Ok(None);
            }
        };

        // A file that fails any decoding step is corrupt; delete it and
        // treat it as "no session"
        let obfuscated = match BASE64.decode(encoded.trim()) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to decode session file (base64): {}", e);
                let _ = std::fs::remove_file(&path);
                return Ok(None);
            }
        };

        let json = match String::from_utf8(Self::obfuscate(&obfuscated)) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to decode session file (utf8): {}", e);
                let _ = std::fs::remove_file(&path);
                return Ok(None);
            }
        };

        match serde_json::from_str::<AuthSession>(&json) {
            Ok(session) => {
                debug!("Loaded session from file for user {}", session.user.id);
                Ok(Some(session))
            }
            Err(e) => {
                error!("Failed to deserialize session from file: {}", e);
                let _ = std::fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    fn clear_from_file(&self) -> Result<(), AuthError> {
        let path = self.session_file_path();
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| {
                AuthError::StorageError(format!("Failed to delete session file: {}", e))
            })?;
            debug!("Cleared session file");
        }
        Ok(())
    }

    fn store_to_keyring(&self, session: &AuthSession) {
        let entry = match &self.keyring_entry {
            Some(e) => e,
            None => return,
        };

        let json = match serde_json::to_string(session) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize session for keyring: {}", e);
                return;
            }
        };

        // File storage is primary; keyring failures are non-fatal
        if let Err(e) = entry.set_password(&json) {
            warn!("Failed to store session in keyring: {}", e);
        }
    }

    fn load_from_keyring(&self) -> Option<AuthSession> {
        let entry = self.keyring_entry.as_ref()?;

        match entry.get_password() {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Failed to deserialize keyring session: {}", e);
                    None
                }
            },
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("Keyring read error: {:?}", e);
                None
            }
        }
    }

    fn clear_from_keyring(&self) {
        if let Some(entry) = &self.keyring_entry {
            match entry.delete_credential() {
                Ok(_) => debug!("Cleared session from keyring"),
                Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!("Failed to clear keyring session: {}", e),
            }
        }
    }

    /// Store the session to both layers
    pub fn store_session(&self, session: &AuthSession) -> Result<(), AuthError> {
        info!("Storing session for user {}", session.user.id);
        self.store_to_file(session)?;
        self.store_to_keyring(session);
        Ok(())
    }

    /// Load the session, file first, keyring as fallback
    pub fn load_session(&self) -> Result<Option<AuthSession>, AuthError> {
        if let Some(session) = self.load_from_file()? {
            return Ok(Some(session));
        }

        if let Some(session) = self.load_from_keyring() {
            info!("Session found only in keyring; migrating to file storage");
            let _ = self.store_to_file(&session);
            return Ok(Some(session));
        }

        debug!("No stored session found");
        Ok(None)
    }

    /// Clear the stored session from both layers
    pub fn clear_session(&self) -> Result<(), AuthError> {
        let file_result = self.clear_from_file();
        self.clear_from_keyring();

        if let Err(e) = &file_result {
            error!("Failed to clear session file: {}", e);
        }
        file_result
    }

    /// Check whether a session exists in either layer
    pub fn has_session(&self) -> bool {
        self.session_file_path().exists()
            || self
                .keyring_entry
                .as_ref()
                .map(|e| e.get_password().is_ok())
                .unwrap_or(false)
    }
}
