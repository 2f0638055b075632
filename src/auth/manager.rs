//! Authentication manager - orchestrates sign-in, sign-up, sign-out,
//! and token refresh
//!
//! Every state change flows through the session store's notification
//! channel; the manager never hands a session to the UI directly.

use super::http_client::AuthClient;
use super::storage::SecureStorage;
use super::types::{AuthApi, AuthError, AuthSession, TokenResponse, UserInfo};
use super::validation;
use crate::config::BackendConfig;
use crate::session::{AuthEvent, SessionStore};
use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Interval between background refresh checks while the app is active
const AUTO_REFRESH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Result of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The backend granted a session immediately
    SignedIn,
    /// No session yet; the user must confirm their email address
    ConfirmationRequired,
}

/// Authentication manager
pub struct AuthManager {
    api: Arc<dyn AuthApi>,
    storage: SecureStorage,
    store: Arc<SessionStore>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthManager {
    /// Create a manager over an explicit API handle and storage.
    ///
    /// Any stored session is restored into the store; load failures
    /// leave the state signed out (absence is not an error).
    pub fn new(api: Arc<dyn AuthApi>, storage: SecureStorage, store: Arc<SessionStore>) -> Self {
        info!("Initializing AuthManager");
        match storage.load_session() {
            Ok(Some(session)) => {
                info!(
                    "Restored stored session for {} (expired: {})",
                    session.user.email,
                    session.is_expired()
                );
                store.publish(AuthEvent::SignedIn, Some(session));
            }
            Ok(None) => info!("No stored session; starting signed out"),
            Err(e) => {
                error!("Failed to load stored session: {}. Starting signed out.", e);
            }
        }

        Self {
            api,
            storage,
            store,
            refresh_task: Mutex::new(None),
        }
    }

    /// Create a manager wired to the hosted backend
    pub fn with_backend(
        config: BackendConfig,
        store: Arc<SessionStore>,
    ) -> Result<Self, AuthError> {
        let storage = SecureStorage::new()?;
        let api = Arc::new(AuthClient::new(config));
        Ok(Self::new(api, storage, store))
    }

    /// The store this manager publishes to
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.is_signed_in()
    }

    /// Sign in with email and password.
    ///
    /// Validation runs first and short-circuits without a remote call;
    /// remote error messages are surfaced verbatim.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        validation::validate_sign_in(email, password).map_err(AuthError::Validation)?;

        info!("Signing in user: {}", email);

        let response = self
            .api
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| {
                error!("Sign in failed: {}", e);
                e
            })?;

        let session = session_from(response, email);
        self.storage.store_session(&session)?;
        self.store.publish(AuthEvent::SignedIn, Some(session));

        info!("Sign in successful");
        Ok(())
    }

    /// Register a new account.
    ///
    /// Both fields are validated independently before any remote call.
    /// A response without a token grant means email confirmation is
    /// pending and the user stays signed out.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        validation::validate_sign_up(email, password).map_err(AuthError::SignUpValidation)?;

        info!("Registering user: {}", email);

        let response = self.api.sign_up(email, password).await.map_err(|e| {
            error!("Sign up failed: {}", e);
            e
        })?;

        match response.into_token_response() {
            Some(token) => {
                let session = session_from(token, email);
                self.storage.store_session(&session)?;
                self.store.publish(AuthEvent::SignedIn, Some(session));
                info!("Sign up granted an immediate session");
                Ok(SignUpOutcome::SignedIn)
            }
            None => {
                info!("Sign up accepted; email confirmation pending");
                Ok(SignUpOutcome::ConfirmationRequired)
            }
        }
    }

    /// Sign out and clear stored credentials.
    ///
    /// The remote revoke is best-effort; local sign-out proceeds even
    /// when it fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        info!("Signing out");

        if let Some(session) = self.store.current() {
            if let Err(e) = self.api.sign_out(&session.access_token).await {
                warn!("Remote sign-out failed (continuing locally): {}", e);
            }
        }

        self.storage.clear_session()?;
        self.store.publish(AuthEvent::SignedOut, None);

        info!("Signed out");
        Ok(())
    }

    /// Refresh the access token if it is expired or expiring soon.
    ///
    /// A single attempt, no retries. A permanently invalid refresh
    /// token forces a sign-out; a transient failure keeps the session
    /// as long as the token has time left.
    pub async fn refresh_if_needed(&self) -> Result<(), AuthError> {
        let session = match self.store.current() {
            Some(session) => session,
            None => return Err(AuthError::NotAuthenticated),
        };

        if !(session.is_expired() || session.expires_soon()) {
            debug!("Token still valid, no refresh needed");
            return Ok(());
        }

        info!(
            "Refreshing access token (expired: {})",
            session.is_expired()
        );

        match self.api.refresh_token(&session.refresh_token).await {
            Ok(response) => {
                let refreshed = session_from(response, &session.user.email);
                if let Err(e) = self.storage.store_session(&refreshed) {
                    // Session is still valid in memory
                    warn!("Failed to store refreshed session: {}", e);
                }
                self.store.publish(AuthEvent::TokenRefreshed, Some(refreshed));
                info!("Token refreshed");
                Ok(())
            }
            Err(AuthError::RefreshTokenInvalid) => {
                warn!("Refresh token is permanently invalid; signing out");
                self.force_sign_out();
                Err(AuthError::RefreshTokenInvalid)
            }
            Err(e) if !session.is_expired() => {
                warn!("Token refresh failed but token not yet expired: {}", e);
                Ok(())
            }
            Err(e) => {
                warn!("Token expired and refresh failed: {}", e);
                self.force_sign_out();
                Err(e)
            }
        }
    }

    /// Get a valid access token, refreshing if needed
    pub async fn access_token(&self) -> Result<String, AuthError> {
        self.refresh_if_needed().await?;
        self.store
            .current()
            .map(|session| session.access_token)
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Drive background token refresh from app lifecycle transitions:
    /// started when the app becomes active, stopped when backgrounded.
    pub fn set_app_active(self: &Arc<Self>, active: bool) {
        if active {
            self.start_auto_refresh();
        } else {
            self.stop_auto_refresh();
        }
    }

    /// Start the periodic background refresh task (idempotent)
    pub fn start_auto_refresh(self: &Arc<Self>) {
        let mut task = self.refresh_task.lock().unwrap();
        if task.is_some() {
            return;
        }

        info!("Starting background token refresh");
        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(AUTO_REFRESH_INTERVAL);
            loop {
                interval.tick().await;
                match manager.refresh_if_needed().await {
                    Ok(()) | Err(AuthError::NotAuthenticated) => {}
                    Err(e) => debug!("Background refresh: {}", e),
                }
            }
        }));
    }

    /// Stop the background refresh task if it is running
    pub fn stop_auto_refresh(&self) {
        let mut task = self.refresh_task.lock().unwrap();
        if let Some(task) = task.take() {
            info!("Stopping background token refresh");
            task.abort();
        }
    }

    /// Local sign-out after the backend invalidated the session
    fn force_sign_out(&self) {
        if let Err(e) = self.storage.clear_session() {
            warn!("Failed to clear session during forced sign-out: {}", e);
        }
        self.store.publish(AuthEvent::SignedOut, None);
    }
}

impl Drop for AuthManager {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}

/// Build a session from a token grant, falling back to the submitted
/// email when the backend omits one
fn session_from(response: TokenResponse, fallback_email: &str) -> AuthSession {
    let TokenResponse {
        access_token,
        refresh_token,
        expires_in,
        user,
    } = response;

    AuthSession {
        access_token,
        refresh_token,
        expires_at: Utc::now() + Duration::seconds(expires_in),
        user: UserInfo {
            id: user.id,
            email: user.email.unwrap_or_else(|| fallback_email.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::{RemoteUser, SignUpResponse};
    use crate::gate::{route_for, Route};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Configurable in-memory backend that counts remote calls
    struct FakeAuthApi {
        sign_in_calls: AtomicUsize,
        sign_up_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        sign_in_error: Option<String>,
        grant_session_on_sign_up: bool,
        refresh_error: Option<AuthError>,
    }

    impl Default for FakeAuthApi {
        fn default() -> Self {
            Self {
                sign_in_calls: AtomicUsize::new(0),
                sign_up_calls: AtomicUsize::new(0),
                refresh_calls: AtomicUsize::new(0),
                sign_in_error: None,
                grant_session_on_sign_up: false,
                refresh_error: None,
            }
        }
    }

    fn token_response(user_id: &str, email: &str, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: format!("access-{}", user_id),
            refresh_token: format!("refresh-{}", user_id),
            expires_in,
            user: RemoteUser {
                id: user_id.to_string(),
                email: Some(email.to_string()),
            },
        }
    }

    #[async_trait]
    impl AuthApi for FakeAuthApi {
        async fn sign_in_with_password(
            &self,
            email: &str,
            _password: &str,
        ) -> Result<TokenResponse, AuthError> {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            match &self.sign_in_error {
                Some(message) => Err(AuthError::ApiError(message.clone())),
                None => Ok(token_response("user-1", email, 3600)),
            }
        }

        async fn sign_up(
            &self,
            email: &str,
            _password: &str,
        ) -> Result<SignUpResponse, AuthError> {
            self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
            if self.grant_session_on_sign_up {
                Ok(SignUpResponse {
                    access_token: Some("access-new".to_string()),
                    refresh_token: Some("refresh-new".to_string()),
                    expires_in: Some(3600),
                    user: RemoteUser {
                        id: "user-new".to_string(),
                        email: Some(email.to_string()),
                    },
                })
            } else {
                Ok(SignUpResponse {
                    access_token: None,
                    refresh_token: None,
                    expires_in: None,
                    user: RemoteUser {
                        id: "user-new".to_string(),
                        email: Some(email.to_string()),
                    },
                })
            }
        }

        async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse, AuthError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            match &self.refresh_error {
                Some(AuthError::RefreshTokenInvalid) => Err(AuthError::RefreshTokenInvalid),
                Some(e) => Err(AuthError::NetworkError(e.to_string())),
                None => Ok(token_response("user-1", "test@example.com", 3600)),
            }
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    fn make_manager(
        api: FakeAuthApi,
    ) -> (
        Arc<AuthManager>,
        Arc<SessionStore>,
        Arc<FakeAuthApi>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SecureStorage::with_dir(dir.path().to_path_buf()).unwrap();
        let store = Arc::new(SessionStore::new());
        let api = Arc::new(api);
        let manager = Arc::new(AuthManager::new(
            Arc::clone(&api) as Arc<dyn AuthApi>,
            storage,
            Arc::clone(&store),
        ));
        (manager, store, api, dir)
    }

    #[tokio::test]
    async fn test_sign_in_rejects_malformed_email_without_remote_call() {
        let (manager, store, api, _dir) = make_manager(FakeAuthApi::default());

        for email in ["", "plainaddress", "missing@tld", "a b@c.com"] {
            let err = manager.sign_in(email, "password").await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }

        assert_eq!(api.sign_in_calls.load(Ordering::SeqCst), 0);
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_rejects_empty_password_without_remote_call() {
        let (manager, _store, api, _dir) = make_manager(FakeAuthApi::default());

        let err = manager.sign_in("a@b.com", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter your password");
        assert_eq!(api.sign_in_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_in_remote_error_surfaced_verbatim_after_one_call() {
        let (manager, store, api, _dir) = make_manager(FakeAuthApi {
            sign_in_error: Some("Invalid login credentials".to_string()),
            ..Default::default()
        });

        let err = manager.sign_in("a@b.com", "whatever").await.unwrap_err();
        match err {
            AuthError::ApiError(message) => assert_eq!(message, "Invalid login credentials"),
            other => panic!("unexpected error: {:?}", other),
        }
        // Exactly one remote call was made
        assert_eq!(api.sign_in_calls.load(Ordering::SeqCst), 1);
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_transitions_store_and_routes_to_account() {
        let (manager, store, _api, _dir) = make_manager(FakeAuthApi::default());
        assert!(store.current().is_none());

        manager.sign_in("a@b.com", "password").await.unwrap();

        let session = store.current().unwrap();
        assert_eq!(session.user.id, "user-1");
        assert_eq!(session.user.email, "a@b.com");
        assert_eq!(
            route_for(store.current().as_ref()),
            Route::Account {
                user_id: "user-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_sign_in_events_flow_through_subscription() {
        let (manager, store, _api, _dir) = make_manager(FakeAuthApi::default());

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        store.subscribe(move |event, _| {
            events_clone.lock().unwrap().push(event);
        });

        manager.sign_in("a@b.com", "password").await.unwrap();
        manager.sign_out().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![AuthEvent::Initial, AuthEvent::SignedIn, AuthEvent::SignedOut]
        );
    }

    #[tokio::test]
    async fn test_sign_up_rejects_weak_password_without_remote_call() {
        let (manager, _store, api, _dir) = make_manager(FakeAuthApi::default());

        let err = manager.sign_up("a@b.com", "weak").await.unwrap_err();
        match err {
            AuthError::SignUpValidation(errors) => {
                assert!(errors.email.is_none());
                assert!(errors.password.is_some());
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(api.sign_up_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_up_reports_both_field_errors() {
        let (manager, _store, _api, _dir) = make_manager(FakeAuthApi::default());

        let err = manager.sign_up("bad", "weak").await.unwrap_err();
        match err {
            AuthError::SignUpValidation(errors) => {
                assert!(errors.email.is_some());
                assert!(errors.password.is_some());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sign_up_without_session_requires_confirmation() {
        let (manager, store, api, _dir) = make_manager(FakeAuthApi::default());

        let outcome = manager.sign_up("a@b.com", "Abcdef1!").await.unwrap();
        assert_eq!(outcome, SignUpOutcome::ConfirmationRequired);
        assert_eq!(api.sign_up_calls.load(Ordering::SeqCst), 1);
        // No session is granted until the email is confirmed
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_with_immediate_session_signs_in() {
        let (manager, store, _api, _dir) = make_manager(FakeAuthApi {
            grant_session_on_sign_up: true,
            ..Default::default()
        });

        let outcome = manager.sign_up("a@b.com", "Abcdef1!").await.unwrap();
        assert_eq!(outcome, SignUpOutcome::SignedIn);
        assert_eq!(store.user_id().as_deref(), Some("user-new"));
    }

    #[tokio::test]
    async fn test_sign_out_clears_store_and_storage() {
        let (manager, store, _api, dir) = make_manager(FakeAuthApi::default());

        manager.sign_in("a@b.com", "password").await.unwrap();
        assert!(store.is_signed_in());

        manager.sign_out().await.unwrap();
        assert!(store.current().is_none());

        // A freshly constructed manager finds nothing to restore
        let storage = SecureStorage::with_dir(dir.path().to_path_buf()).unwrap();
        assert!(storage.load_session().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_is_restored_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = SecureStorage::with_dir(dir.path().to_path_buf()).unwrap();
            let store = Arc::new(SessionStore::new());
            let manager =
                AuthManager::new(Arc::new(FakeAuthApi::default()), storage, Arc::clone(&store));
            manager.sign_in("a@b.com", "password").await.unwrap();
        }

        let storage = SecureStorage::with_dir(dir.path().to_path_buf()).unwrap();
        let store = Arc::new(SessionStore::new());
        let _manager =
            AuthManager::new(Arc::new(FakeAuthApi::default()), storage, Arc::clone(&store));
        assert_eq!(store.user_id().as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_refresh_skipped_while_token_valid() {
        let (manager, _store, api, _dir) = make_manager(FakeAuthApi::default());

        manager.sign_in("a@b.com", "password").await.unwrap();
        // expires_in is 3600s, well past the expiring-soon window
        manager.refresh_if_needed().await.unwrap();
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_refresh_token_forces_sign_out() {
        let (manager, store, _api, _dir) = make_manager(FakeAuthApi {
            refresh_error: Some(AuthError::RefreshTokenInvalid),
            ..Default::default()
        });

        // Sign in, then age the session past expiry
        manager.sign_in("a@b.com", "password").await.unwrap();
        let mut session = store.current().unwrap();
        session.expires_at = Utc::now() - Duration::hours(1);
        store.publish(AuthEvent::TokenRefreshed, Some(session));

        let err = manager.refresh_if_needed().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenInvalid));
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_transient_refresh_failure_keeps_unexpired_session() {
        let (manager, store, _api, _dir) = make_manager(FakeAuthApi {
            refresh_error: Some(AuthError::NetworkError("timeout".to_string())),
            ..Default::default()
        });

        manager.sign_in("a@b.com", "password").await.unwrap();
        // Expiring soon but not expired
        let mut session = store.current().unwrap();
        session.expires_at = Utc::now() + Duration::minutes(2);
        store.publish(AuthEvent::TokenRefreshed, Some(session));

        manager.refresh_if_needed().await.unwrap();
        assert!(store.is_signed_in());
    }

    #[tokio::test]
    async fn test_refresh_publishes_new_session() {
        let (manager, store, _api, _dir) = make_manager(FakeAuthApi::default());

        manager.sign_in("a@b.com", "password").await.unwrap();
        let mut session = store.current().unwrap();
        session.expires_at = Utc::now() - Duration::minutes(1);
        session.access_token = "stale".to_string();
        store.publish(AuthEvent::TokenRefreshed, Some(session));

        manager.refresh_if_needed().await.unwrap();
        let refreshed = store.current().unwrap();
        assert_eq!(refreshed.access_token, "access-user-1");
        assert!(!refreshed.is_expired());
    }

    #[tokio::test]
    async fn test_access_token_requires_session() {
        let (manager, _store, _api, _dir) = make_manager(FakeAuthApi::default());
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_auto_refresh_start_stop() {
        let (manager, _store, _api, _dir) = make_manager(FakeAuthApi::default());

        manager.set_app_active(true);
        assert!(manager.refresh_task.lock().unwrap().is_some());

        // Starting twice keeps the existing task
        manager.start_auto_refresh();
        assert!(manager.refresh_task.lock().unwrap().is_some());

        manager.set_app_active(false);
        assert!(manager.refresh_task.lock().unwrap().is_none());
    }
}
