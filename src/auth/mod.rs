//! Authentication module
//!
//! Handles authentication against the hosted backend:
//! - Email/password sign-in and sign-up with local validation
//! - Secure session storage (data dir file + platform keyring)
//! - Token refresh driven by app foreground/background transitions

pub mod http_client;
pub mod manager;
pub mod storage;
pub mod types;
pub mod validation;

pub use http_client::AuthClient;
pub use manager::{AuthManager, SignUpOutcome};
pub use storage::SecureStorage;
pub use types::*;
