//! Loftly Core Library
//!
//! Account, session, and profile functionality for the Loftly client
//! app. The UI shell drives these flows and renders whatever the
//! navigation gate decides.

pub mod auth;
pub mod config;
pub mod gate;
pub mod profile;
pub mod session;

// Re-export commonly used items
pub use auth::manager::{AuthManager, SignUpOutcome};
pub use config::BackendConfig;
pub use gate::{route_for, Route};
pub use session::{AuthEvent, SessionStore};
