//! Navigation gate
//!
//! Pure function of session store state: which top-level view the
//! shell should render.

use crate::auth::types::AuthSession;

/// Top-level route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Authenticated profile view, keyed by user id so the shell
    /// builds a fresh view instance per distinct user
    Account { user_id: String },
    /// Unauthenticated login/signup flow
    Auth,
}

/// Decide the route for the current session state.
pub fn route_for(session: Option<&AuthSession>) -> Route {
    match session {
        Some(session) => Route::Account {
            user_id: session.user.id.clone(),
        },
        None => Route::Auth,
    }
}
