//! Profile module
//!
//! Fetch-on-mount and upsert-on-save against the user's profile row,
//! plus the avatar upload chain (upload, resolve public URL, persist).

pub mod editor;
pub mod http_client;
pub mod types;

pub use editor::{LoadState, ProfileEditor};
pub use http_client::ProfileClient;
pub use types::*;
