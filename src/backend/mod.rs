//! Managed backend auth: session refresh, password sign-in and the backend
//! session cookie pair.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod auth_client;
pub mod cookies;

pub use auth_client::{BackendAuthClient, RefreshOutcome, SessionRefresher};
pub use cookies::BackendCookies;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected backend response: {0}")]
    Decode(String),
}

/// Session issued by the backend auth endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until `access_token` expires
    pub expires_in: i64,
    #[serde(default)]
    pub user: Option<BackendUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Backend access token made available to handlers for RLS-scoped calls
#[derive(Debug, Clone, Default)]
pub struct BackendAccess(pub Option<String>);
