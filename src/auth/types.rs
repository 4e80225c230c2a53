// Authentication types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Credential pair held for the signed-in user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &token_prefix(&self.access_token))
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(token_prefix),
            )
            .finish()
    }
}

/// First few characters of a token, safe to log
pub fn token_prefix(token: &str) -> String {
    let visible: String = token.chars().take(6).collect();
    format!("{}...", visible)
}

/// Token payload returned by the refresh and sign-in endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Sign-in request body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Lifecycle notifications for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh replaced the access token
    Refreshed,
    /// Refresh failed; the user has to sign in again
    Expired,
    /// Credentials were removed by an explicit sign-out
    SignedOut,
}
