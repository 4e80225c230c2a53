// Error handling module
// Defines the error taxonomy surfaced to callers of the client

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Category of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Unknown,
}

impl TransportErrorKind {
    /// Categorize a reqwest error for logging and reporting
    pub fn of(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_request() || err.is_builder() {
            TransportErrorKind::Request
        } else if err.is_body() {
            TransportErrorKind::Body
        } else if err.is_decode() {
            TransportErrorKind::Decode
        } else {
            TransportErrorKind::Unknown
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connection_failed",
            TransportErrorKind::Request => "request_error",
            TransportErrorKind::Body => "body_error",
            TransportErrorKind::Decode => "decode_error",
            TransportErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The request never produced an HTTP response
#[derive(Error, Debug, Clone)]
#[error("{kind} while calling {url}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn from_reqwest(err: &reqwest::Error, url: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::of(err), url, err.to_string())
    }
}

/// Errors returned by the authenticated client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network unreachable, timeout, etc. No refresh is attempted.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request was rejected with 401 again after a successful refresh
    #[error("Authorization failed after credential refresh: {0}")]
    AuthorizationFailed(String),

    /// Credential refresh failed and the stored credentials were cleared
    #[error("Re-authentication required: {0}")]
    ReauthenticationRequired(String),

    /// Credential refresh did not complete in time
    #[error("Credential refresh timed out after {}ms", .0.as_millis())]
    RefreshTimeout(Duration),

    /// The caller abandoned the request
    #[error("Request cancelled")]
    Cancelled,

    /// Non-success status from the backend
    #[error("API error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Sign-in rejected by the backend
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// True when the caller has to sign in again before any further request can succeed
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            ApiError::ReauthenticationRequired(_) | ApiError::RefreshTimeout(_)
        )
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
