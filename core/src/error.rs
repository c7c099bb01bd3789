//! Error types for the session client.
//!
//! # Design
//! `TransportError` and `RenewalError` are `Clone` because one renewal
//! outcome is handed to every request that was waiting on it. `ApiError` is
//! what `dispatch` returns: status failures keep the raw status and body, and
//! `detail()` pulls the server's human-readable message out of the JSON body
//! (`{"detail": ...}` or `{"error": ...}`).

use thiserror::Error;

/// The request never produced an HTTP response.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("unable to reach the server: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request error: {0}")]
    Request(String),
}

/// The session could not be renewed. Terminal for the current session.
#[derive(Debug, Clone, Error)]
pub enum RenewalError {
    #[error("session renewal rejected (status: {status}): {}", detail_message(.body))]
    Rejected { status: u16, body: String },

    #[error("session renewal failed: {0}")]
    Transport(#[from] TransportError),

    /// The renewal task ended without producing an outcome.
    #[error("session renewal interrupted: {0}")]
    Interrupted(String),
}

/// Errors returned by `SessionClient::dispatch` and the helpers built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a non-2xx status.
    #[error("{} (status: {status})", detail_message(.body))]
    Status { status: u16, body: String },

    /// The request hit an expired session and the renewal failed.
    #[error(transparent)]
    Renewal(#[from] RenewalError),

    #[error("serialization failed: {0}")]
    SerializationError(String),

    #[error("deserialization failed: {0}")]
    DeserializationError(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided message for status failures.
    pub fn detail(&self) -> Option<String> {
        match self {
            ApiError::Status { body, .. } => Some(detail_message(body)),
            ApiError::Renewal(RenewalError::Rejected { body, .. }) => Some(detail_message(body)),
            _ => None,
        }
    }

    /// True when the session is gone and the user has to log in again.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, ApiError::Renewal(_))
    }
}

fn detail_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            if let Some(serde_json::Value::String(message)) = map.get(key) {
                return message.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "an error occurred".to_string()
    } else {
        trimmed.to_string()
    }
}
