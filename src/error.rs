//! Error types for roundtable operations.
//!
//! Errors are layered: [`ConfigurationError`] is raised while validating a start
//! request, [`BackendError`] by the language model backend during a step, and
//! [`RoundtableError`] wraps both for the orchestrator's public API.

use std::time::Duration;
use thiserror::Error;

/// A start request was rejected before any state transition took place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The topic is empty or whitespace only.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// No backend credential was supplied.
    #[error("a backend credential is required")]
    MissingCredential,

    /// Number of participants is outside the supported range.
    #[error("agent count must be between {min} and {max}, got {count}")]
    AgentCount { count: usize, min: usize, max: usize },

    /// `max_turns` must allow at least one turn.
    #[error("max_turns must be at least 1")]
    ZeroTurns,

    /// The model identifier is empty.
    #[error("model id must not be empty")]
    EmptyModel,
}

/// Errors reported by the language model backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request could not be completed (network, HTTP status, quota).
    #[error("Backend request failed: {message}")]
    Request {
        /// HTTP status code, if the failure came from a response.
        status_code: Option<u16>,
        /// Human readable message, including the provider's error status.
        message: String,
        /// Whether sending the same request again may succeed.
        is_retryable: bool,
        /// Delay suggested by the provider (`Retry-After`).
        retry_after: Option<Duration>,
    },

    /// The provider answered but the body could not be interpreted.
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// The provider answered with no usable text.
    #[error("Backend returned no text: {0}")]
    EmptyResponse(String),

    /// The credential was missing or rejected before a request was made.
    #[error("Invalid credential: {0}")]
    Credential(String),

    /// The request did not finish in time.
    #[error("Backend request timed out after {0:?}")]
    Timeout(Duration),

    /// A generic error for other cases.
    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Creates a request error from an HTTP status.
    pub fn http(status_code: u16, message: impl Into<String>, is_retryable: bool) -> Self {
        Self::Request {
            status_code: Some(status_code),
            message: message.into(),
            is_retryable,
            retry_after: None,
        }
    }

    /// Creates a request error that never reached the provider.
    pub fn transport(message: impl Into<String>, is_retryable: bool) -> Self {
        Self::Request {
            status_code: None,
            message: message.into(),
            is_retryable,
            retry_after: None,
        }
    }

    /// Whether sending the same request again may succeed.
    ///
    /// This is informational. The orchestrator never retries on its own; the
    /// next invocation of `step` is the retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Request { is_retryable, .. } => *is_retryable,
            BackendError::Timeout(_) => true,
            BackendError::MalformedResponse(_)
            | BackendError::EmptyResponse(_)
            | BackendError::Credential(_)
            | BackendError::Other(_) => false,
        }
    }

    /// Delay suggested by the provider before trying again, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BackendError::Request { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Top-level error for roundtable operations.
#[derive(Debug, Error)]
pub enum RoundtableError {
    /// A start request failed validation.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A backend call failed; the conversation state was not modified.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A conversation state violates its invariants.
    #[error("Invalid conversation state: {0}")]
    InvalidState(String),

    /// Reading or writing durable session storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RoundtableError {
    /// Creates an invalid-state error.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }

    /// Returns the backend error, if this error came from a backend call.
    pub fn as_backend(&self) -> Option<&BackendError> {
        match self {
            RoundtableError::Backend(err) => Some(err),
            _ => None,
        }
    }
}
