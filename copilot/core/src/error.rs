//! Insight Failure Taxonomy
//!
//! Every way an insight request can go wrong ends up as one [`InsightError`].
//! The [`ErrorSink`] is the only place that turns such an error into session
//! state, so a failing stream always lands in a terminal `Error` status with a
//! message the user can read, instead of spinning forever.

use thiserror::Error;
use tracing::{debug, warn};

use crate::session::SessionState;
use crate::streaming::DecodeError;

/// Coarse failure category, used for logging and retry decisions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credential missing or rejected
    Auth,
    /// Connection never opened, timed out, or dropped
    Transport,
    /// Response bytes are not valid UTF-8 text
    Decode,
    /// Backend answered with a non-success status
    Server,
}

/// Network-level failures
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be sent
    #[error("could not reach {url}: {reason}")]
    Connect {
        /// Endpoint that was being contacted
        url: String,
        /// Underlying reason reported by the HTTP client
        reason: String,
    },
    /// No response or no data within the configured window
    #[error("timed out: {0}")]
    TimedOut(String),
    /// The connection closed abnormally mid-stream
    #[error("connection dropped: {0}")]
    Dropped(String),
}

/// A failure that ends an insight session
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InsightError {
    /// Credential missing or rejected (HTTP 401/403)
    #[error("authorization failed: {0}")]
    Auth(String),
    /// Connection problem before or during the stream
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Bytes could not be decoded as text
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Non-success status before streaming began
    #[error("server returned {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or canonical reason
        message: String,
    },
}

impl InsightError {
    /// Error for a request attempted without any credential
    #[must_use]
    pub fn missing_credential() -> Self {
        Self::Auth("no access token available, log in first".to_string())
    }

    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unknown status")
                .to_string()
        } else {
            body.to_string()
        };

        match status {
            401 | 403 => Self::Auth(message),
            _ => Self::Server { status, message },
        }
    }

    /// Classify an error raised by the HTTP client while sending a request
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            TransportError::TimedOut(format!("no response from {url}")).into()
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), "")
        } else if err.is_body() || err.is_decode() {
            TransportError::Dropped(err.to_string()).into()
        } else {
            TransportError::Connect {
                url: url.to_string(),
                reason: err.to_string(),
            }
            .into()
        }
    }

    /// Failure category
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) => ErrorKind::Auth,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Server { .. } => ErrorKind::Server,
        }
    }

    /// Whether starting a fresh session may succeed without user action
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Message suitable for showing next to the insight text
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(_) => "Your session is not authorized. Please log in again.".to_string(),
            Self::Transport(TransportError::TimedOut(_)) => {
                "The insight service took too long to respond. Try again.".to_string()
            }
            Self::Transport(_) => {
                "Lost connection to the insight service. Try again.".to_string()
            }
            Self::Decode(_) => "The insight response was garbled and could not be shown.".to_string(),
            Self::Server { status, .. } => {
                format!("The insight service is unavailable right now (status {status}).")
            }
        }
    }
}

/// Converts failures into terminal session state
///
/// Stateless; it exists so every failure path funnels through one function
/// that never panics and never leaves a session half-finished.
pub struct ErrorSink;

impl ErrorSink {
    /// Drive `state` to `Error` for `error`
    ///
    /// Returns `true` if the state changed. Terminal or cancelled sessions are
    /// left untouched.
    pub fn absorb(state: &mut SessionState, error: &InsightError) -> bool {
        if state.is_settled() {
            debug!(
                session = %state.id(),
                error = %error,
                "ignoring failure for settled session"
            );
            return false;
        }

        warn!(
            session = %state.id(),
            kind = ?error.kind(),
            status = ?state.status(),
            revealed = state.reveal_index(),
            error = %error,
            "insight stream failed"
        );

        state.fail_with(error.user_message())
    }
}
