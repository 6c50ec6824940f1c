//! Request-layer error type.
//!
//! DESIGN
//! ======
//! Every failure the backend or the transport produces collapses into one
//! `ApiError`. Its `Display` is the user-facing message and callers branch on
//! that text, never on the HTTP status.

/// Message used when a request never completed.
pub const NETWORK_ERROR_MESSAGE: &str = "Network request failed";

/// Message used when a failure response body is not JSON.
pub const UNPARSEABLE_ERROR_MESSAGE: &str = "An error occurred";

/// Message used when a failure body is JSON but carries no `error` string.
pub const MISSING_ERROR_MESSAGE: &str = "Request failed";

/// Errors produced by request-layer calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never reached the server or the connection dropped.
    #[error("{NETWORK_ERROR_MESSAGE}")]
    Transport,

    /// The server answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// A success body could not be decoded into the expected record.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The HTTP client or request URL could not be built.
    #[error("client setup failed: {0}")]
    Client(String),
}

impl ApiError {
    /// User-facing message for this error.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// HTTP status when the server rejected the request.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull the user-facing message out of a failure response body.
///
/// Mirrors the backend's `{ "error": "..." }` convention. Never fails: an
/// unparseable body yields [`UNPARSEABLE_ERROR_MESSAGE`].
#[must_use]
pub fn rejection_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return UNPARSEABLE_ERROR_MESSAGE.to_owned();
    };
    value
        .get("error")
        .and_then(serde_json::Value::as_str)
        .filter(|message| !message.is_empty())
        .unwrap_or(MISSING_ERROR_MESSAGE)
        .to_owned()
}

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;
