//! Error types for controller access.

use thiserror::Error;

/// Failure to reach a controller's status endpoint.
///
/// The display strings are what ends up in a controller's `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The request did not complete within the timeout.
    #[error("Connection timeout")]
    Timeout,

    /// Nothing accepted the connection.
    #[error("Connection refused - unable to reach controller")]
    Refused,

    /// The controller answered with something other than 200.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Any other transport or protocol failure.
    #[error("Connection error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Classify a transport failure reported by reqwest.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectionError::Timeout
        } else if err.is_connect() {
            ConnectionError::Refused
        } else {
            ConnectionError::Transport(err.to_string())
        }
    }
}

/// Errors constructing or driving a [`ControllerClient`](crate::ControllerClient).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid controller URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl Error {
    pub(crate) fn invalid_url(url: &str, reason: impl std::fmt::Display) -> Self {
        Error::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
