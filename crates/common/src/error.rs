//! Common error types for hubwatch components.

use std::fmt;

/// A specialized Result type for hubwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for hubwatch operations.
///
/// Anything surfacing as this type while a controller is being checked is
/// treated as unanticipated and lands the controller in the `error` state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Event bus error: {0}")]
    EventBus(String),

    #[error("Controller client error: {0}")]
    Client(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new store error.
    pub fn store(msg: impl fmt::Display) -> Self {
        Error::Store(msg.to_string())
    }

    /// Create a new credential error.
    pub fn credential(msg: impl fmt::Display) -> Self {
        Error::Credential(msg.to_string())
    }

    /// Create a new event bus error.
    pub fn event_bus(msg: impl fmt::Display) -> Self {
        Error::EventBus(msg.to_string())
    }

    /// Create a new controller client error.
    pub fn client(msg: impl fmt::Display) -> Self {
        Error::Client(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::credential("bad padding").to_string(),
            "Credential error: bad padding"
        );
        assert_eq!(Error::store("pool closed").to_string(), "Store error: pool closed");
    }
}
