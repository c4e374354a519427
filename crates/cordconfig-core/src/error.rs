//! Error types for the CORD config synchronizer
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for cordconfig operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the CORD config synchronizer
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Precondition violated by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Config factory registration rejected by the registry
    #[error("Registration error: {0}")]
    Registration(String),

    /// Lifecycle transition not allowed in the current state
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// A config payload could not be turned into a record
    #[error("Failed to decode {key} config for {subject}: {message}")]
    Decode {
        /// Config key (e.g. "accessDevice")
        key: String,
        /// Subject the config belongs to
        subject: String,
        /// What went wrong
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a registration error
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }

    /// Create a lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Create a decode error for a config payload
    pub fn decode(
        key: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Decode {
            key: key.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }
}
