//! Error types for state persistence.

use std::io;
use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing persisted sync state.
#[derive(Debug, Error)]
pub enum StateError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A persisted value could not be parsed.
    #[error("corrupt value for key {key:?}: {message}")]
    Corrupt {
        /// The key whose value failed to parse.
        key: String,
        /// Parse failure description.
        message: String,
    },

    /// A key contains characters the backend cannot store.
    #[error("invalid state key {0:?}")]
    InvalidKey(String),
}

impl StateError {
    /// Creates a corrupt-value error.
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }
}
