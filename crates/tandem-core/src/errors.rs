//! Unified error type for mutation coordination
//!
//! Every checkpoint settles to either a value or a `MutationError`. Because a
//! single settlement is handed to every observer of a latch, the error is
//! `Clone` and carries only owned, serialisable data.

use serde::{Deserialize, Serialize};

/// Error carried by a rejected checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum MutationError {
    /// A store procedure failed to apply the mutation
    #[error("Store error: {message}")]
    Store {
        /// Error message reported by the store
        message: String,
    },

    /// A converter rejected a value while forwarding it between records
    #[error("Conversion error: {message}")]
    Conversion {
        /// Error message describing the conversion failure
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Every producer handle to a pending latch was dropped
    #[error("Checkpoint abandoned before settlement")]
    Abandoned,

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl MutationError {
    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a conversion error
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for mutation operations
pub type Result<T> = std::result::Result<T, MutationError>;

/// Terminal outcome of a latch
pub type Settlement<T> = std::result::Result<T, MutationError>;

impl From<std::io::Error> for MutationError {
    fn from(err: std::io::Error) -> Self {
        Self::store(err.to_string())
    }
}
