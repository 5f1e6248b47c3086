//! Unified error system for capstore
//!
//! Authorization failures live in `capstore-authorization` because they all
//! collapse to one opaque response. Everything else a request can fail with
//! is expressed here.

use serde::{Deserialize, Serialize};

use crate::effects::StorageError;

/// Unified error type for capstore operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CapstoreError {
    /// The requested record does not exist
    #[error("Not found: {message}")]
    StorageNotFound {
        /// What was not found
        message: String,
    },

    /// A record with the same identifier already exists
    #[error("Conflict: {message}")]
    StorageConflict {
        /// Which identifier collided
        message: String,
    },

    /// The storage collaborator reported a failure
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Collaborator failure detail
        message: String,
    },

    /// The operating system entropy source failed
    #[error("Entropy source unavailable: {message}")]
    Entropy {
        /// Error reported by the entropy source
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Which setting is invalid and why
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl CapstoreError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::StorageNotFound {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::StorageConflict {
            message: message.into(),
        }
    }

    /// Create a storage unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create an entropy error
    pub fn entropy(message: impl Into<String>) -> Self {
        Self::Entropy {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means the addressed record is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StorageNotFound { .. })
    }
}

impl From<StorageError> for CapstoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => Self::not_found(key),
            StorageError::AlreadyExists { key } => Self::conflict(key),
            StorageError::Unavailable { reason } => Self::unavailable(reason),
            StorageError::Corrupted { reason } => {
                Self::unavailable(format!("corrupted record: {reason}"))
            }
        }
    }
}

/// Standard Result type for capstore operations
pub type Result<T> = std::result::Result<T, CapstoreError>;
