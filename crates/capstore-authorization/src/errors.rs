//! Authorization failures
//!
//! Every variant here is answered with the same opaque response. The detail
//! only ever reaches the server log.

use capstore_core::StorageError;

/// Why a presented token was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// The request body did not decode into a usable token chain
    #[error("Malformed token: {reason}")]
    Malformed {
        /// Decode failure detail
        reason: String,
    },

    /// The recomputed chain signature differs from the carried one
    #[error("Signature mismatch for token {token_id}")]
    SignatureMismatch {
        /// Identifier carried by the token
        token_id: String,
    },

    /// No root key is stored for the carried identifier
    #[error("Unknown root key for token {token_id}")]
    UnknownRootKey {
        /// Identifier carried by the token
        token_id: String,
    },

    /// A caveat did not hold for this request
    #[error("Caveat {condition:?} failed: {reason}")]
    CaveatFailed {
        /// Condition name, e.g. `object`
        name: String,
        /// Full condition text
        condition: String,
        /// Checker failure detail
        reason: String,
    },

    /// The root key store could not answer
    #[error("Root key storage unavailable: {reason}")]
    StorageUnavailable {
        /// Collaborator failure detail
        reason: String,
    },
}

impl AuthorizationError {
    /// Create a malformed token error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::SignatureMismatch { .. } => "signature_mismatch",
            Self::UnknownRootKey { .. } => "unknown_root_key",
            Self::CaveatFailed { .. } => "caveat_failed",
            Self::StorageUnavailable { .. } => "storage_unavailable",
        }
    }

    pub(crate) fn from_root_key_lookup(token_id: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::UnknownRootKey {
                token_id: token_id.to_string(),
            },
            other => Self::StorageUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthorizationError>;
