//! Storage collaborator contracts
//!
//! Two independent key/value tables sit behind capstore: one for object
//! contents and one for root key material. Both must refuse to overwrite an
//! existing record on `put`, so a colliding identifier is surfaced instead of
//! silently replacing someone else's data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::identifiers::{ObjectId, RootKey, TokenId};

/// Error type for storage collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum StorageError {
    /// No record under this key
    #[error("Record not found: {key}")]
    NotFound {
        /// Key that was looked up
        key: String,
    },
    /// A record under this key already exists and was left untouched
    #[error("Record already exists: {key}")]
    AlreadyExists {
        /// Key that is already taken
        key: String,
    },
    /// The backend could not be reached or refused the operation
    #[error("Storage unavailable: {reason}")]
    Unavailable {
        /// Backend failure detail
        reason: String,
    },
    /// A stored record could not be decoded
    #[error("Corrupted record: {reason}")]
    Corrupted {
        /// Decode failure detail
        reason: String,
    },
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an already exists error
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create an unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a corrupted record error
    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::Corrupted {
            reason: reason.into(),
        }
    }
}

/// Object contents together with the media type they were stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Raw bytes as uploaded
    pub contents: Vec<u8>,
    /// Media type from the upload header or sniffed from the bytes
    pub content_type: String,
}

impl StoredObject {
    /// Bundle contents with their media type
    pub fn new(contents: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            content_type: content_type.into(),
        }
    }
}

/// Object table
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Load an object, `NotFound` if absent
    async fn get(&self, id: &ObjectId) -> Result<StoredObject, StorageError>;

    /// Create an object, `AlreadyExists` if the identifier is taken.
    ///
    /// Either the whole record is written or nothing is.
    async fn put(&self, id: &ObjectId, object: StoredObject) -> Result<(), StorageError>;

    /// Remove an object, `NotFound` if absent
    async fn delete(&self, id: &ObjectId) -> Result<(), StorageError>;
}

/// Root key table
#[async_trait]
pub trait RootKeyStorage: Send + Sync {
    /// Load the root key for a token, `NotFound` if absent
    async fn get(&self, id: &TokenId) -> Result<RootKey, StorageError>;

    /// Persist a freshly minted root key, `AlreadyExists` if the id is taken
    async fn put(&self, id: &TokenId, key: &RootKey) -> Result<(), StorageError>;

    /// Forget a root key. Deleting an absent key succeeds.
    async fn delete(&self, id: &TokenId) -> Result<(), StorageError>;
}
