//! In-memory storage handlers for testing
//!
//! Each handler is a single map behind one mutex. Nothing is persisted and
//! memory use is unbounded, so these are not meant for production.

use async_trait::async_trait;
use capstore_core::{
    ObjectId, ObjectStorage, RootKey, RootKeyStorage, StorageError, StoredObject, TokenId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory object table
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStorage {
    objects: Arc<Mutex<HashMap<ObjectId, StoredObject>>>,
}

impl MemoryObjectStorage {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn get(&self, id: &ObjectId) -> Result<StoredObject, StorageError> {
        self.objects
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(id.as_str()))
    }

    async fn put(&self, id: &ObjectId, object: StoredObject) -> Result<(), StorageError> {
        let mut objects = self.objects.lock();
        if objects.contains_key(id) {
            return Err(StorageError::already_exists(id.as_str()));
        }
        objects.insert(id.clone(), object);
        Ok(())
    }

    async fn delete(&self, id: &ObjectId) -> Result<(), StorageError> {
        self.objects
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(id.as_str()))
    }
}

/// In-memory root key table
///
/// Entries are not dropped when their object is deleted, so a token for a
/// deleted object still verifies and gets a 404. The table therefore grows
/// with every minted token until `TokenEngine::revoke` removes an entry.
#[derive(Debug, Clone, Default)]
pub struct MemoryRootKeyStorage {
    keys: Arc<Mutex<HashMap<TokenId, RootKey>>>,
}

impl MemoryRootKeyStorage {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored root keys
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

#[async_trait]
impl RootKeyStorage for MemoryRootKeyStorage {
    async fn get(&self, id: &TokenId) -> Result<RootKey, StorageError> {
        self.keys
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(id.as_str()))
    }

    async fn put(&self, id: &TokenId, key: &RootKey) -> Result<(), StorageError> {
        let mut keys = self.keys.lock();
        if keys.contains_key(id) {
            return Err(StorageError::already_exists(id.as_str()));
        }
        keys.insert(id.clone(), key.clone());
        Ok(())
    }

    async fn delete(&self, id: &TokenId) -> Result<(), StorageError> {
        self.keys.lock().remove(id);
        Ok(())
    }
}
