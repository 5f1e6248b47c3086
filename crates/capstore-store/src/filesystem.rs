//! Filesystem storage handlers
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/objects/<blake3(id)>.json     {"id", "content_type", "contents"}
//! <root>/root-keys/<blake3(id)>.json   {"id", "key"}
//! ```
//!
//! Records are created atomically: the envelope is written and synced to a
//! temporary file, then hard-linked into place. Linking fails if the target
//! name exists, which gives the same no-overwrite guarantee a primary key
//! constraint would. A crash leaves at most a stray temporary file, never a
//! partial record.

use async_trait::async_trait;
use base64::Engine;
use capstore_core::{
    ObjectId, ObjectStorage, RootKey, RootKeyStorage, StorageError, StoredObject, TokenId,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const OBJECTS_DIR: &str = "objects";
const ROOT_KEYS_DIR: &str = "root-keys";

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Opens the on-disk tables under one root directory
///
/// The root key table is never pruned on its own: keys outlive the objects
/// they were minted for, so a token for a deleted object answers 404 rather
/// than 403. Each minted token adds one file until `TokenEngine::revoke`
/// deletes it.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Create the directory layout if missing
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for dir in [root.clone(), root.join(OBJECTS_DIR), root.join(ROOT_KEYS_DIR)] {
            create_private_dir(&dir)?;
        }
        info!(root = %root.display(), "Opened filesystem storage");
        Ok(Self { root })
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Object table handler
    pub fn objects(&self) -> FilesystemObjectStorage {
        FilesystemObjectStorage {
            table: Table::new(self.root.join(OBJECTS_DIR)),
        }
    }

    /// Root key table handler
    pub fn root_keys(&self) -> FilesystemRootKeyStorage {
        FilesystemRootKeyStorage {
            table: Table::new(self.root.join(ROOT_KEYS_DIR)),
        }
    }
}

fn create_private_dir(dir: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        StorageError::unavailable(format!("failed to create {}: {e}", dir.display()))
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(DIR_MODE)).map_err(
            |e| StorageError::unavailable(format!("failed to restrict {}: {e}", dir.display())),
        )?;
    }
    Ok(())
}

/// One directory of JSON envelopes keyed by record id
#[derive(Debug, Clone)]
struct Table {
    dir: PathBuf,
}

impl Table {
    fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Record ids come from clients; hashing them keeps file names fixed
    /// length and free of path separators.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", blake3::hash(key.as_bytes()).to_hex()))
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        let bytes = match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::not_found(key));
            }
            Err(e) => return Err(StorageError::unavailable(format!("read {key}: {e}"))),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::corrupted(format!("record {key}: {e}")))
    }

    async fn create<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| StorageError::unavailable(format!("encode {key}: {e}")))?;
        let temp = self.temp_path()?;

        let result = async {
            write_new_file(&temp, &bytes)
                .await
                .map_err(|e| StorageError::unavailable(format!("write {key}: {e}")))?;
            match tokio::fs::hard_link(&temp, self.path_for(key)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    Err(StorageError::already_exists(key))
                }
                Err(e) => Err(StorageError::unavailable(format!("commit {key}: {e}"))),
            }
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&temp).await {
            if e.kind() != ErrorKind::NotFound {
                debug!(path = %temp.display(), error = %e, "Failed to remove temporary file");
            }
        }
        result
    }

    /// Remove a record; `Ok(false)` if it did not exist
    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::unavailable(format!("delete {key}: {e}"))),
        }
    }

    fn temp_path(&self) -> Result<PathBuf, StorageError> {
        let mut nonce = [0u8; 12];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| StorageError::unavailable(format!("temporary file name: {e}")))?;
        Ok(self.dir.join(format!(".tmp-{}", hex::encode(nonce))))
    }
}

async fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);
    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[derive(Serialize, Deserialize)]
struct ObjectRecord {
    id: String,
    content_type: String,
    contents: String,
}

#[derive(Serialize, Deserialize)]
struct RootKeyRecord {
    id: String,
    key: String,
}

fn ensure_id(expected: &str, found: &str) -> Result<(), StorageError> {
    if expected == found {
        Ok(())
    } else {
        Err(StorageError::corrupted(format!(
            "record for {expected} claims id {found}"
        )))
    }
}

/// Object table on disk
#[derive(Debug, Clone)]
pub struct FilesystemObjectStorage {
    table: Table,
}

#[async_trait]
impl ObjectStorage for FilesystemObjectStorage {
    async fn get(&self, id: &ObjectId) -> Result<StoredObject, StorageError> {
        let record: ObjectRecord = self.table.read(id.as_str()).await?;
        ensure_id(id.as_str(), &record.id)?;
        let contents = base64::engine::general_purpose::STANDARD
            .decode(record.contents)
            .map_err(|e| StorageError::corrupted(format!("contents of {id}: {e}")))?;
        Ok(StoredObject::new(contents, record.content_type))
    }

    async fn put(&self, id: &ObjectId, object: StoredObject) -> Result<(), StorageError> {
        let record = ObjectRecord {
            id: id.to_string(),
            content_type: object.content_type,
            contents: base64::engine::general_purpose::STANDARD.encode(object.contents),
        };
        self.table.create(id.as_str(), &record).await
    }

    async fn delete(&self, id: &ObjectId) -> Result<(), StorageError> {
        if self.table.remove(id.as_str()).await? {
            Ok(())
        } else {
            Err(StorageError::not_found(id.as_str()))
        }
    }
}

/// Root key table on disk
#[derive(Debug, Clone)]
pub struct FilesystemRootKeyStorage {
    table: Table,
}

#[async_trait]
impl RootKeyStorage for FilesystemRootKeyStorage {
    async fn get(&self, id: &TokenId) -> Result<RootKey, StorageError> {
        let record: RootKeyRecord = self.table.read(id.as_str()).await?;
        ensure_id(id.as_str(), &record.id)?;
        let key = hex::decode(&record.key)
            .map_err(|e| StorageError::corrupted(format!("root key {id}: {e}")))?;
        Ok(RootKey::from_bytes(key))
    }

    async fn put(&self, id: &TokenId, key: &RootKey) -> Result<(), StorageError> {
        let record = RootKeyRecord {
            id: id.to_string(),
            key: hex::encode(key.as_bytes()),
        };
        self.table.create(id.as_str(), &record).await
    }

    async fn delete(&self, id: &TokenId) -> Result<(), StorageError> {
        self.table.remove(id.as_str()).await.map(|_| ())
    }
}
