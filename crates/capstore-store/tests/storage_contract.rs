//! Both storage backends against the collaborator contract
//!
//! - `put` never overwrites: a second put under the same id is `AlreadyExists`
//!   and the first record survives
//! - object `delete` of a missing id is `NotFound`, every time
//! - root key `delete` is idempotent

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_matches::assert_matches;
use capstore_core::{
    ObjectId, ObjectStorage, RootKey, RootKeyStorage, StorageError, StoredObject, TokenId,
};
use capstore_store::{FilesystemStore, MemoryObjectStorage, MemoryRootKeyStorage};

async fn exercise_objects(store: &dyn ObjectStorage) {
    let id = ObjectId::generate().unwrap();
    assert_matches!(store.get(&id).await, Err(StorageError::NotFound { .. }));

    store
        .put(&id, StoredObject::new(b"hunter2".to_vec(), "something/something"))
        .await
        .expect("first put succeeds");

    let loaded = store.get(&id).await.expect("stored object loads");
    assert_eq!(loaded.contents, b"hunter2");
    assert_eq!(loaded.content_type, "something/something");

    assert_matches!(
        store
            .put(&id, StoredObject::new(b"overwrite".to_vec(), "text/plain"))
            .await,
        Err(StorageError::AlreadyExists { .. })
    );
    assert_eq!(store.get(&id).await.unwrap().contents, b"hunter2");

    store.delete(&id).await.expect("delete succeeds");
    for _ in 0..3 {
        assert_matches!(store.delete(&id).await, Err(StorageError::NotFound { .. }));
    }
    assert_matches!(store.get(&id).await, Err(StorageError::NotFound { .. }));
}

async fn exercise_root_keys(store: &dyn RootKeyStorage) {
    let id = TokenId::generate().unwrap();
    let key = RootKey::generate().unwrap();

    assert_matches!(store.get(&id).await, Err(StorageError::NotFound { .. }));
    store.put(&id, &key).await.expect("put succeeds");
    assert_eq!(store.get(&id).await.unwrap(), key);

    let other = RootKey::generate().unwrap();
    assert_matches!(
        store.put(&id, &other).await,
        Err(StorageError::AlreadyExists { .. })
    );
    assert_eq!(store.get(&id).await.unwrap(), key);

    store.delete(&id).await.expect("delete succeeds");
    store.delete(&id).await.expect("deleting again succeeds");
    assert_matches!(store.get(&id).await, Err(StorageError::NotFound { .. }));
}

#[tokio::test]
async fn memory_objects_follow_contract() {
    exercise_objects(&MemoryObjectStorage::new()).await;
}

#[tokio::test]
async fn memory_root_keys_follow_contract() {
    exercise_root_keys(&MemoryRootKeyStorage::new()).await;
}

#[tokio::test]
async fn filesystem_objects_follow_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::open(dir.path()).unwrap();
    exercise_objects(&store.objects()).await;
}

#[tokio::test]
async fn filesystem_root_keys_follow_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::open(dir.path()).unwrap();
    exercise_root_keys(&store.root_keys()).await;
}

#[tokio::test]
async fn filesystem_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = ObjectId::generate().unwrap();
    let binary: Vec<u8> = (0..=255).collect();

    {
        let store = FilesystemStore::open(dir.path()).unwrap();
        store
            .objects()
            .put(&id, StoredObject::new(binary.clone(), "application/octet-stream"))
            .await
            .unwrap();
    }

    let reopened = FilesystemStore::open(dir.path()).unwrap();
    let loaded = reopened.objects().get(&id).await.unwrap();
    assert_eq!(loaded.contents, binary);
}

#[tokio::test]
async fn filesystem_leaves_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::open(dir.path()).unwrap();
    let objects = store.objects();
    let id = ObjectId::generate().unwrap();

    objects.put(&id, StoredObject::new(b"a".to_vec(), "text/plain")).await.unwrap();
    let _ = objects.put(&id, StoredObject::new(b"b".to_vec(), "text/plain")).await;

    let names: Vec<String> = std::fs::read_dir(dir.path().join("objects"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1, "unexpected files: {names:?}");
    assert!(names[0].ends_with(".json"));
}

#[tokio::test]
async fn filesystem_detects_swapped_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::open(dir.path()).unwrap();
    let objects = store.objects();

    let a = ObjectId::generate().unwrap();
    let b = ObjectId::generate().unwrap();
    objects.put(&a, StoredObject::new(b"a".to_vec(), "text/plain")).await.unwrap();
    objects.put(&b, StoredObject::new(b"b".to_vec(), "text/plain")).await.unwrap();

    let path_of = |id: &ObjectId| {
        dir.path()
            .join("objects")
            .join(format!("{}.json", blake3::hash(id.as_str().as_bytes()).to_hex()))
    };
    std::fs::copy(path_of(&a), path_of(&b)).unwrap();

    assert_matches!(objects.get(&b).await, Err(StorageError::Corrupted { .. }));
}
