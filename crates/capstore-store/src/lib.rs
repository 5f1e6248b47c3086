//! # Capstore Store - Storage handlers
//!
//! Implementations of the [`ObjectStorage`](capstore_core::ObjectStorage)
//! and [`RootKeyStorage`](capstore_core::RootKeyStorage) effects.
//!
//! - [`memory`]: mutex-guarded maps for tests and throwaway deployments
//! - [`filesystem`]: one file per record with atomic create, for anything
//!   that has to survive a restart

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod filesystem;
pub mod memory;

pub use filesystem::{FilesystemObjectStorage, FilesystemRootKeyStorage, FilesystemStore};
pub use memory::{MemoryObjectStorage, MemoryRootKeyStorage};
