//! # Capstore Core - Foundation
//!
//! **Purpose**: Shared vocabulary for the capstore workspace.
//!
//! This crate defines the types every other layer speaks in terms of:
//!
//! - **Identifiers**: unguessable object identifiers, token identifiers and
//!   root key material
//! - **Errors**: the unified [`CapstoreError`] taxonomy for non-authorization
//!   failures
//! - **Effects**: the storage collaborator contracts ([`ObjectStorage`],
//!   [`RootKeyStorage`]) and the physical clock
//!
//! # Architecture Constraints
//!
//! - YES Pure types and trait definitions
//! - NO storage handler implementations (that's `capstore-store`)
//! - NO token cryptography (that's `capstore-authorization`)
//! - NO HTTP concerns (that's `capstore-server`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Effect traits for storage collaborators and time
pub mod effects;

/// Unified error type
pub mod errors;

/// Object, token and key identifiers
pub mod identifiers;

pub use effects::{
    FixedClock, ObjectStorage, PhysicalClock, RootKeyStorage, StorageError, StoredObject,
    SystemClock,
};
pub use errors::{CapstoreError, Result};
pub use identifiers::{ObjectId, RootKey, TokenId};
