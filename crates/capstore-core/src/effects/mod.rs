//! Effect traits consumed by the capability engine and the HTTP surface
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `capstore-store` (storage), this crate (clocks)
//! - **Usage**: token engine (root keys), HTTP surface (objects), gateway (time)

pub mod storage;
pub mod time;

pub use storage::{ObjectStorage, RootKeyStorage, StorageError, StoredObject};
pub use time::{FixedClock, PhysicalClock, SystemClock};
