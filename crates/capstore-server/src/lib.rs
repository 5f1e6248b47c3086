//! # Capstore Server
//!
//! HTTP front end for capstore: content is stored opaquely and every stored
//! object comes back with a capability token that is the only way to fetch
//! or delete it again.
//!
//! - [`config`]: layered [`ServiceConfig`]
//! - [`service`]: the axum router and its handlers
//! - [`sniff`]: media type detection for uploads without a `Content-Type`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod service;
pub mod sniff;

pub use config::ServiceConfig;
pub use service::{router, AppState, ServiceError};
pub use sniff::sniff_content_type;
