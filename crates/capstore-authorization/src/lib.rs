//! # Capstore Authorization
//!
//! **Purpose**: Issue capability tokens for stored objects and decide whether a
//! presented token authorizes a request.
//!
//! ## Core Concepts
//!
//! - **Capability token**: an HMAC chain rooted in a per-token secret. Anyone
//!   may append a caveat; nobody without the root key may remove one.
//! - **Caveat**: a `"<name> <argument>"` condition. Every caveat must pass.
//! - **Checker registry**: the fixed set of condition names this service
//!   understands, bound to one request's context. Unknown names fail closed.
//! - **Declared values**: informational `declared <key> <value>` claims
//!   inferred from a token before verification.
//!
//! ## Flow
//!
//! ```text
//! create:   TokenEngine::mint("object <id>") -> TokenChain (JSON array)
//! fetch/delete:
//!   body -> TokenChain::from_json -> infer_declared
//!        -> CheckerRegistry::standard(scheme, context, declared)
//!        -> TokenEngine::verify -> AuthorizedRequest | AuthorizationError
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Per-request caveat checkers
pub mod checkers;

/// Declared value inference
pub mod declared;

/// Token minting and verification
pub mod engine;

/// Authorization error taxonomy
pub mod errors;

/// Per-request authorization orchestration
pub mod gateway;

/// HMAC-chain capability token primitive and wire format
pub mod token;

pub use checkers::{
    object_caveat, ActionScheme, CheckContext, CheckFailure, CheckerFn, CheckerRegistry,
    Operation,
};
pub use declared::{infer_declared, Declared};
pub use engine::TokenEngine;
pub use errors::{AuthorizationError, Result};
pub use gateway::{AuthorizationGateway, AuthorizedRequest, RequestInfo};
pub use token::{CapabilityToken, Caveat, TokenChain};
