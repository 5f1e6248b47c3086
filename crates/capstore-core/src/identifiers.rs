//! Identifiers minted by capstore
//!
//! [`ObjectId`] names a stored blob and is the subject of the binding caveat.
//! [`TokenId`] names the root key record behind one capability token.
//! [`RootKey`] is the secret itself and never leaves the server.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::errors::{CapstoreError, Result};

/// Bytes of entropy behind every object identifier
pub const OBJECT_ID_ENTROPY: usize = 32;

/// Bytes of entropy behind every token identifier
pub const TOKEN_ID_ENTROPY: usize = 24;

/// Length of a root key in bytes
pub const ROOT_KEY_LEN: usize = 24;

/// Longest object identifier accepted from a request path
const MAX_OBJECT_ID_LEN: usize = 256;

fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf).map_err(|e| CapstoreError::entropy(e.to_string()))
}

/// Opaque, unguessable identifier of a stored object
///
/// Rendered with the URL-safe base64 alphabet so it can be embedded in a
/// path segment without escaping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Mint a fresh identifier from the operating system entropy source
    pub fn generate() -> Result<Self> {
        let mut buf = [0u8; OBJECT_ID_ENTROPY];
        fill_random(&mut buf)?;
        Ok(Self(base64::engine::general_purpose::URL_SAFE.encode(buf)))
    }

    /// Accept an identifier arriving from outside, e.g. a request path
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || raw.len() > MAX_OBJECT_ID_LEN {
            return Err(CapstoreError::not_found(format!(
                "object identifier has invalid length {}",
                raw.len()
            )));
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='))
        {
            return Err(CapstoreError::not_found(
                "object identifier contains characters outside the URL-safe alphabet",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a capability token and of its root key record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Mint a fresh token identifier
    pub fn generate() -> Result<Self> {
        let mut buf = [0u8; TOKEN_ID_ENTROPY];
        fill_random(&mut buf)?;
        Ok(Self(hex::encode(buf)))
    }

    /// Wrap an identifier carried by a presented token
    pub fn from_carried(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secret key at the root of one token's signature chain
///
/// Zeroized on drop. `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct RootKey(Zeroizing<Vec<u8>>);

impl RootKey {
    /// Generate a fresh root key
    pub fn generate() -> Result<Self> {
        let mut buf = Zeroizing::new(vec![0u8; ROOT_KEY_LEN]);
        fill_random(buf.as_mut_slice())?;
        Ok(Self(buf))
    }

    /// Rebuild a key loaded from a root key store
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Borrow the key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RootKey").field(&"<redacted>").finish()
    }
}
