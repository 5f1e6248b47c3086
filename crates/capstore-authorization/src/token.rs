//! Capability tokens
//!
//! A token carries an identifier, an optional location label, an ordered list
//! of first-party caveats and a signature:
//!
//! ```text
//! sig_0     = HMAC-SHA256(root_key, identifier)
//! sig_{n+1} = HMAC-SHA256(sig_n, caveat_n)
//! ```
//!
//! Appending a caveat only needs the current signature, so holders can
//! attenuate a token offline. Removing, reordering or editing a caveat needs
//! the root key, which never leaves the server.
//!
//! On the wire a token is a JSON object and a presented credential is a JSON
//! array of tokens ([`TokenChain`]).

use capstore_core::TokenId;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::{AuthorizationError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of a chain signature in bytes
pub const SIGNATURE_LEN: usize = 32;

fn keyed_hash(key: &[u8], data: &[u8]) -> [u8; SIGNATURE_LEN] {
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// A first-party restriction carried by a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Caveat {
    /// Condition text, `"<name> <argument>"`
    #[serde(rename = "cid")]
    pub condition: String,
}

impl Caveat {
    /// Wrap a condition
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
        }
    }

    /// Condition name: everything before the first space
    pub fn name(&self) -> &str {
        split_condition(&self.condition).0
    }

    /// Condition argument: everything after the first space
    pub fn argument(&self) -> &str {
        split_condition(&self.condition).1
    }
}

/// Split `"<name> <argument>"` at the first space. A bare name has an empty
/// argument.
pub fn split_condition(condition: &str) -> (&str, &str) {
    condition.split_once(' ').unwrap_or((condition, ""))
}

/// Bearer capability bound to one root key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TokenWire", into = "TokenWire")]
pub struct CapabilityToken {
    identifier: TokenId,
    location: String,
    caveats: Vec<Caveat>,
    signature: [u8; SIGNATURE_LEN],
}

impl CapabilityToken {
    /// Start a chain with no caveats
    pub fn new(root_key: &[u8], identifier: TokenId, location: impl Into<String>) -> Self {
        let signature = keyed_hash(root_key, identifier.as_str().as_bytes());
        Self {
            identifier,
            location: location.into(),
            caveats: Vec::new(),
            signature,
        }
    }

    /// Append a caveat and fold it into the signature.
    ///
    /// The condition bytes are used exactly as given.
    pub fn add_first_party_caveat(&mut self, condition: impl Into<String>) {
        let caveat = Caveat::new(condition);
        self.signature = keyed_hash(&self.signature, caveat.condition.as_bytes());
        self.caveats.push(caveat);
    }

    /// Recompute the chain from `root_key` and compare with the carried
    /// signature in constant time
    pub fn verify_signature(&self, root_key: &[u8]) -> bool {
        let expected = self
            .caveats
            .iter()
            .fold(keyed_hash(root_key, self.identifier.as_str().as_bytes()), |sig, cav| {
                keyed_hash(&sig, cav.condition.as_bytes())
            });
        expected[..].ct_eq(&self.signature[..]).into()
    }

    /// Token identifier, the root key lookup key
    pub fn identifier(&self) -> &TokenId {
        &self.identifier
    }

    /// Origin label; empty when unset
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Caveats in insertion order
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// Current chain signature
    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }
}

/// JSON shape of a token
#[derive(Serialize, Deserialize)]
struct TokenWire {
    identifier: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    location: String,
    #[serde(default)]
    caveats: Vec<Caveat>,
    signature: String,
}

impl TryFrom<TokenWire> for CapabilityToken {
    type Error = String;

    fn try_from(wire: TokenWire) -> std::result::Result<Self, Self::Error> {
        let bytes =
            hex::decode(&wire.signature).map_err(|e| format!("signature is not hex: {e}"))?;
        let signature: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| {
                format!("signature has {} bytes, want {SIGNATURE_LEN}", b.len())
            })?;
        if wire.identifier.is_empty() {
            return Err("empty token identifier".to_string());
        }
        Ok(Self {
            identifier: TokenId::from_carried(wire.identifier),
            location: wire.location,
            caveats: wire.caveats,
            signature,
        })
    }
}

impl From<CapabilityToken> for TokenWire {
    fn from(token: CapabilityToken) -> Self {
        Self {
            identifier: token.identifier.as_str().to_string(),
            location: token.location,
            caveats: token.caveats,
            signature: hex::encode(token.signature),
        }
    }
}

/// Ordered tokens presented together: the primary token first, then any
/// discharges.
///
/// Discharge tokens are not issued by this service, so a chain that carries
/// anything besides the primary token never verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenChain(Vec<CapabilityToken>);

impl TokenChain {
    /// Chain holding a single token
    pub fn single(token: CapabilityToken) -> Self {
        Self(vec![token])
    }

    /// Decode a request payload
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(AuthorizationError::malformed("empty token payload"));
        }
        let chain: Self = serde_json::from_slice(bytes)
            .map_err(|e| AuthorizationError::malformed(format!("invalid token chain: {e}")))?;
        if chain.0.is_empty() {
            return Err(AuthorizationError::malformed("token chain is empty"));
        }
        Ok(chain)
    }

    /// Encode for a response body
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// The single token this service can verify
    pub fn primary(&self) -> Result<&CapabilityToken> {
        match self.0.as_slice() {
            [token] => Ok(token),
            [] => Err(AuthorizationError::malformed("token chain is empty")),
            [_, rest @ ..] => Err(AuthorizationError::malformed(format!(
                "{} discharge tokens presented, none are accepted",
                rest.len()
            ))),
        }
    }

    /// Mutable access to the primary token, for holder-side attenuation
    pub fn primary_mut(&mut self) -> Option<&mut CapabilityToken> {
        self.0.first_mut()
    }

    /// All tokens in presentation order
    pub fn tokens(&self) -> &[CapabilityToken] {
        &self.0
    }

    /// Number of tokens in the chain
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the chain holds no tokens
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
