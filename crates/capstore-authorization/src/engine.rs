//! Token engine
//!
//! Mints root tokens and verifies presented ones against the root key store
//! and a request's checker registry.

use capstore_core::{CapstoreError, RootKey, RootKeyStorage, TokenId};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::checkers::CheckerRegistry;
use crate::errors::{AuthorizationError, Result};
use crate::token::{CapabilityToken, TokenChain};

/// Issues and verifies capability tokens
#[derive(Clone)]
pub struct TokenEngine {
    root_keys: Arc<dyn RootKeyStorage>,
    location: String,
}

impl TokenEngine {
    /// Create an engine over a root key store
    pub fn new(root_keys: Arc<dyn RootKeyStorage>) -> Self {
        Self {
            root_keys,
            location: String::new(),
        }
    }

    /// Stamp minted tokens with an origin label
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Origin label stamped on minted tokens
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Mint a token carrying exactly one caveat, `binding_condition`.
    ///
    /// A fresh root key is generated and stored under a fresh token
    /// identifier before the token is returned.
    pub async fn mint(
        &self,
        binding_condition: &str,
    ) -> std::result::Result<CapabilityToken, CapstoreError> {
        let token_id = TokenId::generate()?;
        let root_key = RootKey::generate()?;
        self.root_keys.put(&token_id, &root_key).await?;

        let mut token = CapabilityToken::new(root_key.as_bytes(), token_id, self.location.clone());
        token.add_first_party_caveat(binding_condition);

        debug!(
            token_id = %token.identifier(),
            condition = binding_condition,
            "Minted capability token"
        );
        Ok(token)
    }

    /// Verify a presented chain.
    ///
    /// The signature is checked before any caveat is evaluated, so a forged
    /// or truncated chain never reaches the checkers. Caveats are evaluated in
    /// carried order and the first failure is returned.
    pub async fn verify(&self, chain: &TokenChain, registry: &CheckerRegistry) -> Result<TokenId> {
        let token = chain.primary()?;
        let token_id = token.identifier();

        let root_key = self
            .root_keys
            .get(token_id)
            .await
            .map_err(|e| AuthorizationError::from_root_key_lookup(token_id.as_str(), e))?;

        if !token.verify_signature(root_key.as_bytes()) {
            return Err(AuthorizationError::SignatureMismatch {
                token_id: token_id.to_string(),
            });
        }

        for caveat in token.caveats() {
            registry
                .check(&caveat.condition)
                .map_err(|failure| AuthorizationError::CaveatFailed {
                    name: caveat.name().to_string(),
                    condition: caveat.condition.clone(),
                    reason: failure.to_string(),
                })?;
        }

        debug!(
            token_id = %token_id,
            caveats = token.caveats().len(),
            "Capability token verified"
        );
        Ok(token_id.clone())
    }

    /// Forget the root key behind `token_id`.
    ///
    /// Tokens rooted in it stop verifying. Failures are logged and swallowed:
    /// an orphaned key is harmless.
    pub async fn revoke(&self, token_id: &TokenId) {
        if let Err(e) = self.root_keys.delete(token_id).await {
            warn!(token_id = %token_id, error = %e, "Failed to reclaim root key");
        }
    }
}

impl std::fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEngine")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
