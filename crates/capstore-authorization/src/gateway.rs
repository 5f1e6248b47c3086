//! Authorization gateway
//!
//! Per-request orchestration. Each request starts `Pending` and ends either
//! `Authorized` (an [`AuthorizedRequest`]) or `Rejected` (an
//! [`AuthorizationError`]):
//!
//! 1. decode the token chain from the request payload
//! 2. infer declared values
//! 3. bind a checker registry to the request context
//! 4. verify through the [`TokenEngine`]
//!
//! Rejections are logged here with full detail. Callers must not echo them
//! back to the client.

use capstore_core::{ObjectId, PhysicalClock, SystemClock, TokenId};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::checkers::{ActionScheme, CheckContext, CheckerRegistry, Operation};
use crate::declared::{infer_declared, Declared};
use crate::engine::TokenEngine;
use crate::errors::{AuthorizationError, Result};
use crate::token::TokenChain;

/// What the gateway needs to know about a request
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    /// Object identifier from the request path
    pub object: &'a str,
    /// Operation implied by the route
    pub operation: Operation,
    /// HTTP method
    pub method: &'a str,
    /// Observed peer address
    pub client_addr: Option<IpAddr>,
    /// `Origin` header
    pub origin: Option<&'a str>,
    /// Request payload carrying the token chain
    pub body: &'a [u8],
}

/// A request that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRequest {
    /// Object the token is valid for
    pub object: ObjectId,
    /// Token that authorized the request
    pub token_id: TokenId,
    /// Values the token declared
    pub declared: Declared,
}

/// Decides whether requests are authorized
#[derive(Clone)]
pub struct AuthorizationGateway {
    engine: TokenEngine,
    scheme: ActionScheme,
    clock: Arc<dyn PhysicalClock>,
}

impl AuthorizationGateway {
    /// Gateway using the system clock
    pub fn new(engine: TokenEngine, scheme: ActionScheme) -> Self {
        Self {
            engine,
            scheme,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock `time-before` caveats are evaluated against
    pub fn with_clock(mut self, clock: Arc<dyn PhysicalClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Engine used for minting and verification
    pub fn engine(&self) -> &TokenEngine {
        &self.engine
    }

    /// Configured action caveat kind
    pub fn scheme(&self) -> ActionScheme {
        self.scheme
    }

    /// Run a request through verification
    pub async fn authorize(&self, request: RequestInfo<'_>) -> Result<AuthorizedRequest> {
        match self.evaluate(request).await {
            Ok(authorized) => {
                debug!(
                    object = %authorized.object,
                    operation = %request.operation,
                    token_id = %authorized.token_id,
                    "Request authorized"
                );
                Ok(authorized)
            }
            Err(e) => {
                warn!(
                    object = request.object,
                    operation = %request.operation,
                    kind = e.kind(),
                    error = %e,
                    "Request rejected"
                );
                Err(e)
            }
        }
    }

    async fn evaluate(&self, request: RequestInfo<'_>) -> Result<AuthorizedRequest> {
        let chain = TokenChain::from_json(request.body)?;
        let object = ObjectId::parse(request.object)
            .map_err(|e| AuthorizationError::malformed(e.to_string()))?;
        let declared = infer_declared(&chain);

        let context = CheckContext {
            now: self.clock.now(),
            object: object.to_string(),
            operation: request.operation,
            method: request.method.to_string(),
            client_addr: request.client_addr,
            origin: request.origin.map(str::to_string),
        };
        let registry = CheckerRegistry::standard(self.scheme, context, declared);

        let token_id = self.engine.verify(&chain, &registry).await?;
        Ok(AuthorizedRequest {
            object,
            token_id,
            declared: registry.declared().clone(),
        })
    }
}

impl std::fmt::Debug for AuthorizationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGateway")
            .field("engine", &self.engine)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}
