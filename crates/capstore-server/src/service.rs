//! HTTP surface
//!
//! ```text
//! POST   <prefix>      store the body, answer with a capability token
//! POST   <prefix><id>  fetch the object the presented token is bound to
//! DELETE <prefix><id>  delete it
//! ```
//!
//! Tokens travel in the request body as a JSON array. Every authorization
//! failure is answered with the same 403 body; the reason is only logged.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, Path, State},
    http::{
        header::{CONTENT_TYPE, LOCATION, ORIGIN},
        HeaderMap, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use capstore_authorization::{
    object_caveat, AuthorizationGateway, AuthorizedRequest, Operation, RequestInfo, TokenChain,
    TokenEngine,
};
use capstore_core::{ObjectId, ObjectStorage, RootKeyStorage, StorageError, StoredObject};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::ServiceConfig;
use crate::sniff::sniff_content_type;

/// Shared state of the request handlers
#[derive(Clone)]
pub struct AppState {
    gateway: AuthorizationGateway,
    objects: Arc<dyn ObjectStorage>,
    prefix: Arc<str>,
}

impl AppState {
    /// Bundle the handlers' collaborators; `prefix` must end in `/`
    pub fn new(
        gateway: AuthorizationGateway,
        objects: Arc<dyn ObjectStorage>,
        prefix: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            gateway,
            objects,
            prefix: prefix.into(),
        }
    }

    /// Wire up state from configuration and storage handlers
    pub fn from_config(
        config: &ServiceConfig,
        objects: Arc<dyn ObjectStorage>,
        root_keys: Arc<dyn RootKeyStorage>,
    ) -> Self {
        let engine = TokenEngine::new(root_keys).with_location(config.location.clone());
        let gateway = AuthorizationGateway::new(engine, config.action_scheme);
        Self::new(gateway, objects, config.normalized_prefix())
    }

    /// Route prefix, ending in `/`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gateway", &self.gateway)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Build the router for `state`
pub fn router(state: AppState, max_object_size: usize) -> Router {
    let prefix = state.prefix().to_string();
    Router::new()
        .route(&prefix, post(create))
        .route(&format!("{prefix}:object"), post(retrieve).delete(remove))
        .layer(DefaultBodyLimit::max(max_object_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Failure responses. Bodies are fixed strings so nothing about the cause
/// reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceError {
    /// Token missing, malformed, forged or not satisfied
    Forbidden,
    /// Object absent
    NotFound,
    /// Storage or entropy failure
    Internal,
}

impl ServiceError {
    /// Log `detail` and map to an internal error
    fn internal(context: &str, detail: impl Display) -> Self {
        error!(error = %detail, "{context}");
        Self::Internal
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Forbidden => (StatusCode::FORBIDDEN, "authorization failed"),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error"),
        };
        (status, body).into_response()
    }
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(|| sniff_content_type(&body).to_string(), str::to_string);

    let id = ObjectId::generate()
        .map_err(|e| ServiceError::internal("Failed to create an object ID", e))?;
    let size = body.len();

    // Token first: a failure here leaves at most an unused root key, never
    // an object nobody can reach.
    let engine = state.gateway.engine();
    let token = engine
        .mint(&object_caveat(&id))
        .await
        .map_err(|e| ServiceError::internal("Failed to mint capability token", e))?;
    let token_id = token.identifier().clone();
    let payload = match TokenChain::single(token).to_json() {
        Ok(payload) => payload,
        Err(e) => {
            engine.revoke(&token_id).await;
            return Err(ServiceError::internal("Failed to encode capability token", e));
        }
    };

    if let Err(e) = state
        .objects
        .put(&id, StoredObject::new(body.to_vec(), content_type.clone()))
        .await
    {
        engine.revoke(&token_id).await;
        return Err(ServiceError::internal("Failed to store content", e));
    }

    info!(object = %id, content_type = %content_type, size, "Object created");
    Ok((
        [
            (LOCATION, format!("{}{id}", state.prefix)),
            (CONTENT_TYPE, "application/json".to_string()),
        ],
        payload,
    )
        .into_response())
}

async fn retrieve(
    State(state): State<AppState>,
    Path(object): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let authorized = authorize(
        &state,
        &object,
        Operation::Fetch,
        &method,
        peer,
        &headers,
        &body,
    )
    .await?;

    let stored = state
        .objects
        .get(&authorized.object)
        .await
        .map_err(|e| storage_failure("Failed to load content", &authorized, e))?;

    debug!(object = %authorized.object, size = stored.contents.len(), "Object fetched");
    Ok(([(CONTENT_TYPE, stored.content_type)], stored.contents).into_response())
}

async fn remove(
    State(state): State<AppState>,
    Path(object): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ServiceError> {
    let authorized = authorize(
        &state,
        &object,
        Operation::Delete,
        &method,
        peer,
        &headers,
        &body,
    )
    .await?;

    state
        .objects
        .delete(&authorized.object)
        .await
        .map_err(|e| storage_failure("Failed to delete content", &authorized, e))?;

    info!(object = %authorized.object, token_id = %authorized.token_id, "Object deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn authorize(
    state: &AppState,
    object: &str,
    operation: Operation,
    method: &Method,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<AuthorizedRequest, ServiceError> {
    let request = RequestInfo {
        object,
        operation,
        method: method.as_str(),
        client_addr: peer.map(|ConnectInfo(addr)| addr.ip()),
        origin: headers.get(ORIGIN).and_then(|value| value.to_str().ok()),
        body,
    };
    // The gateway logs the rejection reason
    state
        .gateway
        .authorize(request)
        .await
        .map_err(|_| ServiceError::Forbidden)
}

fn storage_failure(
    context: &str,
    authorized: &AuthorizedRequest,
    err: StorageError,
) -> ServiceError {
    match err {
        StorageError::NotFound { .. } => {
            debug!(object = %authorized.object, "Object not found");
            ServiceError::NotFound
        }
        other => ServiceError::internal(context, other),
    }
}
