// src/services/api_server.rs
//! API Server for the DID anchoring system
//!
//! This module provides the REST API interface for the DID system.
//!
//! The API is built using Axum and includes endpoints for:
//! - DID creation, resolution, owner and hash lookup
//! - Verifiable credential issuance and verification
//!
//! Every request gets a child of the server's shutdown token, so pressing
//! ctrl-c aborts in-flight registry and store calls with `503`.

use crate::contracts::did_registry::RegistryAnchor;
use crate::error::DidError;
use crate::models::credential::{CredentialMeta, VerifiableCredential, VerificationResult};
use crate::models::did::DIDDocument;
use crate::models::identifier::Did;
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::registrar::DidRegistrar;
use crate::services::resolver::Resolver;
use crate::services::verifier::Verifier;
use crate::storage::ContentStore;
use crate::wallet::key_management::KeyManager;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use ethers::types::{Address, H256};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

// API request and response structures

/// Request payload for creating a new DID
#[derive(Serialize, Deserialize)]
struct CreateDidRequest {
    did: String,
}

/// Response payload for DID creation
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDidResponse {
    did: String,
    content_hash: String,
    tx_hash: H256,
    block_number: Option<u64>,
}

#[derive(Serialize, Deserialize)]
struct OwnerResponse {
    did: String,
    owner: Address,
}

#[derive(Serialize, Deserialize)]
struct HashResponse {
    did: String,
    hash: String,
}

/// Request payload for credential issuance
#[derive(Serialize, Deserialize)]
struct IssueCredentialRequest {
    id: String,
    #[serde(rename = "type")]
    types: Vec<String>,
    issuer: String,
    subject: String,
    /// Subject claims
    #[serde(default)]
    data: Map<String, Value>,
}

/// An error rendered as `{"error": message}` with a status per error kind.
#[derive(Debug)]
pub struct ApiError(DidError);

impl From<DidError> for ApiError {
    fn from(err: DidError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            DidError::Parse(_) | DidError::Validation(_) | DidError::Encoding(_) => {
                StatusCode::BAD_REQUEST
            }
            DidError::NotFound(_) | DidError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            DidError::Verification { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DidError::Network(_) => StatusCode::BAD_GATEWAY,
            DidError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DidError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            DidError::Config(_) | DidError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Replaces the empty `408` of the timeout layer with a JSON `504`.
async fn timeout_as_json(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return ApiError(DidError::Timeout("request timed out".into())).into_response();
    }
    response
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// API server state containing all service dependencies
pub struct ApiServer {
    registrar: DidRegistrar,
    resolver: Resolver,
    verifier: Verifier,
    /// Issuer backed by the configured key; `None` disables signing routes
    issuer: Option<CredentialIssuer>,
    signer: Option<Arc<KeyManager>>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `registry` - Registry anchor used for create, owner, hash and resolve
    /// * `store` - Content store holding DID Documents
    /// * `signer` - Key for `POST /dids` and `POST /credentials`, if configured
    /// * `request_timeout` - Deadline applied to every request
    pub fn new(
        registry: Arc<dyn RegistryAnchor>,
        store: Arc<dyn ContentStore>,
        signer: Option<Arc<KeyManager>>,
        request_timeout: Duration,
    ) -> Self {
        let resolver = Resolver::new(registry.clone(), store.clone());
        ApiServer {
            registrar: DidRegistrar::new(registry, store),
            verifier: Verifier::new(resolver.clone()),
            resolver,
            issuer: signer.clone().map(CredentialIssuer::new),
            signer,
            request_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelled when the server shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Builds the application router.
    pub fn router(self: Arc<Self>) -> Router {
        let timeout = self.request_timeout;
        Router::new()
            .route("/dids", post(Self::create_did_handler))
            .route("/dids/:did", get(Self::resolve_did_handler))
            .route("/dids/:did/owner", get(Self::owner_handler))
            .route("/dids/:did/hash", get(Self::hash_handler))
            .route("/credentials", post(Self::issue_credential_handler))
            .route("/credentials/verify", post(Self::verify_credential_handler))
            .layer(
                ServiceBuilder::new()
                    .layer(map_response(timeout_as_json))
                    .layer(TimeoutLayer::new(timeout)),
            )
            .with_state(self)
    }

    /// Starts the API server and serves until ctrl-c.
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on {}", listener.local_addr()?);

        let shutdown = self.shutdown.clone();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                trigger.cancel();
            }
        });

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    }

    fn signer(&self) -> Result<&Arc<KeyManager>, DidError> {
        self.signer
            .as_ref()
            .ok_or_else(|| DidError::Config(config::ConfigError::NotFound("private_key".into())))
    }

    // =====================
    // DID Management Handlers
    // =====================

    /// Creates and anchors a new DID owned by the configured key
    ///
    /// # Endpoint
    /// POST /dids
    async fn create_did_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateDidRequest>,
    ) -> ApiResult<CreateDidResponse> {
        let did = Did::parse(&payload.did).map_err(DidError::from)?;
        let signer = state.signer()?;
        let cancel = state.shutdown.child_token();

        let registration = state.registrar.create(&did, signer, &cancel).await?;
        Ok(Json(CreateDidResponse {
            did: registration.did.to_string(),
            content_hash: registration.content_hash,
            tx_hash: registration.confirmation.tx_hash,
            block_number: registration.confirmation.block_number,
        }))
    }

    /// Resolves a DID to its anchored document
    ///
    /// # Endpoint
    /// GET /dids/:did
    async fn resolve_did_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
    ) -> ApiResult<DIDDocument> {
        let cancel = state.shutdown.child_token();
        Ok(Json(state.resolver.resolve_str(&did, &cancel).await?))
    }

    /// GET /dids/:did/owner
    async fn owner_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
    ) -> ApiResult<OwnerResponse> {
        let parsed = Did::parse(&did).map_err(DidError::from)?;
        let cancel = state.shutdown.child_token();
        let owner = state.registrar.owner(&parsed, &cancel).await?;
        Ok(Json(OwnerResponse { did, owner }))
    }

    /// GET /dids/:did/hash
    async fn hash_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
    ) -> ApiResult<HashResponse> {
        let parsed = Did::parse(&did).map_err(DidError::from)?;
        let cancel = state.shutdown.child_token();
        let hash = state
            .registrar
            .hash(&parsed, &cancel)
            .await?
            .ok_or_else(|| DidError::DocumentNotFound(did.clone()))?;
        Ok(Json(HashResponse { did, hash }))
    }

    // =====================
    // Credential Handlers
    // =====================

    /// Issues a credential signed by the configured key
    ///
    /// # Endpoint
    /// POST /credentials
    async fn issue_credential_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<IssueCredentialRequest>,
    ) -> ApiResult<VerifiableCredential> {
        state.signer()?;
        let issuer = state
            .issuer
            .as_ref()
            .ok_or_else(|| DidError::Signing("issuer unavailable".into()))?;
        let meta = CredentialMeta {
            id: payload.id,
            types: payload.types,
            issuer: payload.issuer,
            subject: payload.subject,
        };
        Ok(Json(issuer.issue(&meta, payload.data)?))
    }

    /// Verifies a credential against its issuer's anchored document
    ///
    /// # Endpoint
    /// POST /credentials/verify
    async fn verify_credential_handler(
        State(state): State<Arc<ApiServer>>,
        Json(credential): Json<VerifiableCredential>,
    ) -> ApiResult<VerificationResult> {
        let cancel = state.shutdown.child_token();
        Ok(Json(state.verifier.verify(&credential, &cancel).await?))
    }
}
