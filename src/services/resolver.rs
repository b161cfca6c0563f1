// src/services/resolver.rs
//! DID resolution service.
//!
//! Turns a DID into its current DID Document by reading the anchored content
//! hash from the registry and fetching the content from the store. This is
//! the only path by which a document re-enters the system after anchoring.

use crate::contracts::did_registry::RegistryAnchor;
use crate::error::{DidError, Result};
use crate::models::did::DIDDocument;
use crate::models::identifier::Did;
use crate::storage::ContentStore;
use log::debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Resolves DIDs through a registry and a content store.
///
/// Holds no cache: every call returns a freshly decoded document.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<dyn RegistryAnchor>,
    store: Arc<dyn ContentStore>,
}

impl Resolver {
    pub fn new(registry: Arc<dyn RegistryAnchor>, store: Arc<dyn ContentStore>) -> Self {
        Self { registry, store }
    }

    /// Resolves `did` to its anchored document.
    ///
    /// Any fragment on `did` is ignored.
    ///
    /// # Errors
    /// - [`DidError::DocumentNotFound`] if no hash is anchored for the DID
    /// - [`DidError::NotFound`] / [`DidError::Network`] from the content store
    /// - [`DidError::Encoding`] if the content is not a DID Document
    pub async fn resolve(&self, did: &Did, cancel: &CancellationToken) -> Result<DIDDocument> {
        let subject = did.without_fragment();
        let hash = self
            .registry
            .resolve_hash(subject.registry_key(), cancel)
            .await?
            .ok_or_else(|| DidError::DocumentNotFound(subject.to_string()))?;
        debug!("Resolving {} from {}", subject, hash);

        let bytes = self.store.fetch(&hash, cancel).await?;
        DIDDocument::from_json_bytes(&bytes)
    }

    /// Parses `did` and resolves it.
    pub async fn resolve_str(&self, did: &str, cancel: &CancellationToken) -> Result<DIDDocument> {
        let did = Did::parse(did)?;
        self.resolve(&did, cancel).await
    }
}
