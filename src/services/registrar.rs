// src/services/registrar.rs
//! DID registration service.
//!
//! Creates DIDs by building the owner's document, uploading it to the content
//! store and anchoring its hash in the registry, and exposes the registry's
//! read-only owner and hash lookups.

use crate::contracts::did_registry::{Confirmation, RegistryAnchor};
use crate::error::Result;
use crate::models::did::DIDDocument;
use crate::models::identifier::Did;
use crate::storage::ContentStore;
use crate::wallet::key_management::KeyManager;
use chrono::Utc;
use ethers::types::Address;
use log::info;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// File name hint for uploaded documents.
pub const DOCUMENT_FILE_NAME: &str = "did.json";

/// Everything produced by a successful [`DidRegistrar::create`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub did: Did,
    pub document: DIDDocument,
    pub content_hash: String,
    pub confirmation: Confirmation,
}

/// Service for creating and inspecting registry entries.
#[derive(Clone)]
pub struct DidRegistrar {
    registry: Arc<dyn RegistryAnchor>,
    store: Arc<dyn ContentStore>,
}

impl DidRegistrar {
    pub fn new(registry: Arc<dyn RegistryAnchor>, store: Arc<dyn ContentStore>) -> Self {
        Self { registry, store }
    }

    /// Creates `did`, owned by `signer`.
    ///
    /// # Arguments
    /// * `did` - A `did:go` identifier whose id fits in 32 bytes
    /// * `signer` - Owner key; its public key goes into the document
    /// * `cancel` - Aborts the upload or registration when triggered
    ///
    /// # Returns
    /// The built document with its content hash and the registry confirmation
    ///
    /// # Errors
    /// [`DidError::Validation`](crate::error::DidError::Validation) before any
    /// network call if the DID cannot be registered; otherwise any store or
    /// registry error.
    pub async fn create(
        &self,
        did: &Did,
        signer: &KeyManager,
        cancel: &CancellationToken,
    ) -> Result<Registration> {
        let did = did.without_fragment();
        did.ensure_registrable()?;

        let document = DIDDocument::build(&did, &signer.public_key_bytes(), Utc::now())?;
        let content_hash = self
            .store
            .upload(DOCUMENT_FILE_NAME, document.to_json_bytes()?, cancel)
            .await?;
        info!("Uploaded document for {} as {}", did, content_hash);

        let confirmation = self
            .registry
            .register(did.registry_key(), &content_hash, cancel)
            .await?;
        info!(
            "Registered {} in transaction {:?}",
            did, confirmation.tx_hash
        );

        Ok(Registration {
            did,
            document,
            content_hash,
            confirmation,
        })
    }

    /// Account controlling `did` in the registry.
    pub async fn owner(&self, did: &Did, cancel: &CancellationToken) -> Result<Address> {
        self.registry.owner(did.registry_key(), cancel).await
    }

    /// Content hash anchored for `did`, if any.
    pub async fn hash(&self, did: &Did, cancel: &CancellationToken) -> Result<Option<String>> {
        self.registry.resolve_hash(did.registry_key(), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::did_registry::InMemoryRegistry;
    use crate::error::DidError;
    use crate::storage::memory_store::InMemoryContentStore;

    fn setup(signer: &KeyManager) -> (InMemoryContentStore, DidRegistrar) {
        let store = InMemoryContentStore::new();
        let registry = InMemoryRegistry::new(signer.address());
        let registrar = DidRegistrar::new(Arc::new(registry), Arc::new(store.clone()));
        (store, registrar)
    }

    #[tokio::test]
    async fn create_anchors_document() {
        let signer = KeyManager::generate();
        let (store, registrar) = setup(&signer);
        let cancel = CancellationToken::new();
        let did = Did::parse("did:go:abc123").unwrap();

        let reg = registrar.create(&did, &signer, &cancel).await.unwrap();
        assert_eq!(reg.document.public_keys[0].id, "did:go:abc123#owner");
        assert_eq!(
            registrar.hash(&did, &cancel).await.unwrap(),
            Some(reg.content_hash.clone())
        );
        assert_eq!(registrar.owner(&did, &cancel).await.unwrap(), signer.address());

        let stored = store.fetch(&reg.content_hash, &cancel).await.unwrap();
        assert_eq!(DIDDocument::from_json_bytes(&stored).unwrap(), reg.document);
    }

    #[tokio::test]
    async fn rejects_unregistrable_dids_before_upload() {
        let signer = KeyManager::generate();
        let (store, registrar) = setup(&signer);
        let cancel = CancellationToken::new();

        let oversize = format!("did:go:{}", "a".repeat(33));
        for raw in ["did:web:abc123", oversize.as_str()] {
            let did = Did::parse(raw).unwrap();
            let err = registrar.create(&did, &signer, &cancel).await.unwrap_err();
            assert!(matches!(err, DidError::Validation(_)), "{}", raw);
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_did_has_no_hash() {
        let signer = KeyManager::generate();
        let (_, registrar) = setup(&signer);
        let did = Did::parse("did:go:nobody").unwrap();
        let cancel = CancellationToken::new();
        assert_eq!(registrar.hash(&did, &cancel).await.unwrap(), None);
        assert_eq!(registrar.owner(&did, &cancel).await.unwrap(), Address::zero());
    }
}
