// src/storage/memory_store.rs
//! In-process content store keyed by Keccak-256.

use super::ContentStore;
use crate::error::{DidError, Result};
use crate::utils::cancel::with_cancel;
use crate::utils::crypto::hash_data;
use async_trait::async_trait;
use ethers::utils::hex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Content store holding blobs in memory. Clones share the same blobs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash under which `data` is stored: `0x` followed by its hex Keccak-256.
    pub fn content_hash(data: &[u8]) -> String {
        format!("0x{}", hex::encode(hash_data(data)))
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn upload(
        &self,
        _name_hint: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        with_cancel(cancel, async {
            let hash = Self::content_hash(&data);
            self.blobs.write().await.insert(hash.clone(), data);
            Ok(hash)
        })
        .await
    }

    async fn fetch(&self, hash: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        with_cancel(cancel, async {
            self.blobs
                .read()
                .await
                .get(hash)
                .cloned()
                .ok_or_else(|| DidError::NotFound(hash.to_string()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_is_idempotent() {
        let store = InMemoryContentStore::new();
        let cancel = CancellationToken::new();
        let a = store.upload("did.json", b"payload".to_vec(), &cancel).await.unwrap();
        let b = store.upload("other.json", b"payload".to_vec(), &cancel).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.fetch(&a, &cancel).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn unknown_hash_is_not_found() {
        let store = InMemoryContentStore::new();
        let err = store.fetch("0xdead", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DidError::NotFound(_)));
    }

    #[test]
    fn content_hash_is_prefixed_keccak() {
        assert_eq!(
            InMemoryContentStore::content_hash(b""),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
