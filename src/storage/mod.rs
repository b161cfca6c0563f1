// src/storage/mod.rs
//! Content-addressed storage for DID Documents.

pub mod ipfs_client;
pub mod memory_store;

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A store where the retrieval key is a hash of the stored content.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores `data` and returns its content hash.
    ///
    /// Identical bytes always yield the identical hash, so repeated uploads
    /// are harmless. `name_hint` only labels log lines: it is never stored
    /// and never affects the returned hash.
    async fn upload(&self, name_hint: &str, data: Vec<u8>, cancel: &CancellationToken)
        -> Result<String>;

    /// Retrieves the bytes stored under `hash`.
    ///
    /// # Errors
    /// - [`DidError::NotFound`](crate::error::DidError::NotFound) if the hash is unknown
    /// - [`DidError::Network`](crate::error::DidError::Network) on transport failure
    async fn fetch(&self, hash: &str, cancel: &CancellationToken) -> Result<Vec<u8>>;
}
