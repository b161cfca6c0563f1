// src/contracts/did_registry.rs
//! DID Registry smart contract interface implementation.
//!
//! The registry is an on-chain mapping from a 32-byte identifier key to the
//! content hash of the current DID Document, together with the account that
//! owns the entry. The contract itself arbitrates ownership; nothing here
//! serializes concurrent writers.
//!
//! Two implementations of [`RegistryAnchor`] are provided:
//! - [`DidRegistry`] talks to the deployed contract through [`ChainClient`]
//! - [`InMemoryRegistry`] models the same contract in process

use crate::blockchain::chain_client::ChainClient;
use crate::error::{DidError, Result};
use crate::models::identifier::RegistryKey;
use crate::utils::cancel::with_cancel;
use crate::utils::crypto::hash_data;
use async_trait::async_trait;
use ethers_core::abi::Abi;
use ethers_core::types::{Address, H256};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

const DID_REGISTRY_ABI: &[u8] = include_bytes!("abi/DIDRegistry.json");

/// Result of a confirmed `register` transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

/// On-chain key to content-hash mapping with ownership.
#[async_trait]
pub trait RegistryAnchor: Send + Sync {
    /// Anchors `content_hash` under `key` and waits for confirmation.
    ///
    /// # Errors
    /// - [`DidError::Timeout`] if the confirmation window elapses
    /// - [`DidError::Network`] on transport failure or a reverted transaction
    async fn register(
        &self,
        key: RegistryKey,
        content_hash: &str,
        cancel: &CancellationToken,
    ) -> Result<Confirmation>;

    /// Account that controls `key`. The zero address means unowned.
    async fn owner(&self, key: RegistryKey, cancel: &CancellationToken) -> Result<Address>;

    /// Currently anchored content hash, or `None` if never registered.
    async fn resolve_hash(
        &self,
        key: RegistryKey,
        cancel: &CancellationToken,
    ) -> Result<Option<String>>;
}

/// DID Registry smart contract client.
pub struct DidRegistry {
    client: ChainClient,
    address: Address,
    abi: Abi,
}

impl DidRegistry {
    /// Creates a new DidRegistry bound to a deployed contract.
    ///
    /// # Arguments
    /// * `client` - Chain client; it must carry a signer to call `register`
    /// * `contract_address` - Hex address of the DIDRegistry contract
    ///
    /// # Errors
    /// [`DidError::Validation`] if the address does not parse.
    pub fn new(client: ChainClient, contract_address: &str) -> Result<Self> {
        let address = contract_address
            .trim()
            .parse::<Address>()
            .map_err(|e| DidError::Validation(format!("invalid registry address: {}", e)))?;
        let abi: Abi = serde_json::from_slice(DID_REGISTRY_ABI)?;
        Ok(Self {
            client,
            address,
            abi,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

#[async_trait]
impl RegistryAnchor for DidRegistry {
    async fn register(
        &self,
        key: RegistryKey,
        content_hash: &str,
        cancel: &CancellationToken,
    ) -> Result<Confirmation> {
        let tx_hash = self
            .client
            .send_transaction(
                self.address,
                &self.abi,
                "register",
                (H256::from(key.0), content_hash.to_string()),
                cancel,
            )
            .await?;
        info!("Waiting for registration transaction {:?}", tx_hash);

        let receipt = self.client.wait_for_receipt(tx_hash, cancel).await?;
        Ok(Confirmation {
            tx_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
        })
    }

    async fn owner(&self, key: RegistryKey, cancel: &CancellationToken) -> Result<Address> {
        self.client
            .query_contract(self.address, &self.abi, "owner", H256::from(key.0), cancel)
            .await
    }

    async fn resolve_hash(
        &self,
        key: RegistryKey,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let hash: String = self
            .client
            .query_contract(self.address, &self.abi, "hash", H256::from(key.0), cancel)
            .await?;
        Ok(Some(hash).filter(|h| !h.is_empty()))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    owner: Address,
    hash: String,
}

/// In-process registry with the contract's ownership rules.
///
/// Handles created with [`InMemoryRegistry::with_sender`] share state, so
/// several accounts can act on the same registry.
#[derive(Debug, Clone)]
pub struct InMemoryRegistry {
    entries: Arc<RwLock<HashMap<RegistryKey, Entry>>>,
    nonce: Arc<AtomicU64>,
    sender: Address,
}

impl InMemoryRegistry {
    /// Creates an empty registry whose writes come from `sender`.
    pub fn new(sender: Address) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            nonce: Arc::new(AtomicU64::new(0)),
            sender,
        }
    }

    /// Another handle on the same state, writing as `sender`.
    pub fn with_sender(&self, sender: Address) -> Self {
        Self {
            entries: self.entries.clone(),
            nonce: self.nonce.clone(),
            sender,
        }
    }
}

#[async_trait]
impl RegistryAnchor for InMemoryRegistry {
    async fn register(
        &self,
        key: RegistryKey,
        content_hash: &str,
        cancel: &CancellationToken,
    ) -> Result<Confirmation> {
        with_cancel(cancel, async {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get(&key) {
                if entry.owner != self.sender {
                    return Err(DidError::Network("execution reverted: not owner".into()));
                }
            }
            entries.insert(
                key,
                Entry {
                    owner: self.sender,
                    hash: content_hash.to_string(),
                },
            );

            let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
            let mut preimage = key.0.to_vec();
            preimage.extend_from_slice(content_hash.as_bytes());
            preimage.extend_from_slice(&nonce.to_be_bytes());
            let confirmation = Confirmation {
                tx_hash: H256::from(hash_data(&preimage)),
                block_number: Some(nonce + 1),
            };
            debug!("In-memory registration {:?}", confirmation.tx_hash);
            Ok(confirmation)
        })
        .await
    }

    async fn owner(&self, key: RegistryKey, cancel: &CancellationToken) -> Result<Address> {
        with_cancel(cancel, async {
            let entries = self.entries.read().await;
            Ok(entries.get(&key).map(|e| e.owner).unwrap_or_default())
        })
        .await
    }

    async fn resolve_hash(
        &self,
        key: RegistryKey,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        with_cancel(cancel, async {
            let entries = self.entries.read().await;
            Ok(entries.get(&key).map(|e| e.hash.clone()))
        })
        .await
    }
}
