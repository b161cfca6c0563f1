// src/lib.rs

//! # DID Anchor
//!
//! Anchors DID Documents on a blockchain registry, resolves them through
//! content-addressed storage, and issues and verifies Verifiable Credentials
//! signed with secp256k1 over Keccak-256.
//!
//! ## Architecture Overview
//! 1. **Blockchain Layer**: `ChainClient` and the `DidRegistry` contract binding
//! 2. **Storage Layer**: IPFS (or in-memory) content-addressed document storage
//! 3. **Services Layer**: registration, resolution, issuance, verification and the API
//! 4. **Cryptography Layer**: `KeyManager` signer and Keccak-256 hashing
//!
//! ## Example
//! ```no_run
//! use did_anchor::contracts::did_registry::InMemoryRegistry;
//! use did_anchor::models::identifier::Did;
//! use did_anchor::services::registrar::DidRegistrar;
//! use did_anchor::storage::memory_store::InMemoryContentStore;
//! use did_anchor::wallet::key_management::KeyManager;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> did_anchor::error::Result<()> {
//! let signer = KeyManager::generate();
//! let registrar = DidRegistrar::new(
//!     Arc::new(InMemoryRegistry::new(signer.address())),
//!     Arc::new(InMemoryContentStore::new()),
//! );
//! let did = Did::parse("did:go:abc123")?;
//! let registration = registrar.create(&did, &signer, &CancellationToken::new()).await?;
//! println!("anchored {}", registration.content_hash);
//! # Ok(())
//! # }
//! ```

// Module declarations (organized by functional domain)
pub mod blockchain; // Chain RPC access
pub mod contracts; // DIDRegistry binding and registry anchors
pub mod error; // Error taxonomy
pub mod models; // Data structures
pub mod services; // Business logic and API
pub mod settings; // Configuration
pub mod storage; // Content-addressed storage
pub mod utils; // Helper functions
pub mod wallet; // Signing keys
