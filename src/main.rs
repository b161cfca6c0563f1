// src/main.rs

//! # DID Anchor - Main Entry Point
//!
//! Loads configuration, connects to the chain and IPFS, and starts the API server.
//!
//! ## Environment Variables
//! - `DID_ANCHOR_REGISTRY_ADDRESS`: Deployed DIDRegistry contract address (required)
//! - `DID_ANCHOR_PRIVATE_KEY`: Signing key for DID creation and credential issuance
//! - `DID_ANCHOR_RPC_URL`: (Optional) chain RPC URL (default: https://rpc.gochain.io)
//! - `DID_ANCHOR_IPFS_API_URL`: (Optional) IPFS API URL
//! - `DID_ANCHOR_LISTEN_ADDR`: (Optional) API bind address (default: 127.0.0.1:3000)

use anyhow::Context;
use did_anchor::blockchain::chain_client::ChainClient;
use did_anchor::contracts::did_registry::DidRegistry;
use did_anchor::services::api_server::ApiServer;
use did_anchor::settings::Settings;
use did_anchor::storage::ipfs_client::IpfsStorage;
use did_anchor::wallet::key_management::KeyManager;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load configuration and initialize logging
/// 2. Connect to the chain
/// 3. Initialize service components
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("cannot load configuration")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log_level))
        .init();
    info!("Starting with {:?}", settings);

    let signer = settings
        .private_key
        .as_deref()
        .map(KeyManager::from_hex)
        .transpose()
        .context("cannot parse private key")?
        .map(Arc::new);
    let chain_client = ChainClient::new(&settings, signer.as_deref())
        .await
        .with_context(|| format!("cannot connect to {}", settings.rpc_url))?;
    match chain_client.sender() {
        Some(sender) => info!("Sending transactions as {:?}", sender),
        None => warn!("No private key configured; DID creation and issuance are disabled"),
    }

    let registry_address = settings
        .registry_address
        .as_deref()
        .context("registry contract address required (DID_ANCHOR_REGISTRY_ADDRESS)")?;
    let registry = DidRegistry::new(chain_client, registry_address)?;
    info!("Using DIDRegistry contract at {:?}", registry.address());
    let store = IpfsStorage::new(&settings.ipfs_api_url)?;

    let api_server = Arc::new(ApiServer::new(
        Arc::new(registry),
        Arc::new(store),
        signer,
        settings.request_timeout(),
    ));

    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.listen_addr))?;
    info!("Available endpoints:");
    info!("- POST /dids");
    info!("- GET  /dids/:did, /dids/:did/owner, /dids/:did/hash");
    info!("- POST /credentials, /credentials/verify");

    api_server.run(addr).await?;
    Ok(())
}
