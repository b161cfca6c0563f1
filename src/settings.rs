// src/settings.rs
//! Runtime configuration for the DID anchoring service.
//!
//! Values are layered with the `config` crate:
//! 1. Built-in defaults
//! 2. Optional `did-anchor.{toml,yaml,json}` file in the working directory
//! 3. Environment variables prefixed with `DID_ANCHOR_` (a `.env` file is loaded first)
//!
//! ## Environment Variables
//! - `DID_ANCHOR_RPC_URL`: JSON-RPC endpoint of the chain (default: https://rpc.gochain.io)
//! - `DID_ANCHOR_REGISTRY_ADDRESS`: Deployed DIDRegistry contract address
//! - `DID_ANCHOR_PRIVATE_KEY`: Hex-encoded secp256k1 key used to register DIDs and sign claims
//! - `DID_ANCHOR_IPFS_API_URL`: IPFS HTTP API (default: https://ipfs.infura.io:5001)
//!
//! The resulting [`Settings`] value is handed explicitly to the components that
//! need it; nothing reads process-wide state after startup.

use crate::error::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Bounds for the transaction confirmation wait, in seconds.
pub const MIN_CONFIRMATION_TIMEOUT_SECS: u64 = 10;
pub const MAX_CONFIRMATION_TIMEOUT_SECS: u64 = 60;

/// Service configuration.
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// Chain JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// DIDRegistry contract address (hex, with or without 0x)
    #[serde(default)]
    pub registry_address: Option<String>,

    /// IPFS HTTP API base URL
    #[serde(default = "default_ipfs_api_url")]
    pub ipfs_api_url: String,

    /// Hex-encoded signing key. Never logged.
    #[serde(default)]
    pub private_key: Option<String>,

    /// How long `register` waits for a receipt before giving up
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval
    #[serde(default = "default_confirmation_poll_millis")]
    pub confirmation_poll_millis: u64,

    /// Per-request timeout of the JSON-RPC HTTP transport
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Deadline applied to each API request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Socket address the API server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Default log filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_rpc_url() -> String {
    "https://rpc.gochain.io".to_string()
}

fn default_ipfs_api_url() -> String {
    "https://ipfs.infura.io:5001".to_string()
}

fn default_confirmation_timeout_secs() -> u64 {
    MIN_CONFIRMATION_TIMEOUT_SECS
}

fn default_confirmation_poll_millis() -> u64 {
    500
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    90
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Loads settings from `.env`, an optional config file and the environment.
    ///
    /// # Errors
    /// Returns [`DidError::Config`](crate::error::DidError::Config) if a source is
    /// malformed or a value has the wrong type.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let settings = Config::builder()
            .add_source(File::with_name("did-anchor").required(false))
            .add_source(Environment::with_prefix("DID_ANCHOR"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Confirmation wait, clamped to the supported 10 to 60 second window.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs.clamp(
            MIN_CONFIRMATION_TIMEOUT_SECS,
            MAX_CONFIRMATION_TIMEOUT_SECS,
        ))
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_millis.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            rpc_url: default_rpc_url(),
            registry_address: None,
            ipfs_api_url: default_ipfs_api_url(),
            private_key: None,
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            confirmation_poll_millis: default_confirmation_poll_millis(),
            http_timeout_secs: default_http_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
        }
    }
}

// Hand-written so the private key can never end up in a log line.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url)
            .field("registry_address", &self.registry_address)
            .field("ipfs_api_url", &self.ipfs_api_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .field("confirmation_poll_millis", &self.confirmation_poll_millis)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("listen_addr", &self.listen_addr)
            .field("log_level", &self.log_level)
            .finish()
    }
}
