// src/blockchain/chain_client.rs
//! EVM chain client implementation.
//!
//! Provides the two primitives the registry needs from the ledger:
//! a read-only contract call, and a state-changing call that waits for
//! its receipt within a bounded confirmation window.
//!
//! GoChain does not accept EIP-1559 transactions, so every transaction is
//! sent in the legacy format.

use crate::error::{DidError, Result};
use crate::settings::Settings;
use crate::utils::cancel::with_cancel;
use crate::wallet::key_management::KeyManager;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::TransactionReceipt;
use ethers_contract::{BaseContract, Contract};
use ethers_core::abi::{Abi, Detokenize, Tokenize};
use ethers_core::types::{Address, H256};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Chain client for contract queries and transactions.
///
/// This client provides:
/// - Read-only contract calls through the plain provider
/// - Transaction sending through a signer middleware (when a key is configured)
/// - Bounded receipt polling
#[derive(Clone)]
pub struct ChainClient {
    /// JSON-RPC provider
    provider: Provider<Http>,
    /// Wallet bound to the chain id; `None` for read-only clients
    wallet: Option<LocalWallet>,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl ChainClient {
    /// Creates a new chain client.
    ///
    /// # Arguments
    /// * `settings` - RPC URL, HTTP timeout and confirmation window
    /// * `signer` - Key used to sign transactions, if this client will send any
    ///
    /// # Errors
    /// Returns error if:
    /// - The RPC URL is invalid
    /// - The HTTP client cannot be built
    /// - The chain id cannot be retrieved (only when a signer is given)
    pub async fn new(settings: &Settings, signer: Option<&KeyManager>) -> Result<Self> {
        let url = reqwest::Url::parse(&settings.rpc_url)
            .map_err(|e| DidError::Validation(format!("invalid RPC URL: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout())
            .build()
            .map_err(DidError::network)?;
        let provider = Provider::new(Http::new_with_client(url, http));

        let wallet = match signer {
            Some(key_manager) => {
                let chain_id = provider
                    .get_chainid()
                    .await
                    .map_err(DidError::network)?
                    .as_u64();
                info!("Connected to chain {} at {}", chain_id, settings.rpc_url);
                Some(key_manager.wallet().with_chain_id(chain_id))
            }
            None => None,
        };

        Ok(Self {
            provider,
            wallet,
            confirmation_timeout: settings.confirmation_timeout(),
            poll_interval: settings.confirmation_poll_interval(),
        })
    }

    /// Overrides the confirmation window and poll interval, bypassing the clamp.
    #[cfg(test)]
    pub(crate) fn with_confirmation_window(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Address transactions are sent from, if this client can sign.
    pub fn sender(&self) -> Option<Address> {
        self.wallet.as_ref().map(|w| w.address())
    }

    /// Sends a state-changing contract call as a legacy transaction.
    ///
    /// # Arguments
    /// * `contract_address` - Address of the target contract
    /// * `abi` - Contract ABI
    /// * `method` - Method name to call
    /// * `params` - Method parameters
    /// * `cancel` - Aborts the submission when triggered
    ///
    /// # Returns
    /// Hash of the submitted (not yet confirmed) transaction
    pub async fn send_transaction<T: Tokenize + Send>(
        &self,
        contract_address: Address,
        abi: &Abi,
        method: &str,
        params: T,
        cancel: &CancellationToken,
    ) -> Result<H256> {
        let wallet = self
            .wallet
            .clone()
            .ok_or_else(|| DidError::Validation("no signing key configured".into()))?;
        let client = Arc::new(SignerMiddleware::new(self.provider.clone(), wallet));
        let contract = Contract::new(contract_address, BaseContract::from(abi.clone()), client);

        let call = contract
            .method::<_, H256>(method, params)
            .map_err(|e| DidError::Encoding(e.to_string()))?
            .legacy();

        let tx_hash = with_cancel(cancel, async {
            call.send()
                .await
                .map(|pending| pending.tx_hash())
                .map_err(DidError::network)
        })
        .await?;
        debug!("Submitted {} transaction {:?}", method, tx_hash);
        Ok(tx_hash)
    }

    /// Queries a smart contract (read-only operation).
    ///
    /// # Returns
    /// Decoded return value from the contract call
    pub async fn query_contract<T, R>(
        &self,
        contract_address: Address,
        abi: &Abi,
        method: &str,
        params: T,
        cancel: &CancellationToken,
    ) -> Result<R>
    where
        T: Tokenize + Send,
        R: Detokenize + Send + Sync,
    {
        let contract = Contract::new(
            contract_address,
            BaseContract::from(abi.clone()),
            Arc::new(self.provider.clone()),
        );
        let call = contract
            .method::<_, R>(method, params)
            .map_err(|e| DidError::Encoding(e.to_string()))?;

        with_cancel(cancel, async { call.call().await.map_err(DidError::network) }).await
    }

    /// Waits until `tx_hash` is mined, polling at the configured interval.
    ///
    /// # Errors
    /// - [`DidError::Timeout`] when the confirmation window elapses first
    /// - [`DidError::Network`] when the transaction reverted
    pub async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        cancel: &CancellationToken,
    ) -> Result<TransactionReceipt> {
        let window = self.confirmation_timeout;
        let receipt = with_cancel(cancel, async {
            tokio::time::timeout(window, self.poll_receipt(tx_hash))
                .await
                .map_err(|_| {
                    DidError::Timeout(format!(
                        "transaction {:?} not confirmed within {:?}",
                        tx_hash, window
                    ))
                })?
        })
        .await?;

        if receipt.status.map(|s| s.as_u64()) == Some(0) {
            return Err(DidError::Network(format!(
                "transaction {:?} reverted",
                tx_hash
            )));
        }
        Ok(receipt)
    }

    async fn poll_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(DidError::network)?;
            match receipt {
                Some(receipt) => return Ok(receipt),
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, Matcher};
    use serde_json::json;

    async fn client_for(path: &str) -> ChainClient {
        let settings = Settings {
            rpc_url: format!("{}{}", mockito::server_url(), path),
            ..Settings::default()
        };
        ChainClient::new(&settings, None)
            .await
            .unwrap()
            .with_confirmation_window(Duration::from_millis(300), Duration::from_millis(20))
    }

    fn receipt_rpc(path: &str, result: serde_json::Value) -> mockito::Mock {
        mock("POST", path)
            .match_body(Matcher::PartialJson(json!({"method": "eth_getTransactionReceipt"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string())
            .create()
    }

    #[tokio::test]
    async fn unmined_transaction_times_out() {
        let _m = receipt_rpc("/rpc-pending", serde_json::Value::Null);
        let client = client_for("/rpc-pending").await;

        let err = client
            .wait_for_receipt(H256::repeat_byte(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DidError::Timeout(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn reverted_transaction_is_network_error() {
        let receipt = TransactionReceipt {
            transaction_hash: H256::repeat_byte(2),
            block_number: Some(7u64.into()),
            status: Some(0u64.into()),
            ..Default::default()
        };
        let _m = receipt_rpc("/rpc-reverted", serde_json::to_value(&receipt).unwrap());
        let client = client_for("/rpc-reverted").await;

        let err = client
            .wait_for_receipt(H256::repeat_byte(2), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DidError::Network(ref msg) if msg.contains("reverted")), "{:?}", err);
    }

    #[tokio::test]
    async fn mined_transaction_returns_receipt() {
        let receipt = TransactionReceipt {
            transaction_hash: H256::repeat_byte(3),
            block_number: Some(9u64.into()),
            status: Some(1u64.into()),
            ..Default::default()
        };
        let _m = receipt_rpc("/rpc-mined", serde_json::to_value(&receipt).unwrap());
        let client = client_for("/rpc-mined").await;

        let mined = client
            .wait_for_receipt(H256::repeat_byte(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(mined.block_number, Some(9u64.into()));
    }

    #[tokio::test]
    async fn cancelled_wait_stops_polling() {
        let _m = receipt_rpc("/rpc-cancelled", serde_json::Value::Null);
        let client = client_for("/rpc-cancelled").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .wait_for_receipt(H256::repeat_byte(4), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DidError::Cancelled));
    }

    #[tokio::test]
    async fn read_only_client_has_no_sender() {
        let client = ChainClient::new(&Settings::default(), None).await.unwrap();
        assert!(client.sender().is_none());
    }

    #[tokio::test]
    async fn rejects_invalid_rpc_url() {
        let settings = Settings {
            rpc_url: "not a url".into(),
            ..Settings::default()
        };
        let err = ChainClient::new(&settings, None).await.err().unwrap();
        assert!(matches!(err, DidError::Validation(_)));
    }

    #[tokio::test]
    async fn send_without_signer_is_rejected() {
        let client = ChainClient::new(&Settings::default(), None).await.unwrap();
        let abi: Abi = serde_json::from_str("[]").unwrap();
        let err = client
            .send_transaction(Address::zero(), &abi, "register", H256::zero(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DidError::Validation(_)));
    }
}
