// src/storage/ipfs_client.rs
//! IPFS storage client for DID Documents.
//!
//! Implements [`ContentStore`] on top of the IPFS HTTP API (`add` and `cat`).
//! Content is added as a bare, unwrapped file, so its CID depends on the
//! bytes alone and the upload name hint is not sent to the node.
//!
//! # Security Considerations
//! - All stored data is public (IPFS is a public network)
//! - Hashes are content-addressed and permanent

use super::ContentStore;
use crate::error::{DidError, Result};
use crate::utils::cancel::with_cancel;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::TryStreamExt;
use ipfs_api_backend_hyper::{IpfsApi, IpfsClient, TryFromUri};
use log::{debug, info};
use std::io::Cursor;
use std::sync::Arc;
use tokio::task;
use tokio_util::sync::CancellationToken;

/// Thread-safe IPFS client wrapper.
///
/// The hyper backend's futures are not `Send`, so each call runs on a
/// blocking thread with its own single-threaded runtime.
#[derive(Clone)]
pub struct IpfsStorage {
    /// Shared IPFS client instance (thread-safe via Arc)
    client: Arc<IpfsClient>,
}

impl IpfsStorage {
    /// Creates a client for the IPFS API at `api_url`, e.g. `http://localhost:5001`.
    ///
    /// # Errors
    /// [`DidError::Validation`] if the URL does not parse.
    pub fn new(api_url: &str) -> Result<Self> {
        let client = IpfsClient::from_str(api_url)
            .map_err(|e| DidError::Validation(format!("invalid IPFS API URL: {}", e)))?;
        Ok(IpfsStorage {
            client: Arc::new(client),
        })
    }

    /// Runs `op` against the client on a blocking thread.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<IpfsClient>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let client = self.client.clone();
        task::spawn_blocking(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(DidError::network)?;
            rt.block_on(op(client))
        })
        .await
        .map_err(DidError::network)?
    }
}

/// Maps an IPFS error for `hash` onto the store's error contract.
fn classify(err: ipfs_api_backend_hyper::Error, hash: &str) -> DidError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if ["not found", "invalid path", "invalid cid"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        DidError::NotFound(hash.to_string())
    } else {
        DidError::Network(message)
    }
}

#[async_trait]
impl ContentStore for IpfsStorage {
    async fn upload(
        &self,
        name_hint: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!("Uploading {} ({} bytes) to IPFS", name_hint, data.len());
        let hash = with_cancel(
            cancel,
            self.run(move |client| async move {
                client
                    .add(Cursor::new(data))
                    .await
                    .map(|res| res.hash)
                    .map_err(DidError::network)
            }),
        )
        .await?;
        info!("Stored {} on IPFS as {}", name_hint, hash);
        Ok(hash)
    }

    async fn fetch(&self, hash: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let owned = hash.to_string();
        let data = with_cancel(
            cancel,
            self.run(move |client| async move {
                client
                    .cat(&owned)
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await
                    .map_err(|e| classify(e, &owned))
            }),
        )
        .await?;
        debug!("Fetched {} bytes for {}", data.len(), hash);
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, Matcher};

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_returns_hash() {
        let _m = mock("POST", Matcher::Regex(r"/add".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Name":"did.json","Hash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","Size":"42"}"#)
            .create();

        let store = IpfsStorage::new(&mockito::server_url()).unwrap();
        let hash = store
            .upload("did.json", b"{}".to_vec(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(hash, "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn name_hint_is_not_sent() {
        let _m = mock("POST", Matcher::Regex(r"/add".to_string()))
            .match_body(Matcher::Regex("my-label".to_string()))
            .with_status(500)
            .create();
        let _ok = mock("POST", Matcher::Regex(r"/add".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Name":"","Hash":"QmLabelFree","Size":"3"}"#)
            .create();

        let store = IpfsStorage::new(&mockito::server_url()).unwrap();
        let hash = store
            .upload("my-label", b"abc".to_vec(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(hash, "QmLabelFree");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_returns_content() {
        let _m = mock("POST", Matcher::Regex(r"/cat".to_string()))
            .match_query(Matcher::UrlEncoded("arg".into(), "QmDoc".into()))
            .with_status(200)
            .with_body("{\"id\":\"did:go:abc123\"}")
            .create();

        let store = IpfsStorage::new(&mockito::server_url()).unwrap();
        let data = store.fetch("QmDoc", &CancellationToken::new()).await.unwrap();
        assert_eq!(data, b"{\"id\":\"did:go:abc123\"}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_hash_maps_to_not_found() {
        let _m = mock("POST", Matcher::Regex(r"/cat".to_string()))
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Message":"merkledag: not found","Code":0,"Type":"error"}"#)
            .create();

        let store = IpfsStorage::new(&mockito::server_url()).unwrap();
        let err = store.fetch("QmMissing", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DidError::NotFound(ref h) if h == "QmMissing"), "{:?}", err);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_node_is_network_error() {
        let store = IpfsStorage::new("http://127.0.0.1:1").unwrap();
        let err = store.fetch("QmDoc", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DidError::Network(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn cancelled_upload_is_not_sent() {
        let store = IpfsStorage::new("http://127.0.0.1:1").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = store.upload("did.json", vec![1], &cancel).await.unwrap_err();
        assert!(matches!(err, DidError::Cancelled));
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(IpfsStorage::new("http://bad host:5001").is_err());
    }
}
