// src/utils/cancel.rs
//! Cancellation guard for network calls.
//!
//! Every registry and content-store operation receives a caller-owned
//! [`CancellationToken`]. Wrapping the in-flight future with [`with_cancel`]
//! drops it as soon as the token fires and reports [`DidError::Cancelled`].

use crate::error::{DidError, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Runs `fut` until it completes or `cancel` is triggered, whichever is first.
pub async fn with_cancel<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(DidError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DidError::Cancelled),
        res = fut => res,
    }
}
