//! Chain reader abstractions: the [`ChainReader`] trait every data source
//! implements, the record types it returns, and [`ReaderPair`] bundling a
//! primary reader with an optional fallback for failover.

pub mod client;
pub mod types;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub use types::{Account, AppRef, Block, NodeRef, Transaction};

/// Per-height data source for one chain endpoint.
///
/// Every method may fail with a transport error; the core treats all errors
/// identically (retry, then failover) and leaves transient-vs-permanent
/// classification to the implementation.
#[async_trait]
pub trait ChainReader: Send + Sync + 'static {
    /// Latest height known to the endpoint.
    async fn current_height(&self) -> Result<u64>;

    async fn block(&self, height: u64) -> Result<Block>;

    async fn transactions(&self, height: u64) -> Result<Vec<Transaction>>;

    async fn nodes(&self, height: u64) -> Result<Vec<NodeRef>>;

    async fn apps(&self, height: u64) -> Result<Vec<AppRef>>;

    async fn account(&self, address: &str, height: u64) -> Result<Account>;

    /// Endpoint identity used in logs and failure events.
    fn endpoint(&self) -> &str;
}

/// Primary reader plus an optional fallback, shared by every task.
pub struct ReaderPair<R> {
    primary: Arc<R>,
    fallback: Option<Arc<R>>,
}

impl<R> Clone for ReaderPair<R> {
    fn clone(&self) -> Self {
        Self {
            primary: Arc::clone(&self.primary),
            fallback: self.fallback.as_ref().map(Arc::clone),
        }
    }
}

impl<R: ChainReader> ReaderPair<R> {
    pub fn new(primary: Arc<R>, fallback: Option<Arc<R>>) -> Self {
        Self { primary, fallback }
    }

    /// Pair without a fallback; primary exhaustion marks tasks failed outright.
    pub fn without_fallback(primary: Arc<R>) -> Self {
        Self::new(primary, None)
    }

    pub fn primary(&self) -> &Arc<R> {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&Arc<R>> {
        self.fallback.as_ref()
    }

    pub fn primary_endpoint(&self) -> &str {
        self.primary.endpoint()
    }

    pub fn fallback_endpoint(&self) -> Option<&str> {
        self.fallback.as_deref().map(ChainReader::endpoint)
    }

    /// Current chain height: primary first, fallback on error. Both failing
    /// is fatal to range resolution, so the combined error carries context.
    pub async fn current_height(&self) -> Result<u64> {
        match self.primary.current_height().await {
            Ok(height) => Ok(height),
            Err(primary_err) => {
                let Some(fallback) = &self.fallback else {
                    return Err(primary_err)
                        .context("primary reader failed and no fallback is configured");
                };

                tracing::warn!(
                    primary = self.primary.endpoint(),
                    fallback = fallback.endpoint(),
                    error = %primary_err,
                    "primary reader failed to report current height; asking fallback"
                );

                fallback
                    .current_height()
                    .await
                    .context("both primary and fallback readers failed to report current height")
            }
        }
    }
}
