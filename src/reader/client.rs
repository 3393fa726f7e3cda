//! JSON-RPC implementation of [`ChainReader`] for talking to chain nodes
//! over HTTP. Transport-level faults get their own small retry loop here,
//! independent of the orchestrator's per-task budget, so a flaky connection
//! does not immediately consume task attempts.

use crate::reader::types::{Account, AppRef, Block, NodeRef, Transaction};
use crate::reader::{ChainReader, ReaderPair};
use crate::retry::with_retry;
use crate::runtime::config::IndexerConfig;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CLIENT_RETRIES: u32 = 3;

/// Transport options for one [`RpcChainReader`] instance. Primary and
/// fallback readers carry independent options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub request_timeout: Duration,
    pub client_retries: u32,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            client_retries: DEFAULT_CLIENT_RETRIES,
        }
    }
}

impl ReaderOptions {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }
        if self.client_retries == 0 {
            bail!("client_retries must be greater than 0");
        }
        Ok(())
    }
}

pub struct RpcChainReader {
    endpoint: String,
    client: HttpClient,
    options: ReaderOptions,
}

impl RpcChainReader {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, ReaderOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: ReaderOptions) -> Result<Self> {
        options.validate()?;
        let endpoint = url.into();

        let client = HttpClientBuilder::default()
            .request_timeout(options.request_timeout)
            .build(&endpoint)
            .map_err(|err| anyhow!("failed to build RPC client for {endpoint}: {err}"))?;

        Ok(Self {
            endpoint,
            client,
            options,
        })
    }

    /// Builds a reader for `url` with transport options taken from `config`.
    pub fn from_config(config: &IndexerConfig, url: &str) -> Result<Self> {
        config.validate()?;
        Self::with_options(
            url,
            ReaderOptions {
                request_timeout: config.request_timeout(),
                client_retries: config.client_retries(),
            },
        )
    }

    async fn call<T>(&self, method: &'static str, params: ArrayParams) -> Result<T>
    where
        T: DeserializeOwned,
    {
        with_retry(self.options.client_retries, || {
            let params = params.clone();
            async move {
                timeout(
                    self.options.request_timeout,
                    self.client.request::<T, _>(method, params),
                )
                .await
                .map_err(|_| anyhow!("rpc {method} call to {} timed out", self.endpoint))?
                .map_err(|err| anyhow!("rpc {method} call to {} failed: {err}", self.endpoint))
            }
        })
        .await
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn current_height(&self) -> Result<u64> {
        self.call("chain_currentHeight", rpc_params![]).await
    }

    async fn block(&self, height: u64) -> Result<Block> {
        self.call("chain_block", rpc_params![height]).await
    }

    async fn transactions(&self, height: u64) -> Result<Vec<Transaction>> {
        self.call("chain_transactions", rpc_params![height]).await
    }

    async fn nodes(&self, height: u64) -> Result<Vec<NodeRef>> {
        self.call("chain_nodes", rpc_params![height]).await
    }

    async fn apps(&self, height: u64) -> Result<Vec<AppRef>> {
        self.call("chain_apps", rpc_params![height]).await
    }

    async fn account(&self, address: &str, height: u64) -> Result<Account> {
        self.call("chain_account", rpc_params![address, height])
            .await
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Builds the primary/fallback reader pair from the configuration surface.
pub fn reader_pair_from_config(config: &IndexerConfig) -> Result<ReaderPair<RpcChainReader>> {
    let primary = Arc::new(RpcChainReader::from_config(config, config.primary_url())?);

    let fallback = config
        .fallback_url()
        .map(|url| RpcChainReader::from_config(config, url))
        .transpose()?
        .map(Arc::new);

    Ok(ReaderPair::new(primary, fallback))
}
