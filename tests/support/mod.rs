//! Test doubles shared by the pipeline integration tests: a scriptable
//! in-memory chain reader and a store that records every write in order.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chainfill::{Account, AppRef, Block, ChainReader, NodeRef, Store, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory [`ChainReader`] with per-method failure injection, call
/// counters, and an in-flight gauge for concurrency assertions.
pub struct MockReader {
    endpoint: String,
    chain_height: AtomicU64,
    nodes_per_height: usize,
    apps_per_height: usize,
    op_delay: Duration,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<HashMap<&'static str, u64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockReader {
    pub fn new(endpoint: impl Into<String>, chain_height: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            chain_height: AtomicU64::new(chain_height),
            nodes_per_height: 2,
            apps_per_height: 1,
            op_delay: Duration::ZERO,
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Number of staked node/app addresses reported at every height.
    pub fn with_addresses(mut self, nodes: usize, apps: usize) -> Self {
        self.nodes_per_height = nodes;
        self.apps_per_height = apps;
        self
    }

    /// Sleep inserted into every call so overlapping requests are observable.
    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    /// Makes every subsequent call to `method` fail.
    pub fn fail_method(&self, method: &'static str) {
        self.failing.lock().unwrap().insert(method);
    }

    pub fn calls(&self, method: &str) -> u64 {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    /// Highest number of calls ever observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn observe(&self, method: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;

        let live = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(live, Ordering::SeqCst);
        if !self.op_delay.is_zero() {
            tokio::time::sleep(self.op_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(method) {
            bail!("{method} is down on {}", self.endpoint);
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockReader {
    async fn current_height(&self) -> Result<u64> {
        self.observe("current_height").await?;
        Ok(self.chain_height.load(Ordering::SeqCst))
    }

    async fn block(&self, height: u64) -> Result<Block> {
        self.observe("block").await?;
        Ok(Block {
            height,
            hash: format!("hash-{height}"),
            proposer_address: format!("proposer-{height}"),
            time_unix: 1_700_000_000 + height as i64 * 15,
            tx_count: 2,
        })
    }

    async fn transactions(&self, height: u64) -> Result<Vec<Transaction>> {
        self.observe("transactions").await?;
        Ok((0..2)
            .map(|i| Transaction {
                hash: format!("tx-{height}-{i}"),
                height,
                from_address: format!("sender-{height}-{i}"),
                to_address: format!("receiver-{height}-{i}"),
                amount: 1_000,
                fee: 10,
            })
            .collect())
    }

    async fn nodes(&self, height: u64) -> Result<Vec<NodeRef>> {
        self.observe("nodes").await?;
        Ok((0..self.nodes_per_height)
            .map(|i| NodeRef {
                address: format!("node-{height}-{i}"),
                public_key: format!("pk-node-{height}-{i}"),
                staked_tokens: 15_000,
            })
            .collect())
    }

    async fn apps(&self, height: u64) -> Result<Vec<AppRef>> {
        self.observe("apps").await?;
        Ok((0..self.apps_per_height)
            .map(|i| AppRef {
                address: format!("app-{height}-{i}"),
                public_key: format!("pk-app-{height}-{i}"),
                staked_tokens: 5_000,
            })
            .collect())
    }

    async fn account(&self, address: &str, height: u64) -> Result<Account> {
        self.observe("account").await?;
        Ok(Account {
            address: address.to_owned(),
            height,
            balance: 42,
            denomination: "utoken".to_owned(),
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// In-memory [`Store`] keyed for upsert semantics, with an ordered write
/// event log so tests can assert phase ordering.
#[derive(Default)]
pub struct MemStore {
    pub blocks: Mutex<BTreeMap<u64, Block>>,
    pub transactions: Mutex<BTreeMap<u64, Vec<Transaction>>>,
    pub nodes: Mutex<BTreeMap<u64, Vec<NodeRef>>>,
    pub apps: Mutex<BTreeMap<u64, Vec<AppRef>>>,
    pub accounts: Mutex<BTreeMap<(String, u64), Account>>,
    /// height -> with_timing flag of the last calculated-fields write.
    pub calculated: Mutex<BTreeMap<u64, bool>>,
    events: Mutex<Vec<(&'static str, u64)>>,
    max_height: Mutex<Option<u64>>,
    fail_max_height: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_height(&self, height: Option<u64>) {
        *self.max_height.lock().unwrap() = height;
    }

    pub fn fail_max_height(&self) {
        self.fail_max_height.store(true, Ordering::SeqCst);
    }

    pub fn total_writes(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// True when every calculated-fields write landed after every fetch write.
    pub fn derives_follow_fetches(&self) -> bool {
        let events = self.events.lock().unwrap();
        let first_derive = events.iter().position(|(kind, _)| *kind == "calculated");
        let last_fetch = events.iter().rposition(|(kind, _)| *kind != "calculated");
        match (first_derive, last_fetch) {
            (Some(derive), Some(fetch)) => derive > fetch,
            _ => true,
        }
    }

    pub fn account_addresses(&self) -> Vec<String> {
        self.accounts
            .lock()
            .unwrap()
            .keys()
            .map(|(address, _)| address.clone())
            .collect()
    }

    fn record(&self, kind: &'static str, height: u64) {
        self.events.lock().unwrap().push((kind, height));
    }
}

#[async_trait]
impl Store for MemStore {
    async fn max_recorded_height(&self) -> Result<Option<u64>> {
        if self.fail_max_height.load(Ordering::SeqCst) {
            bail!("store is unreachable");
        }
        Ok(*self.max_height.lock().unwrap())
    }

    async fn write_block(&self, block: &Block) -> Result<()> {
        self.record("block", block.height);
        self.blocks.lock().unwrap().insert(block.height, block.clone());
        Ok(())
    }

    async fn write_transactions(&self, height: u64, transactions: &[Transaction]) -> Result<()> {
        self.record("transactions", height);
        self.transactions
            .lock()
            .unwrap()
            .insert(height, transactions.to_vec());
        Ok(())
    }

    async fn write_nodes(&self, height: u64, nodes: &[NodeRef]) -> Result<()> {
        self.record("nodes", height);
        self.nodes.lock().unwrap().insert(height, nodes.to_vec());
        Ok(())
    }

    async fn write_apps(&self, height: u64, apps: &[AppRef]) -> Result<()> {
        self.record("apps", height);
        self.apps.lock().unwrap().insert(height, apps.to_vec());
        Ok(())
    }

    async fn write_account(&self, account: &Account) -> Result<()> {
        self.record("account", account.height);
        self.accounts
            .lock()
            .unwrap()
            .insert((account.address.clone(), account.height), account.clone());
        Ok(())
    }

    async fn write_calculated_fields(&self, height: u64, with_timing: bool) -> Result<()> {
        self.record("calculated", height);
        self.calculated.lock().unwrap().insert(height, with_timing);
        Ok(())
    }
}
