//! Persistent store contract consumed by the orchestrator.
//!
//! Implementations back this with whatever engine they like; the core only
//! requires that every write is idempotent per `(kind, height[, address])`,
//! because a restart can re-attempt a height whose writes partially landed.

use crate::reader::types::{Account, AppRef, Block, NodeRef, Transaction};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Highest height with recorded data, or `None` when the store holds no
    /// data yet. Errors are fatal to range resolution.
    async fn max_recorded_height(&self) -> Result<Option<u64>>;

    async fn write_block(&self, block: &Block) -> Result<()>;

    async fn write_transactions(&self, height: u64, transactions: &[Transaction]) -> Result<()>;

    async fn write_nodes(&self, height: u64, nodes: &[NodeRef]) -> Result<()>;

    async fn write_apps(&self, height: u64, apps: &[AppRef]) -> Result<()>;

    async fn write_account(&self, account: &Account) -> Result<()>;

    /// Derives and writes the calculated fields for `height` from already
    /// recorded data. `with_timing` is false only for the first height of a
    /// bounded run, which has no preceding height within the run to derive
    /// block timing against.
    async fn write_calculated_fields(&self, height: u64, with_timing: bool) -> Result<()>;
}
