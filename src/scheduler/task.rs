//! Indexing task definitions and the runner that executes one task against a
//! reader pair with a bounded retry loop per reader.

use crate::reader::{ChainReader, ReaderPair};
use crate::retry::with_retry;
use crate::runtime::telemetry::Telemetry;
use crate::store::Store;
use anyhow::{Context, Result};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Record kinds an indexing task can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Block,
    Transactions,
    Nodes,
    Apps,
    Accounts,
    CalculatedFields,
}

impl TaskKind {
    /// Static phase-1 kinds scheduled up front for every height. `Accounts`
    /// tasks are produced dynamically from `Nodes`/`Apps` results and
    /// `CalculatedFields` belongs to phase 2.
    pub const FETCH_KINDS: [TaskKind; 4] = [
        TaskKind::Block,
        TaskKind::Transactions,
        TaskKind::Nodes,
        TaskKind::Apps,
    ];
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Block => "block",
            TaskKind::Transactions => "transactions",
            TaskKind::Nodes => "nodes",
            TaskKind::Apps => "apps",
            TaskKind::Accounts => "accounts",
            TaskKind::CalculatedFields => "calculated_fields",
        };
        f.write_str(name)
    }
}

/// One unit of indexing work, identified by `(kind, height[, address])`.
/// Tasks carry no state beyond their identity and are never persisted.
#[derive(Debug, Clone)]
pub struct IndexingTask {
    pub kind: TaskKind,
    pub height: u64,
    pub address: Option<String>,
    /// Only meaningful for `CalculatedFields` tasks.
    pub with_timing: bool,
}

impl IndexingTask {
    pub fn new(kind: TaskKind, height: u64) -> Self {
        Self {
            kind,
            height,
            address: None,
            with_timing: false,
        }
    }

    /// Dynamic per-address account task discovered from a `Nodes` or `Apps` result.
    pub fn account(height: u64, address: impl Into<String>) -> Self {
        Self {
            kind: TaskKind::Accounts,
            height,
            address: Some(address.into()),
            with_timing: false,
        }
    }

    /// Phase-2 derived-fields task.
    pub fn calculated(height: u64, with_timing: bool) -> Self {
        Self {
            kind: TaskKind::CalculatedFields,
            height,
            address: None,
            with_timing,
        }
    }
}

/// How a task ended. Failures are absorbed by the orchestrator: they are
/// logged with full context but never abort the run and never prevent the
/// height from counting as processed.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Task completed; `discovered` holds account addresses observed by
    /// `Nodes`/`Apps` tasks (empty for every other kind).
    Completed { discovered: Vec<String> },
    /// Primary exhausted and fallback exhausted or absent.
    Failed,
}

impl TaskOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed)
    }
}

/// Executes one indexing task: a fixed-attempt retry loop against the
/// primary reader, then the same loop against the fallback if present.
pub struct TaskRunner<R, S> {
    readers: ReaderPair<R>,
    store: Arc<S>,
    retry_budget: u32,
    telemetry: Arc<Telemetry>,
}

impl<R, S> Clone for TaskRunner<R, S> {
    fn clone(&self) -> Self {
        Self {
            readers: self.readers.clone(),
            store: Arc::clone(&self.store),
            retry_budget: self.retry_budget,
            telemetry: Arc::clone(&self.telemetry),
        }
    }
}

impl<R: ChainReader, S: Store> TaskRunner<R, S> {
    pub fn new(
        readers: ReaderPair<R>,
        store: Arc<S>,
        retry_budget: u32,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            readers,
            store,
            retry_budget,
            telemetry,
        }
    }

    pub async fn run(&self, task: &IndexingTask) -> TaskOutcome {
        match self.run_against(task, self.readers.primary()).await {
            Ok(discovered) => self.complete(task, discovered),
            Err(primary_err) => {
                let Some(fallback) = self.readers.fallback() else {
                    self.log_failure(task, &primary_err);
                    self.telemetry.record_task_failure();
                    return TaskOutcome::Failed;
                };

                tracing::warn!(
                    kind = %task.kind,
                    height = task.height,
                    primary = self.readers.primary_endpoint(),
                    fallback = fallback.endpoint(),
                    error = %primary_err,
                    "primary reader exhausted; failing over"
                );
                self.telemetry.record_failover();

                match self.run_against(task, fallback).await {
                    Ok(discovered) => self.complete(task, discovered),
                    Err(fallback_err) => {
                        self.log_failure(task, &fallback_err);
                        self.telemetry.record_task_failure();
                        TaskOutcome::Failed
                    }
                }
            }
        }
    }

    async fn run_against(&self, task: &IndexingTask, reader: &Arc<R>) -> Result<Vec<String>> {
        let attempts = AtomicU32::new(0);

        let result = with_retry(self.retry_budget, || {
            attempts.fetch_add(1, Ordering::Relaxed);
            self.execute(task, reader)
        })
        .await;

        let attempts = attempts.load(Ordering::Relaxed);
        self.telemetry
            .record_retries(u64::from(attempts.saturating_sub(1)));

        result
    }

    /// One attempt: fetch from `reader`, write to the store. `Nodes` and
    /// `Apps` attempts return the addresses observed at the height.
    async fn execute(&self, task: &IndexingTask, reader: &Arc<R>) -> Result<Vec<String>> {
        let height = task.height;

        match task.kind {
            TaskKind::Block => {
                let block = reader.block(height).await?;
                self.store.write_block(&block).await?;
                Ok(Vec::new())
            }
            TaskKind::Transactions => {
                let transactions = reader.transactions(height).await?;
                self.store.write_transactions(height, &transactions).await?;
                Ok(Vec::new())
            }
            TaskKind::Nodes => {
                let nodes = reader.nodes(height).await?;
                self.store.write_nodes(height, &nodes).await?;
                Ok(nodes.into_iter().map(|node| node.address).collect())
            }
            TaskKind::Apps => {
                let apps = reader.apps(height).await?;
                self.store.write_apps(height, &apps).await?;
                Ok(apps.into_iter().map(|app| app.address).collect())
            }
            TaskKind::Accounts => {
                let address = task
                    .address
                    .as_deref()
                    .context("accounts task is missing its address")?;
                let account = reader.account(address, height).await?;
                self.store.write_account(&account).await?;
                Ok(Vec::new())
            }
            TaskKind::CalculatedFields => {
                self.store
                    .write_calculated_fields(height, task.with_timing)
                    .await?;
                Ok(Vec::new())
            }
        }
    }

    fn complete(&self, task: &IndexingTask, discovered: Vec<String>) -> TaskOutcome {
        tracing::debug!(
            kind = %task.kind,
            height = task.height,
            discovered = discovered.len(),
            "task completed"
        );
        self.telemetry.record_task_success();
        TaskOutcome::Completed { discovered }
    }

    fn log_failure(&self, task: &IndexingTask, err: &anyhow::Error) {
        if let Some(address) = task.address.as_deref() {
            tracing::error!(
                kind = %task.kind,
                height = task.height,
                address,
                primary = self.readers.primary_endpoint(),
                fallback = self.readers.fallback_endpoint().unwrap_or("none"),
                error = %err,
                "task failed on all readers"
            );
        } else {
            tracing::error!(
                kind = %task.kind,
                height = task.height,
                primary = self.readers.primary_endpoint(),
                fallback = self.readers.fallback_endpoint().unwrap_or("none"),
                error = %err,
                "task failed on all readers"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_kinds_exclude_dynamic_and_derived_work() {
        assert!(!TaskKind::FETCH_KINDS.contains(&TaskKind::Accounts));
        assert!(!TaskKind::FETCH_KINDS.contains(&TaskKind::CalculatedFields));
        assert_eq!(TaskKind::FETCH_KINDS.len(), 4);
    }

    #[test]
    fn kind_names_are_stable_log_labels() {
        assert_eq!(TaskKind::Block.to_string(), "block");
        assert_eq!(TaskKind::CalculatedFields.to_string(), "calculated_fields");
    }

    #[test]
    fn account_task_carries_its_address() {
        let task = IndexingTask::account(42, "addr-1");
        assert_eq!(task.kind, TaskKind::Accounts);
        assert_eq!(task.height, 42);
        assert_eq!(task.address.as_deref(), Some("addr-1"));
    }

    #[test]
    fn calculated_task_carries_timing_flag() {
        assert!(IndexingTask::calculated(10, true).with_timing);
        assert!(!IndexingTask::calculated(10, false).with_timing);
    }
}
