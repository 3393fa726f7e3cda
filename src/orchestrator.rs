//! Top-level indexing loop.
//!
//! Each iteration resolves the height range that still needs processing,
//! fans out phase-1 fetch tasks for every height under the concurrency
//! limiter, waits for all of them (including dynamically discovered account
//! tasks) at a full barrier, then schedules one phase-2 `CalculatedFields`
//! task per height and waits again. Bounded runs terminate after one
//! iteration; continuous runs sleep the poll interval and re-resolve.
//!
//! Task failures are absorbed: a task that exhausts the primary and the
//! fallback is logged and the height still counts as processed. Liveness is
//! prioritized over per-height completeness; plugging the holes is left to
//! an external reconciliation pass. Only an unresolvable range (store
//! unreachable, or no reader able to report the current height) aborts the
//! run.

use crate::reader::{ChainReader, ReaderPair};
use crate::runtime::config::IndexerConfig;
use crate::runtime::telemetry::Telemetry;
use crate::scheduler::accounts::{spawn_account_workers, AccountJob};
use crate::scheduler::limiter::ConcurrencyLimiter;
use crate::scheduler::range::HeightRangeResolver;
use crate::scheduler::task::{IndexingTask, TaskKind, TaskOutcome, TaskRunner};
use crate::store::Store;
use anyhow::{Context, Result};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

pub struct Orchestrator<R, S> {
    config: IndexerConfig,
    readers: ReaderPair<R>,
    store: Arc<S>,
    limiter: ConcurrencyLimiter,
    telemetry: Arc<Telemetry>,
}

impl<R: ChainReader, S: Store> Orchestrator<R, S> {
    pub fn new(config: IndexerConfig, readers: ReaderPair<R>, store: Arc<S>) -> Self {
        let limiter = ConcurrencyLimiter::new(config.concurrency());
        Self {
            config,
            readers,
            store,
            limiter,
            telemetry: Arc::new(Telemetry::default()),
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Returns a clone of the telemetry handle for observability.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Drives the loop to completion (bounded mode) or forever (continuous
    /// mode). Returns an error only on a fatal resolution failure.
    pub async fn run(&self) -> Result<()> {
        loop {
            let resolver = HeightRangeResolver::new(
                self.readers.clone(),
                Arc::clone(&self.store),
                self.config.mode(),
            );
            let range = resolver
                .resolve()
                .await
                .context("failed to resolve height range")?;

            if range.is_empty() {
                tracing::debug!("no heights to index this iteration");
            } else {
                let (from, to) = (*range.start(), *range.end());
                tracing::info!(from, to, "indexing height range");

                self.run_fetch_phase(range.clone()).await?;
                self.run_derive_phase(range).await?;

                self.telemetry.record_heights_indexed(to - from + 1);
                tracing::info!(from, to, "height range indexed");
            }

            if self.config.mode().is_bounded() {
                break;
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }

        tracing::info!("indexing run finished");
        Ok(())
    }

    /// Phase 1: the static fetch kinds for every height, in ascending height
    /// order, one slot per task, plus account workers draining the dynamic
    /// fan-out queue. Returns once every task has completed or failed.
    async fn run_fetch_phase(&self, range: RangeInclusive<u64>) -> Result<()> {
        let tracker = TaskTracker::new();
        let job_tx = spawn_account_workers(
            &tracker,
            self.task_runner(),
            self.limiter.clone(),
            self.limiter.capacity(),
        );

        for height in range {
            for kind in TaskKind::FETCH_KINDS {
                let slot = self.limiter.acquire().await?;
                let runner = self.task_runner();
                let task = IndexingTask::new(kind, height);
                let job_tx = job_tx.clone();
                let telemetry = Arc::clone(&self.telemetry);

                tracker.spawn(async move {
                    let outcome = runner.run(&task).await;
                    drop(slot);

                    if let TaskOutcome::Completed { discovered } = outcome {
                        for address in discovered {
                            telemetry.record_account_task();
                            let job = AccountJob {
                                height: task.height,
                                address,
                            };
                            if job_tx.send(job).is_err() {
                                tracing::warn!(
                                    height = task.height,
                                    "account queue closed; dropping discovered address"
                                );
                            }
                        }
                    }
                });
            }
        }

        // Workers exit once every sender is gone and the queue is drained.
        drop(job_tx);
        tracker.close();
        tracker.wait().await;

        Ok(())
    }

    /// Phase 2: one `CalculatedFields` task per height. Derived timing is
    /// suppressed for the first height of a bounded run.
    async fn run_derive_phase(&self, range: RangeInclusive<u64>) -> Result<()> {
        let tracker = TaskTracker::new();

        for height in range {
            let slot = self.limiter.acquire().await?;
            let runner = self.task_runner();
            let task = IndexingTask::calculated(height, self.config.mode().timing_enabled(height));

            tracker.spawn(async move {
                runner.run(&task).await;
                drop(slot);
            });
        }

        tracker.close();
        tracker.wait().await;

        Ok(())
    }

    fn task_runner(&self) -> TaskRunner<R, S> {
        TaskRunner::new(
            self.readers.clone(),
            Arc::clone(&self.store),
            self.config.retry_budget(),
            Arc::clone(&self.telemetry),
        )
    }
}
