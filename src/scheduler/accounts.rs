//! Dynamic account fan-out.
//!
//! `Nodes` and `Apps` tasks discover account addresses as they complete and
//! push them onto a job queue. A fixed-size pool of workers drains the queue,
//! acquiring one limiter slot per job, so a height touching many addresses
//! queues work instead of creating one task per address. The queue itself is
//! unbounded; the global concurrency cap is the only throttle, which can
//! stall phase-1 completion on address-heavy heights — accepted backpressure.
//!
//! Workers exit when every job sender has been dropped and the queue is
//! drained, which is what closes the phase-1 barrier.

use crate::reader::ChainReader;
use crate::scheduler::limiter::ConcurrencyLimiter;
use crate::scheduler::task::{IndexingTask, TaskRunner};
use crate::store::Store;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::task::TaskTracker;

#[derive(Debug)]
pub(crate) struct AccountJob {
    pub(crate) height: u64,
    pub(crate) address: String,
}

pub(crate) type AccountJobSender = mpsc::UnboundedSender<AccountJob>;

/// Creates the account job queue and spawns `workers` drain tasks onto
/// `tracker` so the phase-1 barrier covers them.
pub(crate) fn spawn_account_workers<R: ChainReader, S: Store>(
    tracker: &TaskTracker,
    runner: TaskRunner<R, S>,
    limiter: ConcurrencyLimiter,
    workers: usize,
) -> AccountJobSender {
    let (job_tx, job_rx) = mpsc::unbounded_channel::<AccountJob>();
    let job_rx = Arc::new(Mutex::new(job_rx));

    for worker in 0..workers.max(1) {
        let job_rx = Arc::clone(&job_rx);
        let runner = runner.clone();
        let limiter = limiter.clone();

        tracker.spawn(async move {
            loop {
                let job = { job_rx.lock().await.recv().await };
                let Some(job) = job else {
                    break;
                };

                let slot = match limiter.acquire().await {
                    Ok(slot) => slot,
                    Err(err) => {
                        tracing::error!(worker, error = %err, "account worker lost its limiter");
                        break;
                    }
                };

                let task = IndexingTask::account(job.height, job.address);
                runner.run(&task).await;
                drop(slot);
            }

            tracing::trace!(worker, "account worker drained");
        });
    }

    job_tx
}
