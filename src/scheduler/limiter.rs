//! Counting-capacity gate bounding how many indexing tasks run at once.
//!
//! The limiter is an explicit value owned by the orchestrator and cloned into
//! every spawned task, so independent orchestrator instances never share
//! capacity. It makes no fairness promise across waiters beyond never
//! granting more than `capacity` slots concurrently.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of scheduling capacity. Dropping the slot releases it; tasks hold
/// their slot for their whole execution and never across tasks.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free. Diagnostic only; the value can be stale as soon
    /// as it is read.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Suspends the caller until one slot frees, then grants it.
    pub async fn acquire(&self) -> Result<Slot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .context("concurrency limiter closed unexpectedly")?;
        Ok(Slot { _permit: permit })
    }
}
