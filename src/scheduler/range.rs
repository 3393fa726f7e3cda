//! Computes the inclusive set of heights to process for one iteration.

use crate::reader::{ChainReader, ReaderPair};
use crate::runtime::config::RunMode;
use crate::store::Store;
use anyhow::{bail, Context, Result};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// First height that carries indexable data; the height before genesis
/// payloads start, used when the store reports no data yet.
pub const FIRST_INDEXABLE_HEIGHT: u64 = 1;

pub struct HeightRangeResolver<R, S> {
    readers: ReaderPair<R>,
    store: Arc<S>,
    mode: RunMode,
}

impl<R: ChainReader, S: Store> HeightRangeResolver<R, S> {
    pub fn new(readers: ReaderPair<R>, store: Arc<S>, mode: RunMode) -> Self {
        Self {
            readers,
            store,
            mode,
        }
    }

    /// Resolves the closed interval of heights to index this iteration.
    ///
    /// Continuous mode resumes from the store's max recorded height (or the
    /// first indexable height when the store is empty) up to the current
    /// chain height. Bounded mode uses the configured bounds, but refuses a
    /// `to` beyond the current chain height. The store is queried in both
    /// modes: an unreachable store is fatal even when the bounds do not
    /// depend on its answer, so a backfill against a down store aborts
    /// instead of absorbing every write as a task failure. An empty range
    /// (`lower > upper`) means nothing to do and is not an error.
    pub async fn resolve(&self) -> Result<RangeInclusive<u64>> {
        let max_recorded = self
            .store
            .max_recorded_height()
            .await
            .context("failed to read max recorded height from store")?;

        let lower = match self.mode {
            RunMode::Bounded { from, .. } => from,
            RunMode::Continuous => match max_recorded {
                Some(max) => max + 1,
                None => FIRST_INDEXABLE_HEIGHT,
            },
        };

        let current = self
            .readers
            .current_height()
            .await
            .context("failed to determine current chain height")?;

        let upper = match self.mode {
            RunMode::Bounded { to, .. } => {
                if to > current {
                    bail!("end height {to} is higher than the current chain height {current}");
                }
                to
            }
            RunMode::Continuous => current,
        };

        Ok(lower..=upper)
    }
}
