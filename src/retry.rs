//! Fixed-attempt retry combinator shared by the task runner and the RPC
//! transport client. The loop is "fixed attempts, not fixed duration": there
//! is no backoff between attempts, and the budget counts attempts, not time.

use anyhow::Result;
use std::future::Future;

/// Runs `operation` up to `budget` times, returning the first success or the
/// last error once the budget is exhausted.
///
/// A budget of zero is treated as one attempt; the operation always runs at
/// least once.
pub async fn with_retry<T, F, Fut>(budget: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let budget = budget.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < budget => {
                tracing::debug!(attempt, budget, error = %err, "attempt failed; retrying");
            }
            Err(err) => return Err(err),
        }
    }
}
