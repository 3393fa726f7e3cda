use crate::orchestrator::Orchestrator;
use crate::reader::ChainReader;
use crate::store::Store;
use anyhow::Result;
use tokio::signal;

/// Wraps an [`Orchestrator`] and handles OS signals for shutdown.
///
/// The orchestrator exposes no mid-run cancellation: stopping a continuous
/// run means terminating the process, which abandons in-flight tasks. Writes
/// already issued may land; anything else is re-attempted on the next start
/// because the range resolver recomputes from the store's max height (store
/// writes are idempotent, so the re-attempt is safe).
pub struct Runner<R, S> {
    orchestrator: Orchestrator<R, S>,
}

impl<R: ChainReader, S: Store> Runner<R, S> {
    pub fn new(orchestrator: Orchestrator<R, S>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator<R, S> {
        &self.orchestrator
    }

    /// Runs until the orchestrator finishes (bounded mode, or a fatal
    /// resolution error) or a Ctrl-C (SIGINT) is received.
    pub async fn run_until_ctrl_c(&self) -> Result<()> {
        tokio::select! {
            result = self.orchestrator.run() => result,
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; abandoning in-flight tasks and shutting down");
                Ok(())
            }
        }
    }
}
