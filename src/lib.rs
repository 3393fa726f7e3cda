pub mod orchestrator;
pub mod reader;
pub mod retry;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use orchestrator::Orchestrator;
pub use reader::client::{reader_pair_from_config, ReaderOptions, RpcChainReader};
pub use reader::types::{Account, AppRef, Block, NodeRef, Transaction};
pub use reader::{ChainReader, ReaderPair};
pub use retry::with_retry;
pub use runtime::config::{IndexerConfig, IndexerConfigBuilder, IndexerConfigParams, RunMode};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, spawn_metrics_reporter, Telemetry, TelemetrySnapshot};
pub use scheduler::limiter::{ConcurrencyLimiter, Slot};
pub use scheduler::range::HeightRangeResolver;
pub use scheduler::task::{IndexingTask, TaskKind, TaskOutcome, TaskRunner};
pub use store::Store;
