use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

const DEFAULT_RETRY_BUDGET: u32 = 3;
const DEFAULT_CLIENT_RETRIES: u32 = 3;
const DEFAULT_CONCURRENCY: usize = 100;
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

const ENV_PRIMARY_URL: &str = "CHAINFILL_PRIMARY_URL";
const ENV_FALLBACK_URL: &str = "CHAINFILL_FALLBACK_URL";
const ENV_RETRY_BUDGET: &str = "CHAINFILL_RETRY_BUDGET";
const ENV_CLIENT_RETRIES: &str = "CHAINFILL_CLIENT_RETRIES";
const ENV_CONCURRENCY: &str = "CHAINFILL_CONCURRENCY";
const ENV_POLL_INTERVAL_MS: &str = "CHAINFILL_POLL_INTERVAL_MS";
const ENV_REQUEST_TIMEOUT_MS: &str = "CHAINFILL_REQUEST_TIMEOUT_MS";
const ENV_FROM_HEIGHT: &str = "CHAINFILL_FROM_HEIGHT";
const ENV_TO_HEIGHT: &str = "CHAINFILL_TO_HEIGHT";

/// Whether the indexer tails new heights forever or backfills a fixed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// No end height; the loop re-resolves a range after every poll interval.
    Continuous,
    /// Fixed inclusive range `[from, to]`; the loop runs exactly once.
    Bounded { from: u64, to: u64 },
}

impl RunMode {
    pub fn is_bounded(&self) -> bool {
        matches!(self, RunMode::Bounded { .. })
    }

    /// Derived timing is suppressed only for the first height of a bounded
    /// run: it has no preceding height within the run to measure against.
    pub fn timing_enabled(&self, height: u64) -> bool {
        match self {
            RunMode::Continuous => true,
            RunMode::Bounded { from, .. } => height != *from,
        }
    }
}

/// Runtime configuration for the indexing orchestrator.
///
/// All instances must be constructed via [`IndexerConfig::builder`],
/// [`IndexerConfig::new`], or [`IndexerConfig::from_env`] so invariants are
/// validated before any work is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    primary_url: String,
    fallback_url: Option<String>,
    retry_budget: u32,
    client_retries: u32,
    concurrency: usize,
    poll_interval: Duration,
    request_timeout: Duration,
    mode: RunMode,
}

pub struct IndexerConfigParams {
    pub primary_url: String,
    pub fallback_url: Option<String>,
    pub retry_budget: u32,
    pub client_retries: u32,
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub mode: RunMode,
}

impl IndexerConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// Prefer [`IndexerConfig::builder`] when many values use defaults.
    pub fn new(params: IndexerConfigParams) -> Result<Self> {
        let IndexerConfigParams {
            primary_url,
            fallback_url,
            retry_budget,
            client_retries,
            concurrency,
            poll_interval,
            request_timeout,
            mode,
        } = params;

        let config = Self {
            primary_url: primary_url.trim().to_owned(),
            fallback_url: fallback_url
                .map(|url| url.trim().to_owned())
                .filter(|url| !url.is_empty()),
            retry_budget,
            client_retries,
            concurrency,
            poll_interval,
            request_timeout,
            mode,
        };

        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from `CHAINFILL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let primary_url =
            env::var(ENV_PRIMARY_URL).with_context(|| format!("{ENV_PRIMARY_URL} must be set"))?;
        let fallback_url = env::var(ENV_FALLBACK_URL).ok();

        let retry_budget = env_parsed(ENV_RETRY_BUDGET)?.unwrap_or(DEFAULT_RETRY_BUDGET);
        let client_retries = env_parsed(ENV_CLIENT_RETRIES)?.unwrap_or(DEFAULT_CLIENT_RETRIES);
        let concurrency = env_parsed(ENV_CONCURRENCY)?.unwrap_or(DEFAULT_CONCURRENCY);
        let poll_interval_ms = env_parsed(ENV_POLL_INTERVAL_MS)?.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let request_timeout_ms =
            env_parsed(ENV_REQUEST_TIMEOUT_MS)?.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        let mode = mode_from_heights(env_parsed(ENV_FROM_HEIGHT)?, env_parsed(ENV_TO_HEIGHT)?)?;

        Self::new(IndexerConfigParams {
            primary_url,
            fallback_url,
            retry_budget,
            client_retries,
            concurrency,
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
            mode,
        })
    }

    /// Primary reader endpoint URL.
    pub fn primary_url(&self) -> &str {
        &self.primary_url
    }

    /// Fallback reader endpoint URL, if a secondary endpoint is configured.
    pub fn fallback_url(&self) -> Option<&str> {
        self.fallback_url.as_deref()
    }

    /// Attempts per reader before that reader is considered exhausted for a task.
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// Transport-level attempts inside the RPC reader per call.
    pub fn client_retries(&self) -> u32 {
        self.client_retries
    }

    /// Total concurrency limiter capacity (slots).
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Sleep between continuous-mode iterations.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Per-request timeout applied to the RPC reader.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.primary_url, "primary_url")?;
        if let Some(fallback_url) = &self.fallback_url {
            validate_url(fallback_url, "fallback_url")?;
        }

        if self.retry_budget == 0 {
            bail!("retry_budget must be greater than 0");
        }

        if self.client_retries == 0 {
            bail!("client_retries must be greater than 0");
        }

        if self.concurrency == 0 {
            bail!("concurrency must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            bail!("poll_interval must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }

        if let RunMode::Bounded { from, to } = self.mode {
            if to < from {
                bail!("end height {to} is lower than start height {from}");
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct IndexerConfigBuilder {
    primary_url: Option<String>,
    fallback_url: Option<String>,
    retry_budget: Option<u32>,
    client_retries: Option<u32>,
    concurrency: Option<usize>,
    poll_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    mode: Option<RunMode>,
}

impl IndexerConfigBuilder {
    pub fn primary_url(mut self, url: impl Into<String>) -> Self {
        self.primary_url = Some(url.into());
        self
    }

    pub fn fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = Some(budget);
        self
    }

    pub fn client_retries(mut self, retries: u32) -> Self {
        self.client_retries = Some(retries);
        self
    }

    pub fn concurrency(mut self, capacity: usize) -> Self {
        self.concurrency = Some(capacity);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Shorthand for a one-shot backfill over `[from, to]`.
    pub fn bounded(self, from: u64, to: u64) -> Self {
        self.mode(RunMode::Bounded { from, to })
    }

    pub fn build(self) -> Result<IndexerConfig> {
        let params = IndexerConfigParams {
            primary_url: self.primary_url.context("primary_url is required")?,
            fallback_url: self.fallback_url,
            retry_budget: self.retry_budget.unwrap_or(DEFAULT_RETRY_BUDGET),
            client_retries: self.client_retries.unwrap_or(DEFAULT_CLIENT_RETRIES),
            concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            poll_interval: self
                .poll_interval
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)),
            mode: self.mode.unwrap_or(RunMode::Continuous),
        };

        IndexerConfig::new(params)
    }
}

/// Both heights present selects a bounded run; exactly one present is a
/// configuration error rather than a silently ignored half-range.
fn mode_from_heights(from: Option<u64>, to: Option<u64>) -> Result<RunMode> {
    match (from, to) {
        (Some(from), Some(to)) => Ok(RunMode::Bounded { from, to }),
        (None, None) => Ok(RunMode::Continuous),
        (Some(_), None) => {
            bail!("{ENV_FROM_HEIGHT} is set but {ENV_TO_HEIGHT} is not; set both or neither")
        }
        (None, Some(_)) => {
            bail!("{ENV_TO_HEIGHT} is set but {ENV_FROM_HEIGHT} is not; set both or neither")
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} has invalid value {raw:?}"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

fn validate_url(url: &str, field: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{field} must start with http:// or https://");
    }
    Ok(())
}
