use connectors::lakehouse::config::DEFAULT_IDENTIFIER_COLUMN;
use engine_core::retry::RetryPolicy;
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Immutable tuning knobs for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Maximum number of destinations synced at the same time. 1 keeps the
    /// tables strictly sequential in list order.
    pub concurrency: usize,
    /// Upper bound for a single fetch attempt.
    pub fetch_timeout: Duration,
    /// Applies to transient source failures and commit conflicts.
    pub retry: RetryPolicy,
    /// Merge key used when a destination table is created or upserted.
    pub identifier_columns: Vec<String>,
    pub page_size: Option<usize>,
    pub api_version: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_builder(SyncSettingsBuilder::default())
    }
}

impl SyncSettings {
    pub fn builder() -> SyncSettingsBuilder {
        SyncSettingsBuilder::default()
    }

    pub fn from_builder(builder: SyncSettingsBuilder) -> Self {
        let identifier_columns = builder
            .identifier_columns
            .filter(|cols| !cols.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_IDENTIFIER_COLUMN.to_string()]);

        Self {
            concurrency: builder.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1),
            fetch_timeout: builder
                .fetch_timeout
                .filter(|t| !t.is_zero())
                .unwrap_or(DEFAULT_FETCH_TIMEOUT),
            retry: builder.retry.unwrap_or_default(),
            identifier_columns,
            page_size: builder.page_size,
            api_version: builder.api_version,
        }
    }

    pub fn is_sequential(&self) -> bool {
        self.concurrency == 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncSettingsBuilder {
    concurrency: Option<usize>,
    fetch_timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    identifier_columns: Option<Vec<String>>,
    page_size: Option<usize>,
    api_version: Option<String>,
}

impl SyncSettingsBuilder {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the number of attempts while keeping the default backoff.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        let base = self.retry.take().unwrap_or_default();
        self.retry = Some(RetryPolicy::new(attempts, base.base_delay, base.max_delay));
        self
    }

    pub fn identifier_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns
            .into_iter()
            .map(Into::into)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.identifier_columns = Some(columns);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn build(self) -> SyncSettings {
        SyncSettings::from_builder(self)
    }
}
