use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// How handler attempts of one call are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One attempt at a time, in dispatch order.
    Sequential,
    /// Attempts run as separate tasks, bounded by `max_concurrency`.
    #[default]
    Concurrent,
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub execution: ExecutionMode,
    /// Stop dispatching once the policy's decision can no longer change.
    pub fail_fast: bool,
    /// Permits of the limiter shared by every call on one manager.
    pub max_concurrency: usize,
    /// Applied to each attempt unless the handler overrides it.
    pub handler_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::default(),
            fail_fast: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }
}

impl ManagerConfig {
    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Values below one are raised to one.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_handler_timeout(mut self, handler_timeout: Duration) -> Self {
        self.handler_timeout = handler_timeout;
        self
    }
}
