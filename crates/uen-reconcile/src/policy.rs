use std::time::Duration;

/// Bounds on the reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures of a single-identifier batch before that
    /// identifier is quarantined. `0` disables quarantine.
    pub quarantine_after: usize,
    /// Consecutive submission failures before giving up.
    pub max_consecutive_failures: usize,
    /// Wall-clock budget for the whole run.
    pub max_duration: Option<Duration>,
    /// Consecutive remote read failures before giving up.
    pub max_remote_read_failures: usize,
    pub remote_read_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            quarantine_after: 3,
            max_consecutive_failures: 32,
            max_duration: None,
            max_remote_read_failures: 5,
            remote_read_delay: Duration::from_secs(2),
        }
    }
}
