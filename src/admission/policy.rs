//! Admission policy and decision types.

use std::time::Duration;

/// Default number of requests a client may make per window.
pub const DEFAULT_LIMIT: u32 = 60;
/// Default rolling window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// How many requests a client may make within a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    limit: u32,
    window: Duration,
}

impl AdmissionPolicy {
    /// Create a new policy.
    ///
    /// A zero limit rejects every request; configuration validation keeps
    /// that out of the running service.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Maximum requests per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rolling window length.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

/// Outcome of evaluating a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request was recorded and may proceed.
    Allow,
    /// The client is over quota; nothing was recorded.
    Reject,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// A decision together with the quota state it was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionStatus {
    /// The admission decision
    pub decision: Decision,
    /// The configured limit
    pub limit: u32,
    /// Requests still available in the current window after this one
    pub remaining: u32,
    /// Time until a slot frees up; only set on rejection
    pub retry_after: Option<Duration>,
}
