//! Request admission controller.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use super::policy::{AdmissionPolicy, AdmissionStatus, Decision};
use super::table::AdmissionTable;

/// Decides whether each inbound request may proceed.
///
/// The controller applies a single [`AdmissionPolicy`] to every client,
/// keyed by client identifier, using a sliding-window log kept in a shared
/// [`AdmissionTable`]. It is thread-safe and meant to be shared behind an
/// `Arc` by every request handler.
pub struct AdmissionController {
    /// Per-client request windows
    table: Arc<AdmissionTable>,
    /// Quota applied to every client
    policy: AdmissionPolicy,
}

impl AdmissionController {
    /// Create a controller over an existing table.
    pub fn new(table: Arc<AdmissionTable>, policy: AdmissionPolicy) -> Self {
        Self { table, policy }
    }

    /// Create a controller with a fresh table using the default shard count.
    pub fn with_policy(policy: AdmissionPolicy) -> Self {
        Self::new(Arc::new(AdmissionTable::new()), policy)
    }

    /// Decide whether a request from `client` at `now` is admitted.
    pub fn admit(&self, client: &str, now: Instant) -> Decision {
        self.evaluate(client, now).decision
    }

    /// Decide and report the quota state the decision was made against.
    pub fn evaluate(&self, client: &str, now: Instant) -> AdmissionStatus {
        let status = self.table.evaluate(client, now, &self.policy);

        match status.decision {
            Decision::Allow => trace!(
                client = %client,
                remaining = status.remaining,
                "Request within quota"
            ),
            Decision::Reject => debug!(
                client = %client,
                limit = status.limit,
                retry_after_ms = status.retry_after.map(|d| d.as_millis() as u64).unwrap_or(0),
                "Rate limit exceeded"
            ),
        }

        status
    }

    /// Remove idle clients. Returns how many were dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        self.table.sweep(now, self.policy.window())
    }

    /// Requests from `client` currently counted against its quota.
    pub fn in_window(&self, client: &str, now: Instant) -> usize {
        self.table.in_window(client, now, self.policy.window())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.table.len()
    }

    /// Get the policy applied by this controller.
    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Get the underlying table.
    pub fn table(&self) -> &Arc<AdmissionTable> {
        &self.table
    }

    /// Forget every client.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.table.clear();
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::with_policy(AdmissionPolicy::default())
    }
}
