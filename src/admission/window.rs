//! Per-client sliding-window request log.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::policy::{AdmissionPolicy, AdmissionStatus, Decision};

/// Timestamps of one client's recent admitted requests.
///
/// The log is kept in ascending order. It is not synchronized on its own;
/// the table guarantees exclusive access while a window is evaluated.
#[derive(Debug, Clone)]
pub struct ClientWindow {
    /// Admission instants, oldest first
    timestamps: VecDeque<Instant>,
    /// Last instant this client was evaluated, admitted or not
    last_seen: Instant,
}

impl ClientWindow {
    /// Create an empty window for a client first seen at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            timestamps: VecDeque::new(),
            last_seen: now,
        }
    }

    /// Drop every timestamp at least `window` old relative to `now`.
    ///
    /// If `now` precedes a stored timestamp the clock went backwards and
    /// nothing from that point on is pruned.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            match now.checked_duration_since(oldest) {
                Some(age) if age >= window => {
                    self.timestamps.pop_front();
                }
                _ => break,
            }
        }
    }

    /// Prune, then admit and record `now` if the client is under quota.
    pub fn try_admit(&mut self, now: Instant, policy: &AdmissionPolicy) -> AdmissionStatus {
        let limit = policy.limit();
        let window = policy.window();

        self.prune(now, window);
        if now > self.last_seen {
            self.last_seen = now;
        }

        if self.timestamps.len() >= limit as usize {
            return AdmissionStatus {
                decision: Decision::Reject,
                limit,
                remaining: 0,
                retry_after: Some(self.retry_after(now, window)),
            };
        }

        // A backward clock step must not break the ascending order.
        let stamp = match self.timestamps.back() {
            Some(&newest) if newest > now => newest,
            _ => now,
        };
        self.timestamps.push_back(stamp);

        AdmissionStatus {
            decision: Decision::Allow,
            limit,
            remaining: limit.saturating_sub(self.timestamps.len() as u32),
            retry_after: None,
        }
    }

    /// Time until the oldest recorded request leaves the window.
    fn retry_after(&self, now: Instant, window: Duration) -> Duration {
        match self.timestamps.front() {
            Some(&oldest) => oldest
                .checked_add(window)
                .map(|expiry| expiry.saturating_duration_since(now))
                .unwrap_or(window),
            None => Duration::ZERO,
        }
    }

    /// Number of recorded timestamps still inside the window at `now`.
    ///
    /// Does not mutate; stale entries are counted out rather than removed.
    pub fn in_window(&self, now: Instant, window: Duration) -> usize {
        self.timestamps
            .iter()
            .filter(|&&t| match now.checked_duration_since(t) {
                Some(age) => age < window,
                None => true,
            })
            .count()
    }

    /// Whether this entry can be dropped from the table.
    ///
    /// True once every timestamp has aged out and the client has not been
    /// evaluated for at least `window`.
    pub fn is_idle(&mut self, now: Instant, window: Duration) -> bool {
        self.prune(now, window);
        self.timestamps.is_empty()
            && now
                .checked_duration_since(self.last_seen)
                .is_some_and(|idle| idle >= window)
    }

    /// Number of stored timestamps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
