//! Sharded table of per-client windows.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::trace;

use super::policy::{AdmissionPolicy, AdmissionStatus};
use super::window::ClientWindow;

/// Process-wide mapping from client identifier to its request window.
///
/// The map is split into shards, each behind its own lock. An evaluation
/// holds the shard lock for the duration of prune + compare + append, so
/// two requests from the same client can never interleave, while clients
/// on other shards proceed in parallel. Sweeping takes the same shard
/// locks one at a time.
pub struct AdmissionTable {
    clients: DashMap<String, ClientWindow>,
}

impl AdmissionTable {
    /// Create a table with the default shard count.
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Create a table with an explicit shard count.
    ///
    /// # Panics
    ///
    /// Panics if `shards` is not a power of two greater than one.
    pub fn with_shards(shards: usize) -> Self {
        Self {
            clients: DashMap::with_shard_amount(shards),
        }
    }

    /// Evaluate one request from `client` at `now` and record it if admitted.
    pub fn evaluate(&self, client: &str, now: Instant, policy: &AdmissionPolicy) -> AdmissionStatus {
        if let Some(mut window) = self.clients.get_mut(client) {
            return window.try_admit(now, policy);
        }

        // First request from this client; `entry` settles a creation race.
        let mut window = self
            .clients
            .entry(client.to_owned())
            .or_insert_with(|| {
                trace!(client = %client, "Tracking new client");
                ClientWindow::new(now)
            });
        window.try_admit(now, policy)
    }

    /// Number of requests from `client` still inside `window` at `now`.
    pub fn in_window(&self, client: &str, now: Instant, window: Duration) -> usize {
        self.clients
            .get(client)
            .map(|w| w.in_window(now, window))
            .unwrap_or(0)
    }

    /// Remove every client idle for at least `window`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: Instant, window: Duration) -> usize {
        let mut removed = 0;
        self.clients.retain(|_, w| {
            let idle = w.is_idle(now, window);
            if idle {
                removed += 1;
            }
            !idle
        });
        removed
    }

    /// Whether the table has an entry for `client`.
    pub fn contains(&self, client: &str) -> bool {
        self.clients.contains_key(client)
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.clients.clear();
    }
}

impl Default for AdmissionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Decision;
    use std::sync::{Arc, Barrier};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_first_request_creates_entry() {
        let table = AdmissionTable::new();
        let policy = AdmissionPolicy::new(3, secs(60));

        let status = table.evaluate("10.0.0.1", Instant::now(), &policy);
        assert_eq!(status.decision, Decision::Allow);
        assert!(table.contains("10.0.0.1"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_clients_are_independent() {
        let table = AdmissionTable::new();
        let policy = AdmissionPolicy::new(2, secs(60));
        let now = Instant::now();

        for _ in 0..5 {
            table.evaluate("noisy", now, &policy);
        }

        assert_eq!(table.evaluate("quiet", now, &policy).decision, Decision::Allow);
        assert_eq!(table.evaluate("quiet", now, &policy).decision, Decision::Allow);
        assert_eq!(table.evaluate("quiet", now, &policy).decision, Decision::Reject);
        assert_eq!(table.in_window("noisy", now, secs(60)), 2);
    }

    #[test]
    fn test_sweep_removes_idle_clients_only() {
        let table = AdmissionTable::with_shards(4);
        let policy = AdmissionPolicy::new(5, secs(60));
        let t0 = Instant::now();

        table.evaluate("old", t0, &policy);
        table.evaluate("recent", t0 + secs(30), &policy);

        assert_eq!(table.sweep(t0 + secs(45), secs(60)), 0);
        assert_eq!(table.sweep(t0 + secs(60), secs(60)), 1);
        assert!(!table.contains("old"));
        assert!(table.contains("recent"));

        assert_eq!(table.sweep(t0 + secs(90), secs(60)), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_memory_bounded_under_distinct_clients() {
        let table = AdmissionTable::new();
        let policy = AdmissionPolicy::new(60, secs(60));
        let t0 = Instant::now();

        for round in 0..10u64 {
            let now = t0 + secs(round * 60);
            for i in 0..100 {
                table.evaluate(&format!("client-{}-{}", round, i), now, &policy);
            }
            table.sweep(now, secs(60));
            assert!(table.len() <= 100, "round {} left {} entries", round, table.len());
        }
    }

    #[test]
    fn test_concurrent_same_client_respects_limit() {
        let table = Arc::new(AdmissionTable::new());
        let policy = AdmissionPolicy::new(10, secs(60));
        let now = Instant::now();
        let threads = 64;
        let barrier = Arc::new(Barrier::new(threads));

        let allowed: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let table = table.clone();
                    let barrier = barrier.clone();
                    s.spawn(move || {
                        barrier.wait();
                        table.evaluate("shared", now, &policy).decision.is_allowed() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(allowed, 10);
        assert_eq!(table.in_window("shared", now, secs(60)), 10);
    }

    #[test]
    fn test_concurrent_distinct_clients_all_admitted() {
        let table = Arc::new(AdmissionTable::with_shards(8));
        let policy = AdmissionPolicy::new(1, secs(60));
        let now = Instant::now();

        std::thread::scope(|s| {
            for t in 0..16 {
                let table = table.clone();
                s.spawn(move || {
                    for i in 0..50 {
                        let client = format!("{}-{}", t, i);
                        assert!(table.evaluate(&client, now, &policy).decision.is_allowed());
                    }
                });
            }
        });

        assert_eq!(table.len(), 16 * 50);
    }

    #[test]
    fn test_clear() {
        let table = AdmissionTable::new();
        table.evaluate("a", Instant::now(), &AdmissionPolicy::default());
        table.clear();
        assert!(table.is_empty());
    }
}
