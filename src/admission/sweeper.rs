//! Background eviction of idle clients.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::clock::Clock;
use super::controller::AdmissionController;

/// Periodically sweeps idle clients out of the admission table.
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current tokio runtime.
    pub fn spawn(
        controller: Arc<AdmissionController>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        info!(interval_ms = interval.as_millis() as u64, "Starting idle client sweeper");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = controller.sweep(clock.now());
                        if removed > 0 {
                            debug!(
                                removed = removed,
                                tracked = controller.tracked_clients(),
                                "Swept idle clients"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Self { shutdown_tx, handle }
    }

    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(self) {
        info!("Stopping idle client sweeper");
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{AdmissionPolicy, ManualClock};

    #[tokio::test]
    async fn test_sweeper_evicts_idle_clients() {
        let clock = Arc::new(ManualClock::new());
        let controller = Arc::new(AdmissionController::with_policy(AdmissionPolicy::new(
            5,
            Duration::from_secs(60),
        )));

        controller.admit("a", clock.now());
        controller.admit("b", clock.now());
        clock.advance(Duration::from_secs(61));

        let sweeper = Sweeper::spawn(controller.clone(), clock.clone(), Duration::from_millis(10));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while controller.tracked_clients() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(controller.tracked_clients(), 0);
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_keeps_active_clients() {
        let clock = Arc::new(ManualClock::new());
        let controller = Arc::new(AdmissionController::default());

        controller.admit("active", clock.now());

        let sweeper = Sweeper::spawn(controller.clone(), clock.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(controller.tracked_clients(), 1);
        sweeper.shutdown().await;
    }
}
