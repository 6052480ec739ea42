use crate::health::HealthTracker;
use crate::state::SharedSnapshotStore;
use crate::sync::{SyncReport, Synchronizer};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Drives the synchronizer: one cycle on demand, then forever at a fixed
/// interval on its own task.
#[derive(Clone)]
pub struct RefreshScheduler {
    synchronizer: Synchronizer,
    store: SharedSnapshotStore,
    health: HealthTracker,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(
        synchronizer: Synchronizer,
        store: SharedSnapshotStore,
        health: HealthTracker,
        interval: Duration,
    ) -> Self {
        Self {
            synchronizer,
            store,
            health,
            interval,
        }
    }

    /// Runs one cycle. The store is only replaced when the catalog actually
    /// answered; otherwise the previous snapshot keeps being served.
    pub async fn refresh_once(&self) -> SyncReport {
        info!("Refreshing websites data from Consul...");
        let (snapshot, report) = self.synchronizer.synchronize().await;

        if report.is_usable() {
            self.store.replace(snapshot).await;
        } else {
            warn!("No websites data received from Consul, keeping previous snapshot");
        }
        self.health.record_refresh(&report);
        report
    }

    /// Spawns the periodic loop. The first tick fires one interval from now,
    /// the startup cycle being run by the caller. A slow cycle delays the
    /// next one instead of queueing extra runs.
    pub fn spawn(self) -> JoinHandle<()> {
        info!("Starting refresh loop (every {}s)", self.interval.as_secs());
        tokio::spawn(async move {
            let now = tokio::time::Instant::now();
            let mut interval = match now.checked_add(self.interval) {
                Some(start) => tokio::time::interval_at(start, self.interval),
                None => {
                    warn!("Refresh interval too large to schedule, refreshing immediately");
                    tokio::time::interval(self.interval)
                }
            };
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                self.refresh_once().await;
            }
        })
    }
}
