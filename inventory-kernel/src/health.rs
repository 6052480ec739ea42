use crate::state::{new_state, Shared};
use crate::sync::SyncReport;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Serialize)]
pub struct RefreshHealth {
    pub uptime_seconds: u64,
    pub websites: usize,
    pub refreshes: u64,
    pub failed_refreshes: u64,
    pub last_refresh: Option<String>,
    pub last_outcome: Option<SyncReport>,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    refreshes: Arc<AtomicU64>,
    failed_refreshes: Arc<AtomicU64>,
    last: Shared<Option<(OffsetDateTime, SyncReport)>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            refreshes: Arc::new(AtomicU64::new(0)),
            failed_refreshes: Arc::new(AtomicU64::new(0)),
            last: new_state(None),
        }
    }

    pub fn record_refresh(&self, report: &SyncReport) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        if !report.is_usable() {
            self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
        }
        *self.last.lock() = Some((OffsetDateTime::now_utc(), report.clone()));
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn get_health(&self, websites: usize) -> RefreshHealth {
        let last = self.last.lock().clone();
        let (last_refresh, last_outcome) = match last {
            Some((at, report)) => (at.format(&Rfc3339).ok(), Some(report)),
            None => (None, None),
        };

        RefreshHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            websites,
            refreshes: self.refreshes(),
            failed_refreshes: self.failed_refreshes.load(Ordering::Relaxed),
            last_refresh,
            last_outcome,
        }
    }
}
