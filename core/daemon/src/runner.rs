//! The polling loop.
//!
//! Each cycle reloads the watch list (the CLI may have edited it), runs the
//! monitor on a working copy, dispatches alerts, and merges the results into
//! a fresh reload before replacing the file. Cycles never overlap.

use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use presence_core::storage::{self, StorageConfig};
use presence_core::{dispatch, CycleReport, Monitor, Notifier, Scanner, SnapshotProvider};

pub struct Runner {
    storage: StorageConfig,
    provider: Box<dyn SnapshotProvider>,
    notifier: Box<dyn Notifier>,
    monitor: Monitor,
    interval: Duration,
}

impl Runner {
    pub fn new(
        storage: StorageConfig,
        provider: Box<dyn SnapshotProvider>,
        notifier: Box<dyn Notifier>,
        scanner: Scanner,
        interval: Duration,
    ) -> Self {
        Self {
            storage,
            provider,
            notifier,
            monitor: Monitor::new(scanner),
            interval,
        }
    }

    /// Runs one full cycle and persists the outcome.
    pub async fn run_once(&mut self) -> Result<CycleReport, String> {
        let mut working = storage::load_watch_list(&self.storage)?;
        if working.is_empty() {
            debug!("Watch list is empty, nothing to poll");
            return Ok(CycleReport::default());
        }

        let settings = working.settings().clone();
        let report = self
            .monitor
            .run_cycle(self.provider.as_ref(), working.entities_mut(), &settings, Utc::now())
            .await;

        if !report.alerts.is_empty() {
            let delivered = dispatch(self.notifier.as_ref(), &report.alerts).await;
            debug!(alerts = report.alerts.len(), delivered, "Alerts dispatched");
        }

        if report.needs_save {
            let mut fresh = storage::load_watch_list(&self.storage)?;
            let merged = fresh.absorb_cycle(working.entities());
            storage::save_entities(&self.storage, fresh.entities())?;
            debug!(merged, online = report.online_count, "Watch list saved");
        }

        Ok(report)
    }

    /// Polls forever. Errors are logged and the next cycle still runs.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            root = %self.storage.root().display(),
            "Presence daemon polling"
        );
        loop {
            if let Err(err) = self.run_once().await {
                warn!(error = %err, "Monitoring cycle failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
