//! One complete monitoring cycle and alert delivery.
//!
//! [`Monitor`] owns the cross-cycle state (the group gate) and turns a scan
//! into alert intents. Delivery goes through [`Notifier`]; whether an intent
//! actually reaches the user is the notifier's business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::gate::GroupGate;
use crate::scan::{ScanOutcome, Scanner, SnapshotProvider};
use crate::types::{GroupSettings, WatchedEntity};

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertIntent {
    StatusChange {
        key: String,
        display_name: String,
        online: bool,
    },
    GroupAllOffline {
        group_key: String,
        display_name: String,
    },
}

/// Delivers alerts to the user. Implementations must bound their own
/// latency; a slow delivery delays the next cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_status_change(&self, display_name: &str, online: bool) -> Result<()>;
    async fn notify_group_all_offline(&self, group_name: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// True if any user-visible field changed.
    pub changed: bool,
    /// True if the entity list should be persisted.
    pub needs_save: bool,
    pub alerts: Vec<AlertIntent>,
    pub online_count: usize,
}

#[derive(Debug, Default)]
pub struct Monitor {
    scanner: Scanner,
    gate: GroupGate,
}

impl Monitor {
    pub fn new(scanner: Scanner) -> Self {
        Monitor {
            scanner,
            gate: GroupGate::new(),
        }
    }

    /// Scans, converts edges into alerts, then runs the group gate.
    ///
    /// The gate is skipped when the snapshot was unusable so that a failed
    /// fetch cannot move any group baseline.
    pub async fn run_cycle(
        &mut self,
        provider: &dyn SnapshotProvider,
        entities: &mut [WatchedEntity],
        settings: &GroupSettings,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let ScanOutcome {
            skipped,
            changed,
            needs_save,
            transitions,
        } = self.scanner.scan(provider, entities, now).await;
        if skipped {
            return CycleReport {
                changed: false,
                needs_save: false,
                alerts: Vec::new(),
                online_count: entities.iter().filter(|entity| entity.online).count(),
            };
        }

        let mut alerts = Vec::new();
        for transition in &transitions {
            let Some(entity) = entities.get(transition.index) else {
                continue;
            };
            if !entity.notifications_enabled() || !settings.notifications_enabled(&entity.group_key()) {
                tracing::debug!(key = %entity.key, "Status alert muted");
                continue;
            }
            alerts.push(AlertIntent::StatusChange {
                key: entity.key.clone(),
                display_name: entity.display_name().to_string(),
                online: transition.online,
            });
        }

        for alert in self.gate.evaluate(entities, settings) {
            tracing::info!(group = %alert.group_key, "Group went fully offline");
            alerts.push(AlertIntent::GroupAllOffline {
                group_key: alert.group_key,
                display_name: alert.display_name,
            });
        }

        CycleReport {
            changed,
            needs_save,
            alerts,
            online_count: entities.iter().filter(|entity| entity.online).count(),
        }
    }
}

/// Sends every intent. Failures are logged and dropped.
pub async fn dispatch(notifier: &dyn Notifier, alerts: &[AlertIntent]) -> usize {
    let mut delivered = 0;
    for alert in alerts {
        let result = match alert {
            AlertIntent::StatusChange {
                display_name,
                online,
                ..
            } => notifier.notify_status_change(display_name, *online).await,
            AlertIntent::GroupAllOffline { display_name, .. } => {
                notifier.notify_group_all_offline(display_name).await
            }
        };
        match result {
            Ok(()) => delivered += 1,
            Err(err) => tracing::warn!(error = %err, ?alert, "Failed to deliver alert"),
        }
    }
    delivered
}
