//! One reconciliation pass over the whole watch list.
//!
//! The scanner fetches a snapshot restricted to the watched lookup keys,
//! runs the tracker and renderer for every entity, refreshes TTL-gated
//! provider info, and reports which entities flipped online or offline.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

use crate::details::render_with_attributes;
use crate::snapshot::Snapshot;
use crate::tracker::{reconcile, Transition};
use crate::types::{ProviderInfo, WatchedEntity};

/// Default refresh interval for provider info.
pub const DEFAULT_INFO_TTL_SECS: i64 = 60;

/// Source of presence snapshots and per-player profile data.
///
/// Implementations never fail loudly: a failed fetch is
/// [`Snapshot::invalid`] or `None`.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetches who is present, restricted to `lookup_keys` (ids and
    /// lowercase names).
    async fn fetch_snapshot(&self, lookup_keys: &BTreeSet<String>) -> Snapshot;

    /// Fetches profile data for one provider id.
    async fn fetch_extended_info(&self, provider_id: &str) -> Option<ProviderInfo>;
}

/// An online/offline edge observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    /// Position of the entity in the scanned slice.
    pub index: usize,
    pub key: String,
    pub online: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// True when no usable snapshot was available and nothing was touched.
    pub skipped: bool,
    /// True if any user-visible field of any entity changed.
    pub changed: bool,
    /// True if any persisted field changed, including bookkeeping that is
    /// never shown (`last_seen_at`, `info.fetched_at`). Implied by `changed`.
    pub needs_save: bool,
    pub transitions: Vec<StatusTransition>,
}

impl ScanOutcome {
    fn skipped() -> Self {
        ScanOutcome {
            skipped: true,
            ..ScanOutcome::default()
        }
    }
}

/// The user-visible projection of an entity, compared before and after a pass.
#[derive(Debug, Clone, PartialEq)]
struct ObservedState {
    online: bool,
    resolved_name: String,
    resolved_id: Option<String>,
    display_duration: String,
    details: Vec<String>,
    current_server_name: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    provider_last_seen_at: Option<DateTime<Utc>>,
    steam_id: Option<String>,
}

impl ObservedState {
    fn of(entity: &WatchedEntity) -> Self {
        ObservedState {
            online: entity.online,
            resolved_name: entity.resolved_name.clone(),
            resolved_id: entity.resolved_id.clone(),
            display_duration: entity.display_duration.clone(),
            details: entity.details.clone(),
            current_server_name: entity.current_server_name.clone(),
            created_at: entity.info.created_at,
            updated_at: entity.info.updated_at,
            provider_last_seen_at: entity.info.last_seen_at,
            steam_id: entity.info.steam_id.clone(),
        }
    }
}

/// Lowercased trimmed keys plus resolved provider ids.
pub fn lookup_keys(entities: &[WatchedEntity]) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for entity in entities {
        let key = entity.key.trim().to_lowercase();
        if !key.is_empty() {
            keys.insert(key);
        }
        if let Some(id) = entity.provider_id() {
            keys.insert(id.to_string());
        }
    }
    keys
}

#[derive(Debug, Clone)]
pub struct Scanner {
    info_ttl: Duration,
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new(Duration::seconds(DEFAULT_INFO_TTL_SECS))
    }
}

impl Scanner {
    pub fn new(info_ttl: Duration) -> Self {
        Scanner { info_ttl }
    }

    /// Runs one pass. An invalid snapshot leaves every entity untouched.
    pub async fn scan(
        &self,
        provider: &dyn SnapshotProvider,
        entities: &mut [WatchedEntity],
        now: DateTime<Utc>,
    ) -> ScanOutcome {
        let keys = lookup_keys(entities);
        if keys.is_empty() {
            return ScanOutcome::skipped();
        }

        let mut snapshot = provider.fetch_snapshot(&keys).await;
        if !snapshot.valid {
            tracing::warn!(watched = entities.len(), "Presence snapshot unavailable, skipping cycle");
            return ScanOutcome::skipped();
        }
        snapshot.restrict_to(&keys);
        tracing::debug!(
            watched = entities.len(),
            matched_keys = snapshot.len(),
            "Presence snapshot fetched"
        );

        let mut outcome = ScanOutcome::default();
        for (index, entity) in entities.iter_mut().enumerate() {
            let before = ObservedState::of(entity);
            let record_before = entity.clone();

            let found = snapshot.lookup(entity);
            let attributes = found.map(|found| found.attributes);
            let transition = reconcile(entity, found, now);

            self.refresh_info(provider, entity, now).await;
            entity.details = render_with_attributes(entity, attributes, now);

            if ObservedState::of(entity) != before {
                outcome.changed = true;
            }
            if *entity != record_before {
                outcome.needs_save = true;
            }
            if transition.is_edge() {
                let online = transition == Transition::Joined;
                tracing::info!(key = %entity.key, online, "Presence changed");
                outcome.transitions.push(StatusTransition {
                    index,
                    key: entity.key.clone(),
                    online,
                });
            }
        }

        outcome
    }

    async fn refresh_info(
        &self,
        provider: &dyn SnapshotProvider,
        entity: &mut WatchedEntity,
        now: DateTime<Utc>,
    ) {
        let Some(id) = entity.provider_id().map(str::to_string) else {
            return;
        };
        let fresh_enough = entity
            .info
            .fetched_at
            .is_some_and(|fetched| now.signed_duration_since(fetched) < self.info_ttl);
        if fresh_enough {
            return;
        }

        match provider.fetch_extended_info(&id).await {
            Some(info) => entity.info.absorb(info, now),
            None => tracing::debug!(key = %entity.key, provider_id = %id, "Provider info unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_keys_lowercases_and_adds_ids() {
        let mut bob = WatchedEntity::new("Bob", "", 0);
        bob.resolved_id = Some("77".to_string());
        let blank = WatchedEntity::new("   ", "", 1);
        let keys = lookup_keys(&[WatchedEntity::new(" Alice ", "", 0), bob, blank]);
        let expected: BTreeSet<String> = ["alice", "bob", "77"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_observed_state_ignores_fetch_time() {
        let mut entity = WatchedEntity::new("alice", "", 0);
        let before = ObservedState::of(&entity);
        entity.info.fetched_at = Some(Utc::now());
        entity.last_seen_at = Some(Utc::now());
        assert_eq!(ObservedState::of(&entity), before);
    }
}
