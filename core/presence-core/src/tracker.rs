//! Per-entity session state machine.
//!
//! Turns "is this entity in the snapshot?" into online/offline edges,
//! session-length bookkeeping and hour-of-day histograms. Histograms and
//! totals move only on edges, never on steady-state repeats.
//!
//! ```text
//! offline ──(match)──────> online    join slot +1, session starts
//! online  ──(match)──────> online    start only moves on a fresh hint
//! online  ──(no match)───> offline   leave slot +1, session length banked
//! offline ──(no match)───> offline   nothing recorded
//! ```

use chrono::{DateTime, Utc};

use crate::format::{format_duration, local_hour, UNKNOWN_DURATION};
use crate::snapshot::SnapshotMatch;
use crate::types::WatchedEntity;

/// Which edge (if any) a reconcile step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Joined,
    StillOnline,
    Left,
    StillOffline,
}

impl Transition {
    pub fn is_edge(self) -> bool {
        matches!(self, Transition::Joined | Transition::Left)
    }
}

/// Applies one cycle's observation to an entity.
pub fn reconcile(
    entity: &mut WatchedEntity,
    found: Option<SnapshotMatch<'_>>,
    now: DateTime<Utc>,
) -> Transition {
    match found {
        Some(found) => mark_online(entity, found, now),
        None => mark_offline(entity, now),
    }
}

fn mark_online(entity: &mut WatchedEntity, found: SnapshotMatch<'_>, now: DateTime<Utc>) -> Transition {
    let was_online = entity.online;
    entity.online = true;

    if let Some(name) = found.attributes.name.as_deref() {
        entity.resolved_name = name.trim().to_string();
    } else if entity.resolved_name.trim().is_empty() {
        entity.resolved_name = entity.key.clone();
    }

    if let Some(server) = found.server_name {
        entity.current_server_name = Some(server.to_string());
    }

    if entity.provider_id().is_none() {
        let key = entity.key.trim();
        if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
            entity.resolved_id = Some(key.to_string());
        }
    }

    entity.last_seen_at = Some(now);

    if !was_online {
        entity.join_hour_counts.increment(local_hour(now));
        entity.session_start_at = Some(found.session_start_hint.unwrap_or(now));
    } else if let Some(hint) = found.session_start_hint {
        entity.session_start_at = Some(hint);
    } else if entity.session_start_at.is_none() {
        entity.session_start_at = Some(now);
    }

    let elapsed = entity
        .session_start_at
        .map(|start| now.signed_duration_since(start).num_seconds())
        .unwrap_or(0);
    entity.display_duration = if elapsed > 0 {
        format_duration(elapsed)
    } else {
        UNKNOWN_DURATION.to_string()
    };

    if was_online {
        Transition::StillOnline
    } else {
        Transition::Joined
    }
}

fn mark_offline(entity: &mut WatchedEntity, now: DateTime<Utc>) -> Transition {
    let was_online = entity.online;

    if was_online {
        if let Some(start) = entity.session_start_at {
            let session_secs = now.signed_duration_since(start).num_seconds().max(0);
            entity.last_session_secs = Some(session_secs);
            if session_secs > 0 {
                entity.total_session_secs = entity.total_session_secs.saturating_add(session_secs);
            }
        }
        entity.last_offline_at = Some(now);
        entity.leave_hour_counts.increment(local_hour(now));
    }

    entity.online = false;
    entity.session_start_at = None;
    entity.display_duration.clear();
    entity.current_server_name = None;

    if was_online {
        Transition::Left
    } else {
        Transition::StillOffline
    }
}
