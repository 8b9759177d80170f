//! Persisted data types for the watch list.
//!
//! Everything here round-trips through `watchlist.json` and
//! `group-settings.json`. Deserialization is lenient: missing or malformed
//! fields are repaired to safe defaults instead of failing the whole file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of hour-of-day slots in a join/leave histogram.
pub const HOURS_PER_DAY: usize = 24;

/// Group name used for entities that are not in any group.
pub const NO_GROUP: &str = "";

/// Per-hour event counters, one slot per local hour of day.
///
/// Always exactly [`HOURS_PER_DAY`] slots. Persisted as a plain JSON array;
/// a missing, `null`, short, long, or non-numeric array is repaired on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<Value>>", into = "Vec<u32>")]
pub struct HourHistogram([u32; HOURS_PER_DAY]);

impl Default for HourHistogram {
    fn default() -> Self {
        HourHistogram([0; HOURS_PER_DAY])
    }
}

impl HourHistogram {
    pub fn increment(&mut self, hour: usize) {
        if let Some(slot) = self.0.get_mut(hour) {
            *slot = slot.saturating_add(1);
        }
    }

    pub fn get(&self, hour: usize) -> u32 {
        self.0.get(hour).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &[u32; HOURS_PER_DAY] {
        &self.0
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|&count| u64::from(count)).sum()
    }

    /// Returns the busiest hour and its count. Ties go to the lowest hour;
    /// `None` when no slot is positive.
    pub fn mode(&self) -> Option<(usize, u32)> {
        let max = self.0.iter().copied().max()?;
        if max == 0 {
            return None;
        }
        self.0
            .iter()
            .position(|&count| count == max)
            .map(|hour| (hour, max))
    }
}

impl From<Option<Vec<Value>>> for HourHistogram {
    fn from(raw: Option<Vec<Value>>) -> Self {
        let mut counts = [0u32; HOURS_PER_DAY];
        for (slot, value) in counts.iter_mut().zip(raw.unwrap_or_default()) {
            *slot = value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
                .map(|count| u32::try_from(count).unwrap_or(u32::MAX))
                .unwrap_or(0);
        }
        HourHistogram(counts)
    }
}

impl From<HourHistogram> for Vec<u32> {
    fn from(histogram: HourHistogram) -> Self {
        histogram.0.to_vec()
    }
}

/// Provider-side profile data refreshed on a TTL, independent of presence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderInfo {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last time the provider itself saw the player (not our own observation).
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steam_id: Option<String>,
    /// When this info was last fetched successfully. Drives the refresh TTL.
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ProviderInfo {
    /// Replaces the profile fields with freshly fetched ones, keeping any
    /// previously known value the provider omitted this time.
    pub fn absorb(&mut self, fresh: ProviderInfo, now: DateTime<Utc>) {
        self.created_at = fresh.created_at.or(self.created_at);
        self.updated_at = fresh.updated_at.or(self.updated_at);
        self.last_seen_at = fresh.last_seen_at.or(self.last_seen_at);
        self.steam_id = fresh.steam_id.or_else(|| self.steam_id.take());
        self.fetched_at = Some(now);
    }

    /// The most recent provider-side activity timestamp.
    pub fn freshest_update(&self) -> Option<DateTime<Utc>> {
        match (self.updated_at, self.last_seen_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// One tracked identifier and everything learned about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedEntity {
    /// Identifier as typed by the user. Never rewritten.
    pub key: String,
    #[serde(default)]
    pub resolved_name: String,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub resolved_id: Option<String>,

    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub display_duration: String,
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub current_server_name: Option<String>,

    #[serde(default)]
    pub session_start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_offline_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_session_secs: Option<i64>,
    #[serde(default)]
    pub total_session_secs: i64,
    #[serde(default)]
    pub join_hour_counts: HourHistogram,
    #[serde(default)]
    pub leave_hour_counts: HourHistogram,

    /// Tri-state: `None` means never toggled, which counts as enabled.
    #[serde(default)]
    pub notifications_enabled: Option<bool>,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub sort_order: i32,

    #[serde(default)]
    pub info: ProviderInfo,
}

impl WatchedEntity {
    pub fn new(key: &str, group: &str, sort_order: i32) -> Self {
        let key = key.trim().to_string();
        WatchedEntity {
            resolved_name: key.clone(),
            original_name: Some(key.clone()),
            key,
            resolved_id: None,
            online: false,
            display_duration: String::new(),
            details: Vec::new(),
            current_server_name: None,
            session_start_at: None,
            last_seen_at: None,
            last_offline_at: None,
            last_session_secs: None,
            total_session_secs: 0,
            join_hour_counts: HourHistogram::default(),
            leave_hour_counts: HourHistogram::default(),
            notifications_enabled: None,
            group: normalize_group_name(group),
            sort_order,
            info: ProviderInfo::default(),
        }
    }

    /// Name to show to humans: the resolved name, or the key if none.
    pub fn display_name(&self) -> &str {
        let name = self.resolved_name.trim();
        if name.is_empty() {
            self.key.trim()
        } else {
            name
        }
    }

    /// Non-blank resolved provider id, if any.
    pub fn provider_id(&self) -> Option<&str> {
        self.resolved_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Stable identity used for group membership: resolved id, else key.
    pub fn identity(&self) -> &str {
        self.provider_id().unwrap_or_else(|| self.key.trim())
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled != Some(false)
    }

    pub fn group_key(&self) -> String {
        group_key(&self.group)
    }

    /// Field-level repair applied to records read from disk.
    /// Returns true if anything was changed.
    pub fn repair(&mut self) -> bool {
        let mut repaired = false;
        let trimmed = self.key.trim();
        if trimmed.len() != self.key.len() {
            self.key = trimmed.to_string();
            repaired = true;
        }
        if self.resolved_name.trim().is_empty() {
            self.resolved_name = self.key.clone();
            repaired = true;
        }
        if self
            .original_name
            .as_deref()
            .map_or(true, |name| name.trim().is_empty())
        {
            self.original_name = Some(self.key.clone());
            repaired = true;
        }
        let before = self.details.len();
        self.details = crate::details::merge_details(std::mem::take(&mut self.details));
        repaired |= self.details.len() != before;
        if self.total_session_secs < 0 {
            self.total_session_secs = 0;
            repaired = true;
        }
        if !self.online && self.session_start_at.is_some() {
            self.session_start_at = None;
            repaired = true;
        }
        repaired
    }
}

/// Per-group preferences persisted alongside the watch list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupSettings {
    /// Group key → group-wide notifications enabled. Missing means enabled.
    #[serde(default)]
    pub notifications: BTreeMap<String, bool>,
    /// Group key → name as the user last typed it.
    #[serde(default)]
    pub display_names: BTreeMap<String, String>,
    /// Explicit group ordering by key.
    #[serde(default)]
    pub order: Vec<String>,
}

impl GroupSettings {
    pub fn notifications_enabled(&self, group_key: &str) -> bool {
        self.notifications.get(group_key).copied().unwrap_or(true)
    }
}

/// Trims a group name. Blank names mean "no group".
pub fn normalize_group_name(name: &str) -> String {
    name.trim().to_string()
}

/// Case-insensitive identity of a group.
pub fn group_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_missing_field_is_zeroed() {
        let entity: WatchedEntity = serde_json::from_str(r#"{"key":"alice"}"#).unwrap();
        assert_eq!(entity.join_hour_counts.counts().len(), HOURS_PER_DAY);
        assert_eq!(entity.join_hour_counts.total(), 0);
        assert_eq!(entity.leave_hour_counts.total(), 0);
    }

    #[test]
    fn test_histogram_null_and_short_arrays_are_repaired() {
        let entity: WatchedEntity = serde_json::from_str(
            r#"{"key":"alice","join_hour_counts":null,"leave_hour_counts":[1,2,3]}"#,
        )
        .unwrap();
        assert_eq!(entity.join_hour_counts, HourHistogram::default());
        assert_eq!(entity.leave_hour_counts.get(0), 1);
        assert_eq!(entity.leave_hour_counts.get(2), 3);
        assert_eq!(entity.leave_hour_counts.get(23), 0);
    }

    #[test]
    fn test_histogram_negative_and_garbage_slots_become_zero() {
        let histogram: HourHistogram =
            serde_json::from_str(r#"[-4, "7", "x", 2.5, 9]"#).unwrap();
        assert_eq!(histogram.get(0), 0);
        assert_eq!(histogram.get(1), 7);
        assert_eq!(histogram.get(2), 0);
        assert_eq!(histogram.get(3), 0);
        assert_eq!(histogram.get(4), 9);
    }

    #[test]
    fn test_histogram_long_array_is_truncated() {
        let raw = format!("[{}]", vec!["1"; 30].join(","));
        let histogram: HourHistogram = serde_json::from_str(&raw).unwrap();
        assert_eq!(histogram.total(), HOURS_PER_DAY as u64);
        let back = serde_json::to_value(&histogram).unwrap();
        assert_eq!(back.as_array().unwrap().len(), HOURS_PER_DAY);
    }

    #[test]
    fn test_histogram_mode_prefers_lowest_hour_on_tie() {
        let mut histogram = HourHistogram::default();
        histogram.increment(20);
        histogram.increment(7);
        assert_eq!(histogram.mode(), Some((7, 1)));
        histogram.increment(20);
        assert_eq!(histogram.mode(), Some((20, 2)));
        assert_eq!(HourHistogram::default().mode(), None);
    }

    #[test]
    fn test_notifications_tri_state_defaults_to_enabled() {
        let entity: WatchedEntity = serde_json::from_str(r#"{"key":"bob"}"#).unwrap();
        assert_eq!(entity.notifications_enabled, None);
        assert!(entity.notifications_enabled());

        let muted: WatchedEntity =
            serde_json::from_str(r#"{"key":"bob","notifications_enabled":false}"#).unwrap();
        assert!(!muted.notifications_enabled());
    }

    #[test]
    fn test_repair_fills_names_and_drops_duplicate_details() {
        let mut entity: WatchedEntity = serde_json::from_str(
            r#"{"key":" carol ","details":["A","a"," ","B"],"session_start_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(entity.repair());
        assert_eq!(entity.key, "carol");
        assert_eq!(entity.resolved_name, "carol");
        assert_eq!(entity.original_name.as_deref(), Some("carol"));
        assert_eq!(entity.details, vec!["A".to_string(), "B".to_string()]);
        assert!(entity.session_start_at.is_none());
        assert!(!entity.repair());
    }

    #[test]
    fn test_identity_prefers_resolved_id() {
        let mut entity = WatchedEntity::new("Dave", "Squad", 0);
        assert_eq!(entity.identity(), "Dave");
        entity.resolved_id = Some("  ".to_string());
        assert_eq!(entity.identity(), "Dave");
        entity.resolved_id = Some("987".to_string());
        assert_eq!(entity.identity(), "987");
    }

    #[test]
    fn test_provider_info_absorb_keeps_known_values() {
        let now = Utc::now();
        let mut info = ProviderInfo {
            steam_id: Some("7656".to_string()),
            ..ProviderInfo::default()
        };
        info.absorb(
            ProviderInfo {
                updated_at: Some(now),
                ..ProviderInfo::default()
            },
            now,
        );
        assert_eq!(info.steam_id.as_deref(), Some("7656"));
        assert_eq!(info.updated_at, Some(now));
        assert_eq!(info.fetched_at, Some(now));
    }

    #[test]
    fn test_group_key_is_case_insensitive() {
        assert_eq!(group_key("  Friends "), "friends");
        assert_eq!(group_key("FRIENDS"), group_key("friends"));
        assert_eq!(group_key("   "), NO_GROUP);
    }
}
