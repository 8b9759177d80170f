//! Group "everyone went offline" alerts.
//!
//! A group alerts once when it goes from "someone online" to "all offline".
//! Membership changes reset the baseline silently so that removing the last
//! online member, or adding an offline one, never looks like a logout.

use std::collections::{BTreeMap, HashMap};

use crate::types::{GroupSettings, WatchedEntity};

/// Per-group memory carried between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupState {
    all_offline: bool,
    signature: String,
}

/// A group that just went fully offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAlert {
    pub group_key: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct GroupGate {
    states: HashMap<String, GroupState>,
}

/// Canonical membership fingerprint: identities trimmed, lowercased, sorted
/// and joined with `|`.
pub fn membership_signature<'a>(members: impl IntoIterator<Item = &'a WatchedEntity>) -> String {
    let mut ids: Vec<String> = members
        .into_iter()
        .map(|entity| entity.identity().trim().to_lowercase())
        .collect();
    ids.sort();
    ids.join("|")
}

impl GroupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates every group once. Call exactly once per cycle, after the scan.
    pub fn evaluate(&mut self, entities: &[WatchedEntity], settings: &GroupSettings) -> Vec<GroupAlert> {
        let mut groups: BTreeMap<String, Vec<&WatchedEntity>> = BTreeMap::new();
        for entity in entities {
            let key = entity.group_key();
            if key.is_empty() {
                continue;
            }
            groups.entry(key).or_default().push(entity);
        }

        self.states.retain(|key, _| groups.contains_key(key));

        let mut alerts = Vec::new();
        for (key, members) in &groups {
            let signature = membership_signature(members.iter().copied());
            let all_offline = members.iter().all(|entity| !entity.online);

            let previous = self.states.insert(
                key.clone(),
                GroupState {
                    all_offline,
                    signature: signature.clone(),
                },
            );

            if !settings.notifications_enabled(key) {
                if let Some(state) = self.states.get_mut(key) {
                    state.all_offline = false;
                }
                continue;
            }

            let Some(previous) = previous else {
                tracing::debug!(group = %key, all_offline, "Group baseline established");
                continue;
            };
            if previous.signature != signature {
                tracing::debug!(group = %key, all_offline, "Group membership changed, baseline reset");
                continue;
            }

            if all_offline && !previous.all_offline {
                alerts.push(GroupAlert {
                    group_key: key.clone(),
                    display_name: group_display_name(key, members, settings),
                });
            }
        }

        alerts
    }

    /// Number of groups currently remembered.
    pub fn tracked_groups(&self) -> usize {
        self.states.len()
    }
}

fn group_display_name(key: &str, members: &[&WatchedEntity], settings: &GroupSettings) -> String {
    settings
        .display_names
        .get(key)
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .or_else(|| members.first().map(|entity| entity.group.trim()))
        .unwrap_or(key)
        .to_string()
}
