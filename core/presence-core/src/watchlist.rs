//! User-facing management of the watch list and its groups.
//!
//! The daemon owns presence state; everything here edits what the user
//! controls: membership, grouping, ordering and notification toggles.
//! Groups are identified case-insensitively by [`group_key`] and remember the
//! name as last typed in [`GroupSettings::display_names`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{PresenceError, Result};
use crate::types::{group_key, normalize_group_name, GroupSettings, WatchedEntity, NO_GROUP};

/// One block of the grouped listing.
#[derive(Debug, Clone)]
pub struct GroupSection<'a> {
    /// Empty for the ungrouped block.
    pub group_key: String,
    pub display_name: String,
    pub notifications_enabled: bool,
    pub members: Vec<&'a WatchedEntity>,
}

impl GroupSection<'_> {
    pub fn is_ungrouped(&self) -> bool {
        self.group_key.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchList {
    entities: Vec<WatchedEntity>,
    settings: GroupSettings,
}

impl WatchList {
    /// Wraps loaded state and normalizes sort orders and group settings.
    pub fn new(entities: Vec<WatchedEntity>, settings: GroupSettings) -> Self {
        let mut list = WatchList { entities, settings };
        list.ensure_sort_order();
        list.sync_group_settings();
        list
    }

    pub fn entities(&self) -> &[WatchedEntity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [WatchedEntity] {
        &mut self.entities
    }

    pub fn settings(&self) -> &GroupSettings {
        &self.settings
    }

    pub fn into_parts(self) -> (Vec<WatchedEntity>, GroupSettings) {
        (self.entities, self.settings)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Finds an entity by key, ignoring case and surrounding whitespace.
    pub fn find(&self, key: &str) -> Option<&WatchedEntity> {
        self.position(key).map(|index| &self.entities[index])
    }

    fn position(&self, key: &str) -> Option<usize> {
        let wanted = key.trim().to_lowercase();
        self.entities
            .iter()
            .position(|entity| entity.key.trim().to_lowercase() == wanted)
    }

    fn position_or_err(&self, key: &str) -> Result<usize> {
        self.position(key)
            .ok_or_else(|| PresenceError::EntityNotFound(key.trim().to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Entities
    // ─────────────────────────────────────────────────────────────────────

    /// Starts watching `key`, appended at the end of `group`.
    pub fn add(&mut self, key: &str, group: &str) -> Result<&WatchedEntity> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PresenceError::BlankKey);
        }
        if self.position(key).is_some() {
            return Err(PresenceError::DuplicateKey(key.to_string()));
        }

        let group = self.resolve_group_name(group);
        self.remember_group_name(&group);
        let sort_order = self.next_sort_order(&group);
        self.entities.push(WatchedEntity::new(key, &group, sort_order));
        self.sync_group_settings();

        tracing::info!(key, group = %group, "Watching");
        Ok(&self.entities[self.entities.len() - 1])
    }

    pub fn remove(&mut self, key: &str) -> Result<WatchedEntity> {
        let index = self.position_or_err(key)?;
        let removed = self.entities.remove(index);
        self.sync_group_settings();
        Ok(removed)
    }

    /// Moves an entity to another group. Returns false if it was already there.
    pub fn move_to_group(&mut self, key: &str, group: &str) -> Result<bool> {
        let index = self.position_or_err(key)?;
        let group = self.resolve_group_name(group);
        if self.entities[index].group == group {
            return Ok(false);
        }
        let sort_order = self.next_sort_order(&group);
        let entity = &mut self.entities[index];
        entity.group = group.clone();
        entity.sort_order = sort_order;
        self.remember_group_name(&group);
        self.sync_group_settings();
        Ok(true)
    }

    /// Flips an entity's own notification flag and returns the new state.
    pub fn toggle_entity_notifications(&mut self, key: &str) -> Result<bool> {
        let index = self.position_or_err(key)?;
        let entity = &mut self.entities[index];
        let enabled = !entity.notifications_enabled();
        entity.notifications_enabled = Some(enabled);
        Ok(enabled)
    }

    /// Moves an entity to `position` inside its group and renumbers the group.
    pub fn reorder(&mut self, key: &str, position: usize) -> Result<()> {
        let index = self.position_or_err(key)?;
        let group = self.entities[index].group_key();

        let mut members: Vec<usize> = (0..self.entities.len())
            .filter(|&i| i != index && self.entities[i].group_key() == group)
            .collect();
        members.sort_by(|&a, &b| compare_members(&self.entities[a], &self.entities[b]));
        members.insert(position.min(members.len()), index);

        for (order, member) in members.into_iter().enumerate() {
            self.entities[member].sort_order = order as i32;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Groups
    // ─────────────────────────────────────────────────────────────────────

    /// Renames a group, carrying over its members, notification setting,
    /// remembered name and position. Renaming to a blank name ungroups.
    pub fn rename_group(&mut self, old: &str, new: &str) -> Result<bool> {
        let old_name = normalize_group_name(old);
        let new_name = normalize_group_name(new);
        let old_key = group_key(&old_name);
        let new_key = group_key(&new_name);

        if old_key == new_key && old_name == new_name {
            return Ok(false);
        }
        if !old_key.is_empty() && !self.group_exists(&old_key) {
            return Err(PresenceError::GroupNotFound(old_name));
        }

        if old_key != new_key {
            if let Some(enabled) = self.settings.notifications.remove(&old_key) {
                if !new_key.is_empty() {
                    self.settings.notifications.entry(new_key.clone()).or_insert(enabled);
                }
            }
        }

        if !old_key.is_empty() {
            self.settings.display_names.remove(&old_key);
        }
        if !new_key.is_empty() {
            self.settings
                .display_names
                .insert(new_key.clone(), new_name.clone());
        }

        if let Some(slot) = self.settings.order.iter().position(|key| *key == old_key) {
            if new_key.is_empty() {
                self.settings.order.remove(slot);
            } else {
                self.settings.order[slot] = new_key.clone();
                let mut seen = BTreeSet::new();
                self.settings.order.retain(|key| seen.insert(key.clone()));
            }
        }

        let mut next_order = self.next_sort_order(&new_name);
        for entity in &mut self.entities {
            let key = entity.group_key();
            if key == old_key && entity.group != new_name {
                if key != new_key {
                    entity.sort_order = next_order;
                    next_order += 1;
                }
                entity.group = new_name.clone();
            } else if key == new_key && entity.group != new_name {
                entity.group = new_name.clone();
            }
        }

        self.ensure_sort_order();
        self.sync_group_settings();
        tracing::info!(from = %old_name, to = %new_name, "Group renamed");
        Ok(true)
    }

    /// Stops watching every member of a group and forgets its settings.
    /// Returns the number of entities removed.
    pub fn delete_group(&mut self, group: &str) -> Result<usize> {
        let key = group_key(group);
        if key.is_empty() || !self.group_exists(&key) {
            return Err(PresenceError::GroupNotFound(normalize_group_name(group)));
        }

        let before = self.entities.len();
        self.entities.retain(|entity| entity.group_key() != key);
        self.settings.notifications.remove(&key);
        self.settings.display_names.remove(&key);
        self.settings.order.retain(|ordered| *ordered != key);
        self.sync_group_settings();
        Ok(before - self.entities.len())
    }

    /// Flips a group's notification switch and returns the new state.
    pub fn toggle_group_notifications(&mut self, group: &str) -> Result<bool> {
        let key = group_key(group);
        if key.is_empty() || !self.group_exists(&key) {
            return Err(PresenceError::GroupNotFound(normalize_group_name(group)));
        }
        let enabled = !self.settings.notifications_enabled(&key);
        self.settings.notifications.insert(key, enabled);
        Ok(enabled)
    }

    /// Moves a group to `position` in the listing.
    pub fn move_group(&mut self, group: &str, position: usize) -> Result<()> {
        let key = group_key(group);
        if key.is_empty() || !self.group_exists(&key) {
            return Err(PresenceError::GroupNotFound(normalize_group_name(group)));
        }
        let mut order = self.group_order();
        order.retain(|ordered| *ordered != key);
        order.insert(position.min(order.len()), key);
        self.settings.order = order;
        Ok(())
    }

    /// Display names of all known groups, in listing order.
    pub fn group_names(&self) -> Vec<String> {
        let names = self.group_display_names();
        self.group_order()
            .into_iter()
            .filter_map(|key| names.get(&key).cloned())
            .collect()
    }

    fn group_exists(&self, key: &str) -> bool {
        self.settings.display_names.contains_key(key)
            || self.entities.iter().any(|entity| entity.group_key() == key)
    }

    fn resolve_group_name(&self, input: &str) -> String {
        let name = normalize_group_name(input);
        if name.is_empty() {
            return NO_GROUP.to_string();
        }
        let key = group_key(&name);
        let existing = self
            .settings
            .display_names
            .get(&key)
            .cloned()
            .or_else(|| {
                self.entities
                    .iter()
                    .find(|entity| entity.group_key() == key)
                    .map(|entity| entity.group.clone())
            });
        normalize_group_name(existing.as_deref().unwrap_or(&name))
    }

    fn remember_group_name(&mut self, group: &str) {
        let name = normalize_group_name(group);
        if !name.is_empty() {
            self.settings.display_names.insert(group_key(&name), name);
        }
    }

    fn next_sort_order(&self, group: &str) -> i32 {
        let key = group_key(group);
        self.entities
            .iter()
            .filter(|entity| entity.group_key() == key)
            .map(|entity| entity.sort_order)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Group key → name, member spellings taking precedence over remembered ones.
    fn group_display_names(&self) -> BTreeMap<String, String> {
        let mut names = self.settings.display_names.clone();
        for entity in &self.entities {
            let name = normalize_group_name(&entity.group);
            if !name.is_empty() {
                names.insert(group_key(&name), name);
            }
        }
        names.retain(|key, _| !key.is_empty());
        names
    }

    /// Stored order first, then unknown groups alphabetically by name.
    fn group_order(&self) -> Vec<String> {
        let names = self.group_display_names();
        let mut order: Vec<String> = Vec::new();
        for key in &self.settings.order {
            if names.contains_key(key) && !order.contains(key) {
                order.push(key.clone());
            }
        }
        let mut remaining: Vec<(&String, &String)> = names
            .iter()
            .filter(|(key, _)| !order.contains(key))
            .collect();
        remaining.sort_by_key(|(_, name)| name.to_lowercase());
        order.extend(remaining.into_iter().map(|(key, _)| key.clone()));
        order
    }

    // ─────────────────────────────────────────────────────────────────────
    // Normalization
    // ─────────────────────────────────────────────────────────────────────

    /// Renumbers any group whose members share a sort order, by name.
    pub fn ensure_sort_order(&mut self) -> bool {
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, entity) in self.entities.iter().enumerate() {
            groups.entry(entity.group_key()).or_default().push(index);
        }

        let mut changed = false;
        for mut members in groups.into_values() {
            let distinct: BTreeSet<i32> = members
                .iter()
                .map(|&index| self.entities[index].sort_order)
                .collect();
            if distinct.len() == members.len() {
                continue;
            }
            members.sort_by_key(|&index| self.entities[index].display_name().to_lowercase());
            for (order, index) in members.into_iter().enumerate() {
                let order = order as i32;
                if self.entities[index].sort_order != order {
                    self.entities[index].sort_order = order;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Brings group settings in line with current membership.
    ///
    /// Every known group gets a notification entry (enabled by default), stale
    /// entries are dropped, member spellings are remembered, and the stored
    /// order is rewritten to cover exactly the known groups.
    pub fn sync_group_settings(&mut self) -> bool {
        let before = self.settings.clone();

        for entity in &self.entities {
            let name = normalize_group_name(&entity.group);
            if !name.is_empty() {
                self.settings
                    .display_names
                    .entry(group_key(&name))
                    .or_insert(name);
            }
        }
        self.settings.display_names.retain(|key, _| !key.is_empty());

        let known: BTreeSet<String> = self.group_display_names().into_keys().collect();
        for key in &known {
            self.settings.notifications.entry(key.clone()).or_insert(true);
        }
        self.settings.notifications.retain(|key, _| known.contains(key));
        self.settings.order = self.group_order();

        self.settings != before
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────

    /// Grouped listing: ungrouped entities first, then groups in order.
    /// Empty groups that are still remembered get an empty section.
    pub fn sections(&self) -> Vec<GroupSection<'_>> {
        let mut by_group: HashMap<String, Vec<&WatchedEntity>> = HashMap::new();
        for entity in &self.entities {
            by_group.entry(entity.group_key()).or_default().push(entity);
        }
        for members in by_group.values_mut() {
            members.sort_by(|a, b| compare_members(a, b));
        }

        let mut sections = Vec::new();
        if let Some(members) = by_group.remove(NO_GROUP) {
            sections.push(GroupSection {
                group_key: NO_GROUP.to_string(),
                display_name: String::new(),
                notifications_enabled: true,
                members,
            });
        }

        let names = self.group_display_names();
        for key in self.group_order() {
            sections.push(GroupSection {
                display_name: names.get(&key).cloned().unwrap_or_else(|| key.clone()),
                notifications_enabled: self.settings.notifications_enabled(&key),
                members: by_group.remove(&key).unwrap_or_default(),
                group_key: key,
            });
        }
        sections
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cycle merge
    // ─────────────────────────────────────────────────────────────────────

    /// Copies tracker-owned fields from a finished cycle into this (freshly
    /// reloaded) list. User-owned fields stay as they are here, entities
    /// removed meanwhile stay removed and entities added meanwhile are kept.
    /// Returns how many entities were updated.
    pub fn absorb_cycle(&mut self, scanned: &[WatchedEntity]) -> usize {
        let by_key: HashMap<String, &WatchedEntity> = scanned
            .iter()
            .map(|entity| (entity.key.trim().to_lowercase(), entity))
            .collect();

        let mut merged = 0;
        for entity in &mut self.entities {
            if let Some(source) = by_key.get(&entity.key.trim().to_lowercase()) {
                copy_tracked_fields(entity, source);
                merged += 1;
            }
        }
        merged
    }
}

fn copy_tracked_fields(target: &mut WatchedEntity, source: &WatchedEntity) {
    target.resolved_name = source.resolved_name.clone();
    target.resolved_id = source.resolved_id.clone();
    target.online = source.online;
    target.display_duration = source.display_duration.clone();
    target.details = source.details.clone();
    target.current_server_name = source.current_server_name.clone();
    target.session_start_at = source.session_start_at;
    target.last_seen_at = source.last_seen_at;
    target.last_offline_at = source.last_offline_at;
    target.last_session_secs = source.last_session_secs;
    target.total_session_secs = source.total_session_secs;
    target.join_hour_counts = source.join_hour_counts.clone();
    target.leave_hour_counts = source.leave_hour_counts.clone();
    target.info = source.info.clone();
}

fn compare_members(a: &WatchedEntity, b: &WatchedEntity) -> std::cmp::Ordering {
    a.sort_order
        .cmp(&b.sort_order)
        .then_with(|| a.display_name().to_lowercase().cmp(&b.display_name().to_lowercase()))
}
