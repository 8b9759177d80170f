//! Presence snapshots and matching watched entities against them.
//!
//! A [`Snapshot`] is one fetch result. Present players are indexed twice: by
//! provider id and by case-folded display name, so a watched key can be either.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::types::WatchedEntity;

static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex"));

/// Attribute keys shown first, in this order, when present.
const PREFERRED_DETAIL_KEYS: &[&str] = &[
    "steamID", "steamId", "steamid", "steam64", "playerId", "country", "region", "score", "rank",
    "kills", "deaths", "kdr", "level",
];

/// Bookkeeping attributes that never become detail lines (compared lowercased).
const EXCLUDED_DETAIL_KEYS: &[&str] = &[
    "name",
    "online",
    "status",
    "lastseen",
    "firstseen",
    "createdat",
    "updatedat",
    "sessiontime",
    "onlinetime",
    "timeplayed",
    "timeplayedseconds",
    "secondsplayed",
    "playtime",
    "private",
    "positivematch",
];

/// Attributes of one present player as reported by the provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PresenceAttributes {
    pub id: Option<String>,
    pub name: Option<String>,
    raw: Map<String, Value>,
}

impl PresenceAttributes {
    pub fn new(id: Option<String>, raw: Map<String, Value>) -> Self {
        let id = id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let name = raw
            .get("name")
            .and_then(scalar_text)
            .filter(|value| !value.trim().is_empty());
        PresenceAttributes { id, name, raw }
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// `Label: value` lines for the interesting provider attributes.
    ///
    /// Preferred keys come first in a fixed order, then everything else
    /// sorted case-insensitively. Bookkeeping keys and blank values are skipped.
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut used: HashSet<String> = HashSet::new();

        for key in PREFERRED_DETAIL_KEYS {
            let Some(value) = self.raw.get(*key).and_then(format_value) else {
                continue;
            };
            lines.push(format!("{}: {}", format_label(key), value));
            used.insert(key.to_lowercase());
        }

        let mut remaining: Vec<&String> = self
            .raw
            .keys()
            .filter(|key| {
                let lower = key.to_lowercase();
                !used.contains(&lower)
                    && !EXCLUDED_DETAIL_KEYS
                        .iter()
                        .any(|excluded| excluded.eq_ignore_ascii_case(&lower))
            })
            .collect();
        remaining.sort_by_key(|key| key.to_lowercase());

        for key in remaining {
            if let Some(value) = self.raw.get(key).and_then(format_value) {
                lines.push(format!("{}: {}", format_label(key), value));
            }
        }

        lines
    }
}

/// One entity's match inside a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotMatch<'a> {
    pub attributes: &'a PresenceAttributes,
    /// Authoritative session start, when the provider reports one.
    pub session_start_hint: Option<DateTime<Utc>>,
    /// Server (context) label of the snapshot.
    pub server_name: Option<&'a str>,
}

/// One presence fetch result.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// False when the fetch failed; all maps must then be treated as absent.
    pub valid: bool,
    pub context_label: Option<String>,
    entries: HashMap<String, PresenceAttributes>,
    session_starts: HashMap<String, DateTime<Utc>>,
}

impl Snapshot {
    /// A successful fetch with nobody present yet.
    pub fn new(context_label: Option<String>) -> Self {
        Snapshot {
            valid: true,
            context_label: context_label.filter(|label| !label.trim().is_empty()),
            entries: HashMap::new(),
            session_starts: HashMap::new(),
        }
    }

    /// A failed fetch. Never to be read as "everyone went offline".
    pub fn invalid() -> Self {
        Snapshot::default()
    }

    /// Indexes a present player by provider id and by lowercased name.
    pub fn insert(&mut self, attributes: PresenceAttributes) {
        if let Some(name) = attributes.name.as_deref() {
            self.entries
                .insert(name.trim().to_lowercase(), attributes.clone());
        }
        if let Some(id) = attributes.id.clone() {
            self.entries.insert(id, attributes);
        }
    }

    pub fn insert_session_start(&mut self, provider_id: &str, start: DateTime<Utc>) {
        let provider_id = provider_id.trim();
        if !provider_id.is_empty() {
            self.session_starts.insert(provider_id.to_string(), start);
        }
    }

    /// Drops everything not reachable from the requested lookup keys.
    pub fn restrict_to(&mut self, keys: &BTreeSet<String>) {
        self.entries.retain(|key, _| keys.contains(key));
        let kept_ids: HashSet<&str> = self
            .entries
            .values()
            .filter_map(|attributes| attributes.id.as_deref())
            .collect();
        self.session_starts
            .retain(|id, _| keys.contains(id) || kept_ids.contains(id.as_str()));
    }

    /// Number of lookup entries (ids and names) in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds an entity: resolved id first, then the case-folded key.
    pub fn lookup(&self, entity: &WatchedEntity) -> Option<SnapshotMatch<'_>> {
        if !self.valid {
            return None;
        }
        let attributes = entity
            .provider_id()
            .and_then(|id| self.entries.get(id))
            .or_else(|| self.entries.get(&entity.key.trim().to_lowercase()))?;

        let session_start_hint = attributes
            .id
            .as_deref()
            .or(entity.provider_id())
            .and_then(|id| self.session_starts.get(id))
            .copied();

        Some(SnapshotMatch {
            attributes,
            session_start_hint,
            server_name: self.context_label.as_deref(),
        })
    }
}

fn format_label(key: &str) -> String {
    let spaced = CAMEL_BOUNDARY.replace_all(key, "$1 $2");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::Bool(true) => "yes".to_string(),
        Value::Bool(false) => "no".to_string(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{}:{}", key, scalar_text(value).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar_text(other)?,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
