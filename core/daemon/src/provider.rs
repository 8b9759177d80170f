//! BattleMetrics HTTP snapshot provider.
//!
//! The server endpoint is fetched with players and sessions included. Open
//! sessions (no `stop`) become authoritative session-start hints keyed by
//! player id. Player profiles come from `/players/{id}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use presence_core::{PresenceAttributes, ProviderInfo, Snapshot, SnapshotProvider};

use crate::config::ProviderConfig;

/// Attribute keys that carry a Steam id directly (compared lowercased).
const STEAM_KEYS: &[&str] = &["steamid", "steamid64", "steam64", "steam"];

/// A JSON:API document as returned by BattleMetrics.
#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    data: Option<Resource>,
    #[serde(default)]
    included: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(default)]
    id: Option<Value>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    relationships: Map<String, Value>,
}

impl Resource {
    fn id(&self) -> Option<String> {
        self.id.as_ref().and_then(value_text)
    }

    /// `relationships.<name>.data.id`
    fn related_id(&self, name: &str) -> Option<String> {
        self.relationships
            .get(name)
            .and_then(|relation| relation.get("data"))
            .and_then(|data| data.get("id"))
            .and_then(value_text)
    }
}

pub struct BattleMetricsProvider {
    client: Client,
    base_url: String,
    server_id: String,
    token: Option<String>,
}

impl BattleMetricsProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| format!("Failed to build HTTP client: {}", err))?;
        let token = config.resolve_token();
        if token.is_none() {
            warn!(
                token_env = %config.token_env,
                "No BattleMetrics token configured, using anonymous requests"
            );
        }
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            server_id: config.server_id.trim().to_string(),
            token,
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, String> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| format!("request to {} failed: {}", url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("{} returned HTTP {}", url, status));
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| format!("invalid JSON from {}: {}", url, err))
    }
}

#[async_trait]
impl SnapshotProvider for BattleMetricsProvider {
    async fn fetch_snapshot(&self, lookup_keys: &BTreeSet<String>) -> Snapshot {
        let path = format!("servers/{}", self.server_id);
        match self.get_json(&path, &[("include", "player,session")]).await {
            Ok(body) => {
                let mut snapshot = parse_server_snapshot(&body);
                snapshot.restrict_to(lookup_keys);
                snapshot
            }
            Err(err) => {
                warn!(error = %err, "Failed to fetch server snapshot");
                Snapshot::invalid()
            }
        }
    }

    async fn fetch_extended_info(&self, provider_id: &str) -> Option<ProviderInfo> {
        let path = format!("players/{}", provider_id.trim());
        match self.get_json(&path, &[]).await {
            Ok(body) => parse_player_info(&body),
            Err(err) => {
                debug!(provider_id, error = %err, "Failed to fetch player info");
                None
            }
        }
    }
}

/// Builds a snapshot from a `servers/{id}?include=player,session` document.
/// An unparseable document is an invalid snapshot.
pub fn parse_server_snapshot(body: &Value) -> Snapshot {
    let document = match Document::deserialize(body) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "Unexpected server document shape");
            return Snapshot::invalid();
        }
    };

    let label = document
        .data
        .as_ref()
        .and_then(|data| data.attributes.get("name"))
        .and_then(value_text);
    let mut snapshot = Snapshot::new(label);

    for resource in document.included {
        match resource.kind.as_str() {
            "player" => {
                let Some(id) = resource.id() else {
                    continue;
                };
                snapshot.insert(PresenceAttributes::new(Some(id), resource.attributes));
            }
            "session" => {
                let open = resource.attributes.get("stop").map_or(true, Value::is_null);
                let start = resource.attributes.get("start").and_then(parse_timestamp);
                if let (true, Some(start), Some(player_id)) = (open, start, resource.related_id("player")) {
                    snapshot.insert_session_start(&player_id, start);
                }
            }
            _ => {}
        }
    }

    snapshot
}

/// Extracts profile data from a `players/{id}` document.
pub fn parse_player_info(body: &Value) -> Option<ProviderInfo> {
    let document = Document::deserialize(body).ok()?;
    let attributes = document.data?.attributes;
    Some(ProviderInfo {
        created_at: attributes.get("createdAt").and_then(parse_timestamp),
        updated_at: attributes.get("updatedAt").and_then(parse_timestamp),
        last_seen_at: attributes.get("lastSeen").and_then(parse_timestamp),
        steam_id: extract_steam_id(&attributes),
        fetched_at: None,
    })
}

fn extract_steam_id(attributes: &Map<String, Value>) -> Option<String> {
    let direct = attributes
        .iter()
        .find(|(key, value)| STEAM_KEYS.contains(&key.to_lowercase().as_str()) && !value.is_null())
        .and_then(|(_, value)| format_identifier(value));
    if direct.is_some() {
        return direct;
    }

    let identifiers = attributes.get("identifiers")?.as_array()?;
    identifiers.iter().find_map(|entry| match entry {
        Value::String(text) if text.to_lowercase().starts_with("steam") => normalize_steam_string(text),
        Value::Object(map) => {
            let is_steam = map
                .get("type")
                .and_then(value_text)
                .is_some_and(|kind| kind.to_lowercase().contains("steam"));
            if !is_steam {
                return None;
            }
            map.get("identifier")
                .or_else(|| map.get("id"))
                .and_then(format_identifier)
        }
        _ => None,
    })
}

fn format_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => normalize_steam_string(text),
        other => value_text(other),
    }
}

/// `STEAM:7656...` keeps the part after the colon.
fn normalize_steam_string(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let id = match trimmed.split_once(':') {
        Some((prefix, rest)) if prefix.to_lowercase().starts_with("steam") => rest.trim(),
        _ => trimmed,
    };
    (!id.is_empty()).then(|| id.to_string())
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
