//! Status detail lines shown under each watched entity.
//!
//! Rendering is a pure function of the entity and the clock. The result is
//! always deduplicated case-insensitively with blanks removed.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::format::{format_duration, format_hour, format_last_login, format_relative, NO_DATA};
use crate::snapshot::PresenceAttributes;
use crate::types::WatchedEntity;

/// Renders detail lines without snapshot attributes.
pub fn render(entity: &WatchedEntity, now: DateTime<Utc>) -> Vec<String> {
    render_with_attributes(entity, None, now)
}

/// Renders detail lines, appending attribute lines for online entities.
pub fn render_with_attributes(
    entity: &WatchedEntity,
    attributes: Option<&PresenceAttributes>,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut lines = Vec::new();

    if entity.online {
        if let Some(server) = entity
            .current_server_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
        {
            lines.push(format!("Server: {}", server.trim()));
        }
        if let Some(start) = entity.session_start_at {
            let elapsed = now.signed_duration_since(start).num_seconds();
            lines.push(format!("In session: {}", format_duration(elapsed)));
        }
    } else {
        if let Some(last) = entity.last_session_secs {
            lines.push(format!("Last session: {}", format_duration(last)));
        }
        if let Some(seen) = entity.last_seen_at {
            lines.push(format!("Last seen: {}", format_relative(seen, now)));
        }
    }

    lines.push(format!(
        "Provider ID: {}",
        entity.provider_id().unwrap_or(NO_DATA)
    ));
    if let Some(steam_id) = entity
        .info
        .steam_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
    {
        lines.push(format!("Steam ID: {}", steam_id.trim()));
    }

    match entity.info.freshest_update() {
        Some(updated) => lines.push(format!(
            "Time present: {}",
            format_duration(now.signed_duration_since(updated).num_seconds())
        )),
        None => lines.push(format!("Time present: {}", NO_DATA)),
    }

    match entity.info.last_seen_at.or(entity.last_seen_at) {
        Some(at) => lines.push(format!("Last login: {}", format_last_login(at, now))),
        None => lines.push("Last login: none".to_string()),
    }

    let running = match (entity.online, entity.session_start_at) {
        (true, Some(start)) => now.signed_duration_since(start).num_seconds().max(0),
        _ => 0,
    };
    let tracked = entity.total_session_secs.max(0).saturating_add(running);
    if tracked > 0 {
        lines.push(format!("Total tracked: {}", format_duration(tracked)));
    }

    if let Some((hour, _)) = entity.join_hour_counts.mode() {
        lines.push(format!("Typically joins around {}", format_hour(hour)));
    }
    if let Some((hour, _)) = entity.leave_hour_counts.mode() {
        lines.push(format!("Typically leaves around {}", format_hour(hour)));
    }

    if entity.online {
        if let Some(attributes) = attributes {
            lines.extend(attributes.detail_lines());
        }
    }

    merge_details(lines)
}

/// Prefixes of lines that [`render`] derives from tracker state. Stored copies
/// of these go stale between cycles and are always re-derived.
const DERIVED_PREFIXES: &[&str] = &[
    "server:",
    "in session:",
    "last session:",
    "last seen:",
    "provider id:",
    "time present:",
    "last login:",
    "total tracked:",
    "typically joins around",
    "typically leaves around",
];

/// Renders fresh derived lines, then the attribute lines persisted by the
/// last cycle for an online entity. Used where no snapshot is at hand.
pub fn render_with_stored(entity: &WatchedEntity, now: DateTime<Utc>) -> Vec<String> {
    let fresh = render(entity, now);
    if !entity.online {
        return fresh;
    }
    let stored = entity
        .details
        .iter()
        .filter(|line| !is_derived_line(line))
        .cloned();
    merge_details(fresh.into_iter().chain(stored))
}

fn is_derived_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    DERIVED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Drops blank lines and case-insensitive duplicates, keeping first occurrences.
pub fn merge_details(lines: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_clock;
    use crate::types::ProviderInfo;
    use chrono::Duration;
    use serde_json::{json, Map};

    #[test]
    fn test_offline_entity_without_data() {
        let now = Utc::now();
        let entity = WatchedEntity::new("ghost", "", 0);
        assert_eq!(
            render(&entity, now),
            vec![
                "Provider ID: no data".to_string(),
                "Time present: no data".to_string(),
                "Last login: none".to_string(),
            ]
        );
    }

    #[test]
    fn test_online_entity_full_render() {
        let now = Utc::now();
        let mut entity = WatchedEntity::new("alice", "", 0);
        entity.online = true;
        entity.resolved_id = Some("101".to_string());
        entity.current_server_name = Some("Rust EU".to_string());
        entity.session_start_at = Some(now - Duration::minutes(90));
        entity.last_seen_at = Some(now);
        entity.total_session_secs = 3600;
        entity.join_hour_counts.increment(19);
        entity.info = ProviderInfo {
            updated_at: Some(now - Duration::hours(2)),
            steam_id: Some("76561198000000000".to_string()),
            ..ProviderInfo::default()
        };

        let mut raw = Map::new();
        raw.insert("name".to_string(), json!("Alice"));
        raw.insert("country".to_string(), json!("DE"));
        let attributes = PresenceAttributes::new(Some("101".to_string()), raw);

        assert_eq!(
            render_with_attributes(&entity, Some(&attributes), now),
            vec![
                "Server: Rust EU".to_string(),
                "In session: 1h 30m".to_string(),
                "Provider ID: 101".to_string(),
                "Steam ID: 76561198000000000".to_string(),
                "Time present: 2h 0m".to_string(),
                format!("Last login: today at {}", format_clock(now)),
                "Total tracked: 2h 30m".to_string(),
                "Typically joins around 19:00".to_string(),
                "Country: DE".to_string(),
            ]
        );
    }

    #[test]
    fn test_offline_entity_with_history() {
        let now = Utc::now();
        let mut entity = WatchedEntity::new("bob", "", 0);
        entity.last_session_secs = Some(3600);
        entity.last_seen_at = Some(now - Duration::minutes(5));
        entity.total_session_secs = 7200;
        entity.leave_hour_counts.increment(3);
        entity.leave_hour_counts.increment(1);

        let lines = render(&entity, now);
        assert_eq!(lines[0], "Last session: 1h 0m");
        assert_eq!(lines[1], "Last seen: 5m ago");
        assert!(lines.contains(&"Total tracked: 2h 0m".to_string()));
        assert!(lines.contains(&"Typically leaves around 01:00".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("Typically joins")));
    }

    #[test]
    fn test_stored_attribute_lines_follow_fresh_ones() {
        let now = Utc::now();
        let mut entity = WatchedEntity::new("erin", "", 0);
        entity.online = true;
        entity.session_start_at = Some(now - Duration::minutes(40));
        entity.details = vec![
            "In session: 5m".to_string(),
            "Typically joins around 03:00".to_string(),
            "Country: DE".to_string(),
            "Score: 12".to_string(),
        ];

        let lines = render_with_stored(&entity, now);
        assert_eq!(lines[0], "In session: 40m");
        assert!(!lines.contains(&"In session: 5m".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("Typically joins")));
        assert_eq!(
            &lines[lines.len() - 2..],
            &["Country: DE".to_string(), "Score: 12".to_string()]
        );

        entity.online = false;
        entity.session_start_at = None;
        assert!(!render_with_stored(&entity, now).contains(&"Country: DE".to_string()));
    }

    #[test]
    fn test_time_present_uses_freshest_info_timestamp() {
        let now = Utc::now();
        let mut entity = WatchedEntity::new("carol", "", 0);
        entity.info.updated_at = Some(now - Duration::hours(5));
        entity.info.last_seen_at = Some(now - Duration::minutes(20));
        let lines = render(&entity, now);
        assert!(lines.contains(&"Time present: 20m".to_string()));
    }

    #[test]
    fn test_attributes_ignored_when_offline() {
        let now = Utc::now();
        let entity = WatchedEntity::new("dave", "", 0);
        let mut raw = Map::new();
        raw.insert("kills".to_string(), json!(3));
        let attributes = PresenceAttributes::new(None, raw);
        let lines = render_with_attributes(&entity, Some(&attributes), now);
        assert!(!lines.iter().any(|line| line.starts_with("Kills")));
    }

    #[test]
    fn test_merge_details_dedups_case_insensitively() {
        let merged = merge_details(vec![
            "Server: A".to_string(),
            "server: a".to_string(),
            "   ".to_string(),
            " Kills: 2 ".to_string(),
        ]);
        assert_eq!(merged, vec!["Server: A".to_string(), "Kills: 2".to_string()]);
    }
}
