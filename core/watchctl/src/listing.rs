//! Plain-text rendering of the watch list.

use chrono::{DateTime, Utc};

use presence_core::{render_with_stored, GroupSection, WatchList, WatchedEntity};

const UNGROUPED_HEADING: &str = "Ungrouped";
const DETAIL_INDENT: &str = "      ";

/// Grouped listing. With `details`, every entity is followed by its detail lines.
pub fn render_list(list: &WatchList, details: bool, now: DateTime<Utc>) -> String {
    if list.is_empty() {
        return "Watch list is empty.\n".to_string();
    }

    let mut out = String::new();
    for section in list.sections() {
        out.push_str(&section_heading(&section));
        out.push('\n');
        for entity in &section.members {
            out.push_str("  ");
            out.push_str(&entity_line(entity));
            out.push('\n');
            if details {
                for line in render_with_stored(entity, now) {
                    out.push_str(DETAIL_INDENT);
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }
    }
    out
}

/// One entity with every detail line.
pub fn render_entity(entity: &WatchedEntity, now: DateTime<Utc>) -> String {
    let mut out = entity_line(entity);
    out.push('\n');
    if !entity.group.trim().is_empty() {
        out.push_str(&format!("{}Group: {}\n", DETAIL_INDENT, entity.group.trim()));
    }
    for line in render_with_stored(entity, now) {
        out.push_str(DETAIL_INDENT);
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn section_heading(section: &GroupSection<'_>) -> String {
    let name = if section.is_ungrouped() {
        UNGROUPED_HEADING
    } else {
        section.display_name.as_str()
    };
    let online = section.members.iter().filter(|entity| entity.online).count();
    let muted = if section.notifications_enabled { "" } else { " [muted]" };
    format!("{} ({}/{} online){}", name, online, section.members.len(), muted)
}

fn entity_line(entity: &WatchedEntity) -> String {
    let marker = if entity.online { "●" } else { "○" };
    let mut line = format!("{} {}", marker, entity.display_name());
    if !entity.display_name().eq_ignore_ascii_case(entity.key.trim()) {
        line.push_str(&format!(" ({})", entity.key.trim()));
    }
    if !entity.notifications_enabled() {
        line.push_str(" [muted]");
    }
    line
}
