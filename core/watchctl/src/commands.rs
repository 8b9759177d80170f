//! Watch-list edits. Each command loads the list, applies one change, and
//! saves it back only when something changed.

use chrono::Utc;

use presence_core::storage::{self, StorageConfig};
use presence_core::{PresenceError, Result, WatchList};

use crate::listing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Add { key: String, group: String },
    Remove { key: String },
    Move { key: String, group: String },
    RenameGroup { old: String, new: String },
    DeleteGroup { group: String },
    Toggle { key: String },
    ToggleGroup { group: String },
    Reorder { key: String, position: usize },
    MoveGroup { group: String, position: usize },
    Groups,
    List { details: bool },
    Show { key: String },
}

impl Action {
    fn is_read_only(&self) -> bool {
        matches!(self, Action::Groups | Action::List { .. } | Action::Show { .. })
    }
}

/// Runs one action against the list stored under `config` and returns the
/// text to print.
pub fn run(config: &StorageConfig, action: Action) -> Result<String> {
    let mut list = storage::load_watch_list(config)?;
    let before = list.clone();
    let read_only = action.is_read_only();
    let output = apply(&mut list, action)?;
    if !read_only && list != before {
        storage::save_watch_list(config, &list)?;
        tracing::debug!(entities = list.len(), "Watch list saved");
    }
    Ok(output)
}

fn apply(list: &mut WatchList, action: Action) -> Result<String> {
    let output = match action {
        Action::Add { key, group } => {
            let entity = list.add(&key, &group)?;
            match entity.group.as_str() {
                "" => format!("Watching {}", entity.key),
                group => format!("Watching {} in {}", entity.key, group),
            }
        }
        Action::Remove { key } => {
            let removed = list.remove(&key)?;
            format!("Stopped watching {}", removed.key)
        }
        Action::Move { key, group } => {
            if list.move_to_group(&key, &group)? {
                match group.trim() {
                    "" => format!("Moved {} out of its group", key.trim()),
                    group => format!("Moved {} to {}", key.trim(), group),
                }
            } else {
                format!("{} is already there", key.trim())
            }
        }
        Action::RenameGroup { old, new } => {
            if list.rename_group(&old, &new)? {
                format!("Renamed {} to {}", old.trim(), new.trim())
            } else {
                "Nothing to rename".to_string()
            }
        }
        Action::DeleteGroup { group } => {
            let removed = list.delete_group(&group)?;
            format!("Deleted {} and stopped watching {} player(s)", group.trim(), removed)
        }
        Action::Toggle { key } => {
            let enabled = list.toggle_entity_notifications(&key)?;
            format!("Alerts for {} {}", key.trim(), on_off(enabled))
        }
        Action::ToggleGroup { group } => {
            let enabled = list.toggle_group_notifications(&group)?;
            format!("Alerts for group {} {}", group.trim(), on_off(enabled))
        }
        Action::Reorder { key, position } => {
            list.reorder(&key, position)?;
            format!("Moved {} to position {}", key.trim(), position)
        }
        Action::MoveGroup { group, position } => {
            list.move_group(&group, position)?;
            format!("Moved group {} to position {}", group.trim(), position)
        }
        Action::Groups => {
            let names = list.group_names();
            if names.is_empty() {
                "No groups".to_string()
            } else {
                names.join("\n")
            }
        }
        Action::List { details } => {
            return Ok(listing::render_list(list, details, Utc::now()));
        }
        Action::Show { key } => {
            let entity = list
                .find(&key)
                .ok_or_else(|| PresenceError::EntityNotFound(key.trim().to_string()))?;
            return Ok(listing::render_entity(entity, Utc::now()));
        }
    };
    Ok(format!("{}\n", output))
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, StorageConfig) {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = StorageConfig::with_root(dir.path().to_path_buf());
        (dir, config)
    }

    fn add(config: &StorageConfig, key: &str, group: &str) -> String {
        run(
            config,
            Action::Add {
                key: key.to_string(),
                group: group.to_string(),
            },
        )
        .expect("add")
    }

    #[test]
    fn add_persists_and_reports() {
        let (_dir, config) = storage();
        assert_eq!(add(&config, "alice", "Raid"), "Watching alice in Raid\n");
        assert_eq!(add(&config, "bob", ""), "Watching bob\n");

        let list = storage::load_watch_list(&config).expect("load");
        assert_eq!(list.len(), 2);
        assert_eq!(list.find("alice").expect("alice").group, "Raid");
    }

    #[test]
    fn duplicate_add_fails_without_saving_twice() {
        let (_dir, config) = storage();
        add(&config, "alice", "");
        let err = run(
            &config,
            Action::Add {
                key: "ALICE".to_string(),
                group: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, PresenceError::DuplicateKey(_)));
        assert_eq!(storage::load_watch_list(&config).expect("load").len(), 1);
    }

    #[test]
    fn read_only_actions_do_not_create_files() {
        let (_dir, config) = storage();
        assert_eq!(
            run(&config, Action::List { details: false }).expect("list"),
            "Watch list is empty.\n"
        );
        assert_eq!(run(&config, Action::Groups).expect("groups"), "No groups\n");
        assert!(!config.watchlist_file().exists());
        assert!(!config.group_settings_file().exists());
    }

    #[test]
    fn group_edits_round_trip_through_storage() {
        let (_dir, config) = storage();
        add(&config, "alice", "Raid");
        add(&config, "bob", "Farm");

        assert_eq!(
            run(
                &config,
                Action::ToggleGroup {
                    group: "raid".to_string()
                }
            )
            .expect("toggle"),
            "Alerts for group raid off\n"
        );
        run(
            &config,
            Action::RenameGroup {
                old: "Raid".to_string(),
                new: "Squad".to_string(),
            },
        )
        .expect("rename");
        run(
            &config,
            Action::MoveGroup {
                group: "squad".to_string(),
                position: 5,
            },
        )
        .expect("move group");

        let list = storage::load_watch_list(&config).expect("load");
        assert_eq!(list.find("alice").expect("alice").group, "Squad");
        assert!(!list.settings().notifications_enabled("squad"));
        assert_eq!(list.group_names(), vec!["Farm".to_string(), "Squad".to_string()]);
    }

    #[test]
    fn delete_group_removes_members() {
        let (_dir, config) = storage();
        add(&config, "alice", "Raid");
        add(&config, "bob", "Raid");
        add(&config, "carol", "");

        let output = run(
            &config,
            Action::DeleteGroup {
                group: "Raid".to_string(),
            },
        )
        .expect("delete");
        assert_eq!(output, "Deleted Raid and stopped watching 2 player(s)\n");

        let list = storage::load_watch_list(&config).expect("load");
        assert_eq!(list.len(), 1);
        assert!(list.group_names().is_empty());
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let (_dir, config) = storage();
        let err = run(
            &config,
            Action::Show {
                key: "ghost".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, PresenceError::EntityNotFound(key) if key == "ghost"));
    }

    #[test]
    fn toggle_and_reorder_entities() {
        let (_dir, config) = storage();
        add(&config, "alice", "");
        add(&config, "bob", "");

        assert_eq!(
            run(
                &config,
                Action::Toggle {
                    key: "bob".to_string()
                }
            )
            .expect("toggle"),
            "Alerts for bob off\n"
        );
        run(
            &config,
            Action::Reorder {
                key: "bob".to_string(),
                position: 0,
            },
        )
        .expect("reorder");

        let list = storage::load_watch_list(&config).expect("load");
        let bob = list.find("bob").expect("bob");
        assert!(!bob.notifications_enabled());
        assert_eq!(bob.sort_order, 0);
        assert_eq!(list.find("alice").expect("alice").sort_order, 1);
    }
}
