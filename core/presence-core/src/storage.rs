//! Storage paths and persistence for the watch list.
//!
//! Production code uses `StorageConfig::default()` which points to
//! `~/.presence-watch/`. Tests use `StorageConfig::with_root(temp_dir)`.
//!
//! # File Format
//!
//! ```json
//! { "version": 1, "entities": [ { "key": "alice", ... } ] }
//! ```
//!
//! Loading is lenient. A missing or empty file is an empty list, a record that
//! fails to parse is skipped with a warning, and the survivors are repaired.
//! A bare top-level array is accepted as well.
//!
//! # Atomic Writes
//!
//! Both files are replaced whole via temp file + rename, so readers never see
//! a partially written list.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::{PresenceError, Result};
use crate::types::{GroupSettings, WatchedEntity};
use crate::watchlist::WatchList;

const STORE_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            root: home.join(".presence-watch"),
        }
    }
}

impl StorageConfig {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn watchlist_file(&self) -> PathBuf {
        self.root.join("watchlist.json")
    }

    pub fn group_settings_file(&self) -> PathBuf {
        self.root.join("group-settings.json")
    }

    pub fn daemon_config_file(&self) -> PathBuf {
        self.root.join("daemon.toml")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs_err::create_dir_all(&self.root).map_err(|source| PresenceError::Io {
            context: "creating storage directory".to_string(),
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntitiesFile {
    Versioned {
        #[serde(default)]
        version: Option<u32>,
        #[serde(default)]
        entities: Vec<Value>,
    },
    Bare(Vec<Value>),
}

#[derive(Serialize)]
struct EntitiesFileOut<'a> {
    version: u32,
    entities: &'a [WatchedEntity],
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupSettingsFile {
    #[serde(default)]
    version: Option<u32>,
    #[serde(flatten)]
    settings: GroupSettings,
}

/// Result of reading the entity list.
#[derive(Debug, Clone, Default)]
pub struct LoadedEntities {
    pub entities: Vec<WatchedEntity>,
    /// True if records were skipped or repaired and the file should be rewritten.
    pub needs_save: bool,
}

pub fn load_entities(config: &StorageConfig) -> Result<LoadedEntities> {
    let path = config.watchlist_file();
    let Some(content) = read_optional(&path)? else {
        return Ok(LoadedEntities::default());
    };

    let records = match serde_json::from_str::<EntitiesFile>(&content) {
        Ok(EntitiesFile::Versioned { version, entities }) => {
            if version.is_some_and(|v| v > STORE_VERSION) {
                tracing::warn!(
                    path = %path.display(),
                    version = ?version,
                    "Watch list written by a newer version, reading what we understand"
                );
            }
            entities
        }
        Ok(EntitiesFile::Bare(entities)) => entities,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to parse watch list, starting empty");
            return Ok(LoadedEntities::default());
        }
    };

    let mut loaded = LoadedEntities::default();
    let mut seen = HashSet::new();
    for (index, record) in records.into_iter().enumerate() {
        let mut entity = match serde_json::from_value::<WatchedEntity>(record) {
            Ok(entity) => entity,
            Err(err) => {
                tracing::warn!(index, error = %err, "Skipping malformed watch list record");
                loaded.needs_save = true;
                continue;
            }
        };
        if entity.repair() {
            loaded.needs_save = true;
        }
        if entity.key.is_empty() || !seen.insert(entity.key.to_lowercase()) {
            tracing::warn!(index, key = %entity.key, "Skipping blank or duplicate watch list key");
            loaded.needs_save = true;
            continue;
        }
        loaded.entities.push(entity);
    }
    Ok(loaded)
}

pub fn save_entities(config: &StorageConfig, entities: &[WatchedEntity]) -> Result<()> {
    let file = EntitiesFileOut {
        version: STORE_VERSION,
        entities,
    };
    let content = serde_json::to_string_pretty(&file).map_err(|source| PresenceError::Json {
        context: "serializing watch list".to_string(),
        source,
    })?;
    write_atomic(&config.watchlist_file(), &content)
}

pub fn load_group_settings(config: &StorageConfig) -> Result<GroupSettings> {
    let path = config.group_settings_file();
    let Some(content) = read_optional(&path)? else {
        return Ok(GroupSettings::default());
    };
    match serde_json::from_str::<GroupSettingsFile>(&content) {
        Ok(file) => Ok(file.settings),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to parse group settings, using defaults");
            Ok(GroupSettings::default())
        }
    }
}

pub fn save_group_settings(config: &StorageConfig, settings: &GroupSettings) -> Result<()> {
    let file = GroupSettingsFile {
        version: Some(STORE_VERSION),
        settings: settings.clone(),
    };
    let content = serde_json::to_string_pretty(&file).map_err(|source| PresenceError::Json {
        context: "serializing group settings".to_string(),
        source,
    })?;
    write_atomic(&config.group_settings_file(), &content)
}

/// Loads both files into a normalized [`WatchList`], rewriting them if
/// loading had to repair anything.
pub fn load_watch_list(config: &StorageConfig) -> Result<WatchList> {
    let loaded = load_entities(config)?;
    let settings = load_group_settings(config)?;
    let stored_settings = settings.clone();
    let stored_entities = loaded.entities.clone();
    let list = WatchList::new(loaded.entities, settings);

    if loaded.needs_save || list.entities() != stored_entities.as_slice() {
        save_entities(config, list.entities())?;
    }
    if list.settings() != &stored_settings {
        save_group_settings(config, list.settings())?;
    }
    Ok(list)
}

pub fn save_watch_list(config: &StorageConfig, list: &WatchList) -> Result<()> {
    save_entities(config, list.entities())?;
    save_group_settings(config, list.settings())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs_err::read_to_string(path).map_err(|source| PresenceError::Io {
        context: "reading storage file".to_string(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(content))
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PresenceError::NoParentDir(path.to_path_buf()))?;
    let io_err = |context: &str| {
        let context = format!("{}: {}", context, path.display());
        move |source: std::io::Error| PresenceError::Io { context, source }
    };

    fs_err::create_dir_all(parent).map_err(io_err("creating directory for"))?;
    let mut temp_file = NamedTempFile::new_in(parent).map_err(io_err("creating temp file for"))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(io_err("writing temp file for"))?;
    temp_file.flush().map_err(io_err("flushing temp file for"))?;
    temp_file
        .persist(path)
        .map_err(|err| io_err("replacing")(err.error))?;
    Ok(())
}
