//! Daemon configuration (`~/.presence-watch/daemon.toml`).
//!
//! A missing file yields defaults; every field is optional.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".presence-watch/daemon.toml";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_INFO_TTL_SECS: u64 = 60;
const DEFAULT_BASE_URL: &str = "https://api.battlemetrics.com";
const DEFAULT_SERVER_ID: &str = "14154299";
const DEFAULT_TOKEN_ENV: &str = "BATTLEMETRICS_TOKEN";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_server_id")]
    pub server_id: String,
    /// Inline API token. Takes precedence over `token_env`.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            server_id: default_server_id(),
            token: None,
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Inline token, else the named environment variable. Blank means none.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| env::var(&self.token_env).ok())
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Program and leading arguments; title and body are appended.
    /// Empty means alerts are only logged.
    #[serde(default)]
    pub command: Vec<String>,
    /// Upper bound for one command run before it is killed.
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Directory for daily-rotated log files. Stderr only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_info_ttl_secs")]
    pub info_ttl_secs: u64,
    /// Storage root override. Defaults to `~/.presence-watch`.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            info_ttl_secs: default_info_ttl_secs(),
            storage_dir: None,
            provider: ProviderConfig::default(),
            notifier: NotifierConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn info_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.info_ttl_secs.min(u64::from(u32::MAX)) as i64)
    }
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_info_ttl_secs() -> u64 {
    DEFAULT_INFO_TTL_SECS
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_server_id() -> String {
    DEFAULT_SERVER_ID.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_notify_timeout_secs() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}

pub fn default_config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

pub fn load_config(path: Option<&Path>) -> Result<DaemonConfig, String> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(DaemonConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| {
        format!(
            "Failed to read daemon config {}: {}",
            config_path.display(),
            err
        )
    })?;
    toml::from_str::<DaemonConfig>(&content).map_err(|err| {
        format!(
            "Failed to parse daemon config {}: {}",
            config_path.display(),
            err
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = load_config(Some(&temp_dir.path().join("missing.toml"))).expect("load config");
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.info_ttl(), chrono::Duration::seconds(60));
        assert_eq!(config.provider.server_id, "14154299");
        assert!(config.notifier.command.is_empty());
        assert_eq!(config.notifier.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn load_config_parses_all_sections() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.toml");
        fs_err::write(
            &path,
            r#"
poll_interval_secs = 30
info_ttl_secs = 120
storage_dir = "/srv/presence"

[provider]
base_url = "http://localhost:8080"
server_id = "99"
token = "abc"
timeout_secs = 3

[notifier]
command = ["notify-send", "--urgency=low"]
timeout_secs = 2

[log]
dir = "/var/log/presence"
"#,
        )
        .expect("write config");

        let config = load_config(Some(&path)).expect("load config");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.info_ttl_secs, 120);
        assert_eq!(config.storage_dir, Some(PathBuf::from("/srv/presence")));
        assert_eq!(config.provider.base_url, "http://localhost:8080");
        assert_eq!(config.provider.server_id, "99");
        assert_eq!(config.provider.resolve_token().as_deref(), Some("abc"));
        assert_eq!(config.provider.timeout(), Duration::from_secs(3));
        assert_eq!(config.provider.token_env, "BATTLEMETRICS_TOKEN");
        assert_eq!(
            config.notifier.command,
            vec!["notify-send".to_string(), "--urgency=low".to_string()]
        );
        assert_eq!(config.notifier.timeout(), Duration::from_secs(2));
        assert_eq!(config.log.dir, Some(PathBuf::from("/var/log/presence")));
    }

    #[test]
    fn load_config_rejects_invalid_toml() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.toml");
        fs_err::write(&path, "poll_interval_secs = \"soon\"").expect("write config");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.contains("Failed to parse daemon config"));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let config = DaemonConfig {
            poll_interval_secs: 0,
            ..DaemonConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn blank_inline_token_resolves_to_none() {
        let provider = ProviderConfig {
            token: Some("   ".to_string()),
            token_env: "PRESENCE_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
            ..ProviderConfig::default()
        };
        assert_eq!(provider.resolve_token(), None);
    }
}
