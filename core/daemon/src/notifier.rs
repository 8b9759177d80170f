//! Alert delivery backends.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use presence_core::{Notifier, PresenceError, Result};

use crate::config::NotifierConfig;

const STATUS_ONLINE_TITLE: &str = "Player online";
const STATUS_OFFLINE_TITLE: &str = "Player offline";
const GROUP_OFFLINE_TITLE: &str = "Group offline";

/// Message title and body for a status change.
fn status_message(display_name: &str, online: bool) -> (&'static str, String) {
    if online {
        (STATUS_ONLINE_TITLE, format!("{} is online", display_name))
    } else {
        (STATUS_OFFLINE_TITLE, format!("{} is offline", display_name))
    }
}

fn group_message(group_name: &str) -> (&'static str, String) {
    (
        GROUP_OFFLINE_TITLE,
        format!("Everyone in {} is offline", group_name),
    )
}

/// Writes alerts to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_status_change(&self, display_name: &str, online: bool) -> Result<()> {
        let (title, body) = status_message(display_name, online);
        info!(title, body = %body, "Alert");
        Ok(())
    }

    async fn notify_group_all_offline(&self, group_name: &str) -> Result<()> {
        let (title, body) = group_message(group_name);
        info!(title, body = %body, "Alert");
        Ok(())
    }
}

/// Runs an external command (e.g. `notify-send`) with title and body appended.
/// A run that outlives `timeout` is killed and counts as a failed delivery.
#[derive(Debug)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandNotifier {
    /// Returns `None` for an empty command line.
    pub fn new(command: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    async fn run(&self, title: &str, body: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| PresenceError::NotifyFailed(format!("{}: {}", self.program, err)))?;

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(waited) => waited
                .map_err(|err| PresenceError::NotifyFailed(format!("{}: {}", self.program, err)))?,
            Err(_) => {
                warn!(program = %self.program, timeout_secs = self.timeout.as_secs(), "Notifier command timed out");
                return Err(PresenceError::NotifyFailed(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                )));
            }
        };
        if !status.success() {
            return Err(PresenceError::NotifyFailed(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        info!(title, body, "Alert delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify_status_change(&self, display_name: &str, online: bool) -> Result<()> {
        let (title, body) = status_message(display_name, online);
        self.run(title, &body).await
    }

    async fn notify_group_all_offline(&self, group_name: &str) -> Result<()> {
        let (title, body) = group_message(group_name);
        self.run(title, &body).await
    }
}

/// Command notifier when a command is configured, log-only otherwise.
pub fn from_config(config: &NotifierConfig) -> Box<dyn Notifier> {
    match CommandNotifier::new(&config.command, config.timeout()) {
        Some(notifier) => Box::new(notifier),
        None => Box::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_messages_mention_name() {
        assert_eq!(
            status_message("Alice", true),
            ("Player online", "Alice is online".to_string())
        );
        assert_eq!(
            status_message("Alice", false),
            ("Player offline", "Alice is offline".to_string())
        );
        assert_eq!(group_message("Raid").1, "Everyone in Raid is offline");
    }

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn command(parts: &[&str], timeout: Duration) -> CommandNotifier {
        let parts: Vec<String> = parts.iter().map(|part| part.to_string()).collect();
        CommandNotifier::new(&parts, timeout).unwrap()
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandNotifier::new(&[], TEST_TIMEOUT).is_none());
        assert!(CommandNotifier::new(&["  ".to_string()], TEST_TIMEOUT).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_notifier_reports_exit_status() {
        let ok = command(&["true"], TEST_TIMEOUT);
        assert!(ok.notify_status_change("Alice", true).await.is_ok());

        let failing = command(&["false"], TEST_TIMEOUT);
        assert!(matches!(
            failing.notify_group_all_offline("Raid").await,
            Err(PresenceError::NotifyFailed(_))
        ));

        let missing = command(&["/definitely/not/a/program"], TEST_TIMEOUT);
        assert!(missing.notify_status_change("Alice", false).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_command_is_killed_after_timeout() {
        // `sh -c 'sleep 30' <title> <body>`: title and body become $0 and $1.
        let hung = command(&["sh", "-c", "sleep 30"], Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = hung.notify_status_change("Alice", true).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.notify_group_all_offline("Raid").await.is_ok());
    }
}
