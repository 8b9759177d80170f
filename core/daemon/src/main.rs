//! Presence daemon entrypoint.
//!
//! Polls the configured server on a fixed interval, reconciles the watch list
//! stored under `~/.presence-watch`, and hands alerts to the configured
//! notifier. `watchctl` edits the same files between cycles.

use clap::Parser;
use std::env;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use presence_core::{Scanner, StorageConfig};

mod config;
mod notifier;
mod provider;
mod runner;

use config::{DaemonConfig, LogConfig};
use provider::BattleMetricsProvider;
use runner::Runner;

const LOG_FILE_PREFIX: &str = "presence-daemon";
const MAX_LOG_FILES: usize = 7;

#[derive(Parser, Debug)]
#[command(name = "presence-daemon", version, about = "Watches game-server presence for a list of players")]
struct Args {
    /// Config file (defaults to ~/.presence-watch/daemon.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config_result = config::load_config(args.config.as_deref());
    let log_config = config_result
        .as_ref()
        .map(|config| config.log.clone())
        .unwrap_or_default();
    let _guard = init_logging(&log_config);

    let config = match config_result {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load daemon config");
            std::process::exit(1);
        }
    };

    let mut runner = match build_runner(&config) {
        Ok(runner) => runner,
        Err(err) => {
            error!(error = %err, "Failed to start presence daemon");
            std::process::exit(1);
        }
    };

    if args.once {
        match runner.run_once().await {
            Ok(report) => info!(
                changed = report.changed,
                saved = report.needs_save,
                alerts = report.alerts.len(),
                online = report.online_count,
                "Cycle complete"
            ),
            Err(err) => {
                error!(error = %err, "Monitoring cycle failed");
                std::process::exit(1);
            }
        }
        return;
    }

    tokio::select! {
        _ = runner.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!(error = %err, "Failed to listen for shutdown signal");
            }
            info!("Presence daemon stopping");
        }
    }
}

fn build_runner(config: &DaemonConfig) -> Result<Runner, String> {
    let storage = match &config.storage_dir {
        Some(dir) => StorageConfig::with_root(dir.clone()),
        None => StorageConfig::default(),
    };
    storage.ensure_dirs()?;

    let provider = BattleMetricsProvider::new(&config.provider)?;
    let notifier = notifier::from_config(&config.notifier);
    info!(
        server_id = %config.provider.server_id,
        notifier = if config.notifier.command.is_empty() { "log" } else { "command" },
        "Presence daemon configured"
    );

    Ok(Runner::new(
        storage,
        Box::new(provider),
        notifier,
        Scanner::new(config.info_ttl()),
        config.poll_interval(),
    ))
}

/// Stderr logging, plus daily-rotated files when a log directory is set.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_logging(log: &LogConfig) -> Option<WorkerGuard> {
    let debug_enabled = env::var("PRESENCE_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let file_writer = log.dir.as_ref().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .max_log_files(MAX_LOG_FILES)
            .build(dir)
            .map_err(|err| eprintln!("presence-daemon: file logging disabled: {}", err))
            .ok()
    });

    match file_writer {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    }
}
