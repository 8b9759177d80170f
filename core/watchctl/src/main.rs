//! watchctl: manage the presence watch list.
//!
//! Edits the same files the daemon polls (`~/.presence-watch` by default).
//! The daemon picks up changes on its next cycle.

mod commands;
mod listing;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::Action;
use presence_core::StorageConfig;

#[derive(Parser)]
#[command(name = "watchctl")]
#[command(about = "Manage watched players and groups")]
#[command(version)]
struct Cli {
    /// Storage directory (defaults to ~/.presence-watch)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start watching a player (name or numeric id)
    Add {
        key: String,
        /// Group to place the player in
        #[arg(long, short, default_value = "")]
        group: String,
    },

    /// Stop watching a player
    Remove { key: String },

    /// Move a player to another group (empty group ungroups)
    Move {
        key: String,
        #[arg(default_value = "")]
        group: String,
    },

    /// Rename a group
    RenameGroup { old: String, new: String },

    /// Delete a group and stop watching its members
    DeleteGroup { group: String },

    /// Toggle alerts for one player
    Toggle { key: String },

    /// Toggle alerts for a whole group
    ToggleGroup { group: String },

    /// Move a player to a position within its group
    Reorder { key: String, position: usize },

    /// Move a group to a position in the listing
    MoveGroup { group: String, position: usize },

    /// List group names in listing order
    Groups,

    /// Show the grouped watch list
    List {
        /// Include detail lines under every player
        #[arg(long, short)]
        details: bool,
    },

    /// Show one player with all details
    Show { key: String },
}

impl From<Commands> for Action {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Add { key, group } => Action::Add { key, group },
            Commands::Remove { key } => Action::Remove { key },
            Commands::Move { key, group } => Action::Move { key, group },
            Commands::RenameGroup { old, new } => Action::RenameGroup { old, new },
            Commands::DeleteGroup { group } => Action::DeleteGroup { group },
            Commands::Toggle { key } => Action::Toggle { key },
            Commands::ToggleGroup { group } => Action::ToggleGroup { group },
            Commands::Reorder { key, position } => Action::Reorder { key, position },
            Commands::MoveGroup { group, position } => Action::MoveGroup { group, position },
            Commands::Groups => Action::Groups,
            Commands::List { details } => Action::List { details },
            Commands::Show { key } => Action::Show { key },
        }
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = match cli.root {
        Some(root) => StorageConfig::with_root(root),
        None => StorageConfig::default(),
    };

    match commands::run(&config, cli.command.into()) {
        Ok(output) => print!("{}", output),
        Err(err) => {
            tracing::debug!(error = ?err, "watchctl failed");
            eprintln!("watchctl: {}", err);
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
