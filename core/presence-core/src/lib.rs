//! # presence-core
//!
//! Presence reconciliation and session analytics for watched game-server
//! players, shared by the polling daemon and the `watchctl` CLI.
//!
//! ## Design Principles
//!
//! - **Single writer**: one cycle owns the entity list end to end; callers pass
//!   it in by `&mut` and persist it afterwards.
//! - **Edge-triggered**: histograms, session totals and alerts move only on
//!   online/offline transitions, never on repeated observations.
//! - **Graceful degradation**: a failed fetch is an invalid snapshot that
//!   changes nothing; missing files load as empty lists.
//! - **Runtime-agnostic**: the only async seam is [`SnapshotProvider`]; no
//!   executor is required by the library itself.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use presence_core::{storage, Monitor, Scanner, StorageConfig};
//!
//! let config = StorageConfig::default();
//! let mut list = storage::load_watch_list(&config)?;
//! let mut monitor = Monitor::new(Scanner::default());
//! let settings = list.settings().clone();
//! let report = monitor
//!     .run_cycle(&provider, list.entities_mut(), &settings, chrono::Utc::now())
//!     .await;
//! ```

pub mod details;
pub mod error;
pub mod format;
pub mod gate;
pub mod monitor;
pub mod scan;
pub mod snapshot;
pub mod storage;
pub mod tracker;
pub mod types;
pub mod watchlist;

pub use details::{merge_details, render, render_with_attributes, render_with_stored};
pub use error::{PresenceError, Result};
pub use gate::{membership_signature, GroupAlert, GroupGate};
pub use monitor::{dispatch, AlertIntent, CycleReport, Monitor, Notifier};
pub use scan::{lookup_keys, ScanOutcome, Scanner, SnapshotProvider, StatusTransition};
pub use snapshot::{PresenceAttributes, Snapshot, SnapshotMatch};
pub use storage::{LoadedEntities, StorageConfig};
pub use tracker::{reconcile, Transition};
pub use types::*;
pub use watchlist::{GroupSection, WatchList};
