//! Snapshot Module
//!
//! Backup and restore of the working schema as replayable SQL scripts:
//! - [`script`]: rendering one table into drop/create/insert text
//! - [`store`]: file layout, manifests and checksums on disk
//! - [`engine`]: capture and replay against a live backend

pub mod engine;
pub mod script;
pub mod store;

pub use engine::{RestoreSummary, SetSummary, SnapshotBackend, SnapshotEngine};
pub use store::{SnapshotEntry, SnapshotStore};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How whole-schema capture and restore are bracketed.
///
/// `Autocommit` reads and replays table by table, so a set is only
/// approximately point-in-time and a failed restore leaves earlier tables
/// replayed. `Transactional` wraps each whole-schema pass in one
/// transaction (repeatable-read for capture). Artifacts are identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    #[default]
    Autocommit,
    Transactional,
}

impl FromStr for SnapshotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "autocommit" => Ok(SnapshotMode::Autocommit),
            "transactional" => Ok(SnapshotMode::Transactional),
            other => Err(format!(
                "Unknown snapshot mode '{}' (expected autocommit or transactional)",
                other
            )),
        }
    }
}

impl fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotMode::Autocommit => write!(f, "autocommit"),
            SnapshotMode::Transactional => write!(f, "transactional"),
        }
    }
}
