//! Snapshot Store
//!
//! File layout under the backup directory:
//!
//! ```text
//! backups/
//!   Product_20261018_142501.sql          single-table snapshot
//!   backup_20261018_142733/              snapshot set
//!     Customers.sql
//!     Orders.sql
//!     manifest.json                      written last
//! ```
//!
//! Single-table files and set directories are created exclusively. When a
//! name is already taken (two captures in the same second) the new one gets
//! a `_1`, `_2`, ... suffix, so an earlier snapshot is never overwritten.
//! A set whose manifest is missing was interrupted (or predates manifests)
//! and is replayed unverified.

use super::SnapshotMode;
use crate::error::AppError;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "manifest.json";
const SET_PREFIX: &str = "backup_";
const SCRIPT_EXT: &str = "sql";
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Per-table record in a set manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub table: String,
    pub file: String,
    pub rows: usize,
    pub sha256: String,
}

/// Written after every member of a set has been captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifest {
    pub timestamp: String,
    pub captured_at: DateTime<Utc>,
    pub schema: String,
    pub mode: SnapshotMode,
    pub tables: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Table,
    Set,
}

/// Listing entry (lightweight, used to offer restore choices)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub name: String,
    pub kind: SnapshotKind,
    pub path: PathBuf,
    pub modified: Option<DateTime<Utc>>,
    /// Sets only: whether a manifest marks the capture as finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
}

/// A script that has been written to disk
#[derive(Debug, Clone)]
pub struct WrittenScript {
    pub path: PathBuf,
    pub sha256: String,
}

pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Capture timestamp shared by every file of one capture
    pub fn timestamp(at: DateTime<Local>) -> String {
        at.format("%Y%m%d_%H%M%S").to_string()
    }

    /// `<root>/<table>_<timestamp>.sql`
    pub fn table_snapshot_path(&self, table: &str, timestamp: &str) -> Result<PathBuf, AppError> {
        Ok(self
            .root
            .join(format!("{}_{}.{}", file_stem(table)?, timestamp, SCRIPT_EXT)))
    }

    /// `<root>/backup_<timestamp>/`
    pub fn set_dir(&self, timestamp: &str) -> PathBuf {
        self.root.join(format!("{}{}", SET_PREFIX, timestamp))
    }

    /// Create a fresh `backup_<timestamp>` directory, suffixed if taken.
    pub fn create_set_dir(&self, timestamp: &str) -> Result<PathBuf, AppError> {
        fs::create_dir_all(&self.root)?;
        let (dir, ()) = claim(&self.set_dir(timestamp), |candidate| fs::create_dir(candidate))?;
        Ok(dir)
    }

    /// `<set>/<table>.sql`
    pub fn set_member_path(dir: &Path, table: &str) -> Result<PathBuf, AppError> {
        Ok(dir.join(format!("{}.{}", file_stem(table)?, SCRIPT_EXT)))
    }

    pub fn write_script(&self, path: &Path, script: &str) -> Result<WrittenScript, AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, script)?;
        debug!("Wrote {} ({} bytes)", path.display(), script.len());

        Ok(WrittenScript {
            path: path.to_path_buf(),
            sha256: checksum(script.as_bytes()),
        })
    }

    /// Write to `path`, or to the first free suffixed name next to it.
    pub fn write_new_script(&self, path: &Path, script: &str) -> Result<WrittenScript, AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let (path, mut file) = claim(path, |candidate| {
            OpenOptions::new().write(true).create_new(true).open(candidate)
        })?;
        file.write_all(script.as_bytes())?;
        file.sync_all()?;
        debug!("Wrote {} ({} bytes)", path.display(), script.len());

        Ok(WrittenScript {
            sha256: checksum(script.as_bytes()),
            path,
        })
    }

    pub fn read_script(path: &Path) -> Result<String, AppError> {
        fs::read_to_string(path).map_err(|e| {
            AppError::Restore(format!("Error reading backup file {}: {}", path.display(), e))
        })
    }

    pub fn write_manifest(dir: &Path, manifest: &SnapshotManifest) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| AppError::Internal(format!("Manifest serialization failed: {}", e)))?;
        fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// `Ok(None)` when the set has no manifest
    pub fn read_manifest(dir: &Path) -> Result<Option<SnapshotManifest>, AppError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| AppError::Restore(format!("Error reading manifest: {}", e)))?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| AppError::Restore(format!("Corrupt manifest {}: {}", path.display(), e)))
    }

    /// Script files of a set, in replay (lexicographic file name) order
    pub fn set_members(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
        let entries = fs::read_dir(dir).map_err(|e| {
            AppError::Restore(format!("Error reading backup directory {}: {}", dir.display(), e))
        })?;

        let mut members = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == SCRIPT_EXT) {
                members.push(path);
            }
        }
        members.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(members)
    }

    /// Check every manifest member is present and unchanged, and that the
    /// set holds no script the manifest does not list.
    pub fn verify(dir: &Path, manifest: &SnapshotManifest) -> Result<(), AppError> {
        let listed: HashSet<&str> = manifest.tables.iter().map(|e| e.file.as_str()).collect();
        for member in Self::set_members(dir)? {
            let name = member.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if !listed.contains(name.as_str()) {
                return Err(AppError::Restore(format!(
                    "Snapshot file {} is not listed in the set's manifest",
                    member.display()
                )));
            }
        }

        for entry in &manifest.tables {
            let path = dir.join(&entry.file);
            let bytes = fs::read(&path).map_err(|e| {
                AppError::Restore(format!(
                    "Snapshot of '{}' missing from set ({}): {}",
                    entry.table,
                    path.display(),
                    e
                ))
            })?;
            if checksum(&bytes) != entry.sha256 {
                return Err(AppError::Restore(format!(
                    "Snapshot file {} does not match its manifest checksum (truncated or edited)",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Entry of the backup directory named by a client, as listed by `list`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, AppError> {
        let path = self.root.join(file_stem(name)?);
        if !path.exists() {
            return Err(AppError::NotFound(format!("Snapshot '{}' not found", name)));
        }
        Ok(path)
    }

    /// Every snapshot file and set under the root, newest first
    pub fn list(&self) -> Result<Vec<SnapshotEntry>, AppError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from);

            if path.is_dir() && name.starts_with(SET_PREFIX) {
                let complete = path.join(MANIFEST_FILE).exists();
                entries.push(SnapshotEntry {
                    name,
                    kind: SnapshotKind::Set,
                    path,
                    modified,
                    complete: Some(complete),
                });
            } else if path.is_file() && path.extension().is_some_and(|ext| ext == SCRIPT_EXT) {
                entries.push(SnapshotEntry {
                    name,
                    kind: SnapshotKind::Table,
                    path,
                    modified,
                    complete: None,
                });
            } else {
                warn!("Ignoring unexpected entry in backup directory: {}", name);
            }
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(entries)
    }
}

/// Hex SHA-256 of a script's bytes
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Create `base`, or `base` with the first free `_<n>` suffix before its
/// extension. `create` must fail with `AlreadyExists` when a name is taken.
fn claim<T, F>(base: &Path, mut create: F) -> Result<(PathBuf, T), AppError>
where
    F: FnMut(&Path) -> io::Result<T>,
{
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = suffixed(base, attempt);
        match create(&candidate) {
            Ok(created) => return Ok((candidate, created)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::Internal(format!(
        "No free snapshot name next to {}",
        base.display()
    )))
}

fn suffixed(base: &Path, attempt: usize) -> PathBuf {
    if attempt == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}_{}.{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{}_{}", stem, attempt),
    };
    base.with_file_name(name)
}

/// Table names become file names; refuse anything that would escape the
/// snapshot directory.
fn file_stem(table: &str) -> Result<&str, AppError> {
    if table.is_empty()
        || table.contains(['/', '\\', '\0'])
        || table == "."
        || table == ".."
    {
        return Err(AppError::Validation(format!(
            "Table name '{}' cannot be used as a snapshot file name",
            table
        )));
    }
    Ok(table)
}
