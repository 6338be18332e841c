//! Snapshot Engine
//!
//! Capture tables into scripts and replay scripts back into the store.
//!
//! Capture reads strictly: a failed catalog or row read aborts with
//! `AppError::Capture` and never produces a partial script. A set capture
//! that fails midway leaves the already-written member files on disk and
//! no manifest.
//!
//! Set restore drops every table currently in the schema, then replays the
//! member files in file-name order. This is a heuristic, not a dependency
//! sort: it works because snapshot scripts carry no foreign keys, so no
//! member can depend on another being replayed first.

use super::script::SnapshotScript;
use super::store::{ManifestEntry, SnapshotManifest, SnapshotStore};
use super::SnapshotMode;
use crate::db::queries::SqlBuilder;
use crate::db::Session;
use crate::error::AppError;
use crate::introspection::{ColumnDef, Introspector};
use crate::rows::{RowAccess, RowSet};
use async_trait::async_trait;
use chrono::{Local, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BEGIN_CAPTURE: &str = "BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY";
const BEGIN_RESTORE: &str = "BEGIN";
const COMMIT: &str = "COMMIT";
const ROLLBACK: &str = "ROLLBACK";

/// What the engine needs from the store. Reads must be strict: errors are
/// returned, never swallowed into empty results.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Working schema scripts are rendered against
    fn schema(&self) -> &str;

    async fn list_tables(&self) -> Result<Vec<String>, AppError>;

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDef>, AppError>;

    async fn fetch_all(&self, table: &str) -> Result<RowSet, AppError>;

    /// Execute a script of one or more statements as-is
    async fn execute_script(&self, script: &str) -> Result<(), AppError>;
}

#[async_trait]
impl SnapshotBackend for Session {
    fn schema(&self) -> &str {
        Session::schema(self)
    }

    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        Introspector::try_list_tables(self).await
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDef>, AppError> {
        Introspector::try_list_columns(self, table).await
    }

    async fn fetch_all(&self, table: &str) -> Result<RowSet, AppError> {
        RowAccess::try_fetch_all(self, table).await
    }

    async fn execute_script(&self, script: &str) -> Result<(), AppError> {
        Ok(self.batch_execute(script).await?)
    }
}

/// Result of a whole-schema capture
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSummary {
    pub dir: PathBuf,
    pub timestamp: String,
    pub tables: Vec<ManifestEntry>,
}

/// Result of a whole-schema restore
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub dropped: Vec<String>,
    pub replayed: Vec<String>,
    pub verified: bool,
}

pub struct SnapshotEngine {
    store: SnapshotStore,
    mode: SnapshotMode,
}

impl SnapshotEngine {
    pub fn new(store: SnapshotStore, mode: SnapshotMode) -> Self {
        Self { store, mode }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn mode(&self) -> SnapshotMode {
        self.mode
    }

    /// Read one table's columns and rows into a script.
    ///
    /// Existence comes from the table listing: a table whose last column
    /// was dropped still exists and captures as `CREATE TABLE .. ()`.
    pub async fn capture<B>(backend: &B, table: &str) -> Result<SnapshotScript, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let tables = backend
            .list_tables()
            .await
            .map_err(|e| AppError::capture(table, e.to_string()))?;
        if !tables.iter().any(|t| t == table) {
            return Err(AppError::capture(table, "table does not exist"));
        }
        Self::read_table(backend, table).await
    }

    async fn read_table<B>(backend: &B, table: &str) -> Result<SnapshotScript, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let columns = backend
            .list_columns(table)
            .await
            .map_err(|e| AppError::capture(table, e.to_string()))?;

        let data = backend
            .fetch_all(table)
            .await
            .map_err(|e| AppError::capture(table, e.to_string()))?;

        Ok(SnapshotScript {
            schema: backend.schema().to_string(),
            table: table.to_string(),
            columns,
            data,
        })
    }

    /// Snapshot one table to `<backup_dir>/<table>_<timestamp>.sql`, or a
    /// suffixed name when that file already exists.
    pub async fn snapshot_table<B>(&self, backend: &B, table: &str) -> Result<PathBuf, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let timestamp = SnapshotStore::timestamp(Local::now());
        let path = self.store.table_snapshot_path(table, &timestamp)?;

        let script = Self::capture(backend, table).await?;
        let path = self
            .store
            .write_new_script(&path, &script.render()?)
            .map_err(|e| AppError::capture(table, e.to_string()))?
            .path;

        info!(
            "Snapshot of {} ({} rows) written to {}",
            table,
            script.row_count(),
            path.display()
        );
        Ok(path)
    }

    /// Snapshot every table of the schema into one `backup_<timestamp>`
    /// directory. The manifest is written only once all members exist.
    pub async fn snapshot_schema<B>(&self, backend: &B) -> Result<SetSummary, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let captured_at = Local::now();
        let timestamp = SnapshotStore::timestamp(captured_at);
        let dir = self.store.create_set_dir(&timestamp)?;

        self.begin(backend, BEGIN_CAPTURE)
            .await
            .map_err(|e| AppError::capture(backend.schema(), e.to_string()))?;
        let captured = self.capture_set(backend, &dir).await;
        let tables = self.finish(backend, captured).await?;

        let manifest = SnapshotManifest {
            timestamp: timestamp.clone(),
            captured_at: captured_at.with_timezone(&Utc),
            schema: backend.schema().to_string(),
            mode: self.mode,
            tables,
        };
        SnapshotStore::write_manifest(&dir, &manifest)?;

        info!(
            "Snapshot set of {} tables written to {}",
            manifest.tables.len(),
            dir.display()
        );
        Ok(SetSummary {
            dir,
            timestamp,
            tables: manifest.tables,
        })
    }

    async fn capture_set<B>(&self, backend: &B, dir: &Path) -> Result<Vec<ManifestEntry>, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let tables = backend
            .list_tables()
            .await
            .map_err(|e| AppError::capture(backend.schema(), e.to_string()))?;

        let mut entries = Vec::with_capacity(tables.len());
        for table in tables {
            let path = SnapshotStore::set_member_path(dir, &table)?;
            let script = Self::read_table(backend, &table).await?;
            let written = self
                .store
                .write_script(&path, &script.render()?)
                .map_err(|e| AppError::capture(table.as_str(), e.to_string()))?;

            debug!("Captured {} ({} rows)", table, script.row_count());
            entries.push(ManifestEntry {
                file: file_name(&written.path),
                rows: script.row_count(),
                sha256: written.sha256,
                table,
            });
        }
        Ok(entries)
    }

    /// Replay one snapshot file verbatim.
    pub async fn restore_snapshot<B>(&self, backend: &B, path: &Path) -> Result<(), AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let script = SnapshotStore::read_script(path)?;
        backend
            .execute_script(&script)
            .await
            .map_err(|e| AppError::Restore(format!("Error restoring {}: {}", path.display(), e)))?;

        info!("Restored snapshot {}", path.display());
        Ok(())
    }

    /// Drop every table in the schema, then replay every member of the set.
    ///
    /// Nothing is dropped unless the set is non-empty and, when it has a
    /// manifest, the members are exactly the files it lists and every one
    /// matches its checksum.
    pub async fn restore_snapshot_set<B>(&self, backend: &B, dir: &Path) -> Result<RestoreSummary, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let members = SnapshotStore::set_members(dir)?;
        if members.is_empty() {
            return Err(AppError::Restore(format!(
                "Backup directory {} contains no snapshot files",
                dir.display()
            )));
        }

        let verified = match SnapshotStore::read_manifest(dir)? {
            Some(manifest) => {
                SnapshotStore::verify(dir, &manifest)?;
                if manifest.schema != backend.schema() {
                    warn!(
                        "Set was captured from schema {} but the session works in {}",
                        manifest.schema,
                        backend.schema()
                    );
                }
                true
            }
            None => {
                warn!("No manifest in {}; replaying unverified", dir.display());
                false
            }
        };

        self.begin(backend, BEGIN_RESTORE)
            .await
            .map_err(|e| AppError::Restore(e.to_string()))?;
        let replayed = self.replay_set(backend, &members).await;
        let mut summary = self.finish(backend, replayed).await?;
        summary.verified = verified;

        info!(
            "Restored {} snapshots from {} (dropped {} tables)",
            summary.replayed.len(),
            dir.display(),
            summary.dropped.len()
        );
        Ok(summary)
    }

    async fn replay_set<B>(&self, backend: &B, members: &[PathBuf]) -> Result<RestoreSummary, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let mut summary = RestoreSummary::default();
        let builder = SqlBuilder::new(backend.schema());

        let existing = backend
            .list_tables()
            .await
            .map_err(|e| AppError::Restore(format!("Error listing tables: {}", e)))?;
        for table in existing {
            let statement = format!("{};", builder.drop_table_if_exists(&table)?);
            backend
                .execute_script(&statement)
                .await
                .map_err(|e| AppError::Restore(format!("Error dropping {}: {}", table, e)))?;
            summary.dropped.push(table);
        }

        for path in members {
            let script = SnapshotStore::read_script(path)?;
            backend.execute_script(&script).await.map_err(|e| {
                AppError::Restore(format!("Error restoring {}: {}", path.display(), e))
            })?;
            summary.replayed.push(file_name(path));
        }
        Ok(summary)
    }

    async fn begin<B>(&self, backend: &B, statement: &str) -> Result<(), AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        match self.mode {
            SnapshotMode::Autocommit => Ok(()),
            SnapshotMode::Transactional => backend.execute_script(statement).await,
        }
    }

    /// Commit or roll back a transactional pass; pass-through otherwise.
    async fn finish<B, T>(&self, backend: &B, result: Result<T, AppError>) -> Result<T, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        if self.mode == SnapshotMode::Autocommit {
            return result;
        }
        match result {
            Ok(value) => {
                backend.execute_script(COMMIT).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = backend.execute_script(ROLLBACK).await {
                    warn!("Rollback after failed snapshot pass also failed: {}", rollback);
                }
                Err(e)
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
