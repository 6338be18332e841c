//! Shared fixtures for unit tests: an in-memory snapshot backend and
//! throwaway schemas on a live server.
//!
//! Live tests run only when `TEST_DATABASE_URL` is set; otherwise
//! [`live_session`] returns `None` and the test returns early.

use crate::config::Settings;
use crate::connection::connect;
use crate::db::Session;
use crate::error::AppError;
use crate::introspection::ColumnDef;
use crate::rows::RowSet;
use crate::snapshot::SnapshotBackend;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
struct FakeState {
    tables: BTreeMap<String, (Vec<ColumnDef>, RowSet)>,
    executed: Vec<String>,
    failing_fetch: Option<String>,
    failing_script: Option<String>,
}

/// Backend that serves fixed tables and records every script it is given
pub struct FakeBackend {
    schema: String,
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new(schema: &str) -> Self {
        Self {
            schema: schema.to_string(),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_table(self, name: &str, columns: &[(&str, &str)], rows: Vec<Vec<Option<&str>>>) -> Self {
        let defs: Vec<ColumnDef> = columns.iter().map(|(n, t)| ColumnDef::new(*n, *t)).collect();
        let data = RowSet {
            columns: defs.iter().map(|c| c.name.clone()).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(|v| v.map(str::to_string)).collect())
                .collect(),
        };
        self.state.lock().unwrap().tables.insert(name.to_string(), (defs, data));
        self
    }

    pub fn fail_fetch(self, table: &str) -> Self {
        self.state.lock().unwrap().failing_fetch = Some(table.to_string());
        self
    }

    /// Reject any script containing `needle`, the way a store rejects bad SQL
    pub fn fail_script_containing(self, needle: &str) -> Self {
        self.state.lock().unwrap().failing_script = Some(needle.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }
}

#[async_trait]
impl SnapshotBackend for FakeBackend {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        Ok(self.state.lock().unwrap().tables.keys().cloned().collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDef>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.tables.get(table).map(|(c, _)| c.clone()).unwrap_or_default())
    }

    async fn fetch_all(&self, table: &str) -> Result<RowSet, AppError> {
        let state = self.state.lock().unwrap();
        if state.failing_fetch.as_deref() == Some(table) {
            return Err(AppError::Query("connection reset by peer".to_string()));
        }
        state
            .tables
            .get(table)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| AppError::Query(format!("relation \"{}\" does not exist", table)))
    }

    async fn execute_script(&self, script: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(needle) = &state.failing_script {
            if script.contains(needle.as_str()) {
                return Err(AppError::Query("syntax error at end of input".to_string()));
            }
        }
        state.executed.push(script.to_string());
        Ok(())
    }
}

/// Connect to `TEST_DATABASE_URL` with a fresh schema named after `tag`.
pub async fn live_session(tag: &str) -> Option<Session> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let schema = format!("ga_test_{}_{}", tag, std::process::id());

    let settings = Settings::from_lookup(|key| match key {
        "DATABASE_URL" => Some(url.clone()),
        "DB_SCHEMA" => Some(schema.clone()),
        _ => None,
    })
    .expect("test settings");
    let session = connect(&settings.database)
        .await
        .expect("connect to TEST_DATABASE_URL");

    session
        .batch_execute(&format!(
            "DROP SCHEMA IF EXISTS {0} CASCADE; CREATE SCHEMA {0};",
            schema
        ))
        .await
        .expect("create test schema");
    Some(session)
}

pub async fn drop_schema(session: &Session) {
    session
        .batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", session.schema()))
        .await
        .expect("drop test schema");
}
