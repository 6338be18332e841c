//! Database session
//!
//! One `Session` owns the process's only connection together with the
//! working schema. It is passed explicitly to every operation; nothing about
//! the current connection lives in globals.

pub mod identifier;
pub mod queries;

use crate::connection::SessionInfo;
use crate::rows::{Row, RowSet};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, SimpleQueryMessage};
use tracing::debug;

pub struct Session {
    client: Client,
    info: SessionInfo,
}

impl Session {
    pub fn new(client: Client, info: SessionInfo) -> Self {
        Self { client, info }
    }

    /// Working schema every table lives in
    pub fn schema(&self) -> &str {
        &self.info.schema
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Run a parameterized query whose result columns are all text.
    pub async fn query_text(
        &self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        debug!("query: {}", sql.trim());
        let rows = self.client.query(sql, &bind(params)).await?;
        rows.iter()
            .map(|row| (0..row.len()).map(|i| row.try_get::<_, Option<String>>(i)).collect())
            .collect()
    }

    /// First column of a text query, NULLs skipped
    pub async fn query_strings(
        &self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<Vec<String>, tokio_postgres::Error> {
        let rows = self.query_text(sql, params).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| if row.is_empty() { None } else { row.swap_remove(0) })
            .collect())
    }

    /// Execute one parameterized statement, returning rows affected.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<u64, tokio_postgres::Error> {
        debug!("execute: {} ({} params)", sql, params.len());
        self.client.execute(sql, &bind(params)).await
    }

    /// Run a script of one or more statements over the simple protocol.
    pub async fn batch_execute(&self, script: &str) -> Result<(), tokio_postgres::Error> {
        debug!("batch: {} bytes", script.len());
        self.client.batch_execute(script).await
    }

    /// Run unparameterized SQL and collect its last result set as text.
    ///
    /// The simple protocol reports every value in its text form, which is
    /// exactly what snapshot literals and CSV export need.
    pub async fn simple_rows(&self, sql: &str) -> Result<RowSet, tokio_postgres::Error> {
        debug!("simple: {}", sql);
        let messages = self.client.simple_query(sql).await?;

        let mut result = RowSet::default();
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(columns) => {
                    result = RowSet {
                        columns: columns.iter().map(|c| c.name().to_string()).collect(),
                        rows: Vec::new(),
                    };
                }
                SimpleQueryMessage::Row(row) => {
                    if result.columns.is_empty() {
                        result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    result
                        .rows
                        .push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

fn bind(params: &[Option<String>]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}
