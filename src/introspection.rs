//! Schema Introspection Module
//!
//! Lists tables, columns and primary keys of the working schema.
//!
//! Two flavours exist for each lookup. The plain ones feed UI population and
//! degrade to an empty list when the catalog query fails (logged, never
//! raised). The `try_` ones return the failure and are the only ones the
//! snapshot engine and the row/schema mutators are allowed to use.

use crate::db::queries::{LIST_COLUMNS, LIST_TABLES, PRIMARY_KEYS};
use crate::db::Session;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Column name plus declared type, in the store's column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Engine-native type expression, passed through verbatim
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Schema introspector for the session's working schema
pub struct Introspector;

impl Introspector {
    pub async fn try_list_tables(session: &Session) -> Result<Vec<String>, AppError> {
        let tables = session
            .query_strings(LIST_TABLES, &[Some(session.schema().to_string())])
            .await?;
        debug!("Tables in schema {}: {:?}", session.schema(), tables);
        Ok(tables)
    }

    pub async fn try_list_columns(session: &Session, table: &str) -> Result<Vec<ColumnDef>, AppError> {
        let rows = session
            .query_text(
                LIST_COLUMNS,
                &[Some(session.schema().to_string()), Some(table.to_string())],
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.as_slice() {
                [Some(name), Some(data_type)] => Some(ColumnDef::new(name.clone(), data_type.clone())),
                _ => None,
            })
            .collect())
    }

    pub async fn try_primary_key_columns(session: &Session, table: &str) -> Result<Vec<String>, AppError> {
        Ok(session
            .query_strings(
                PRIMARY_KEYS,
                &[Some(session.schema().to_string()), Some(table.to_string())],
            )
            .await?)
    }

    /// Columns of a table that must exist; an unknown table is `NotFound`.
    pub async fn require_columns(session: &Session, table: &str) -> Result<Vec<ColumnDef>, AppError> {
        let columns = Self::try_list_columns(session, table).await?;
        if columns.is_empty() {
            return Err(AppError::NotFound(format!(
                "Table '{}' not found in schema {}",
                table,
                session.schema()
            )));
        }
        Ok(columns)
    }

    pub async fn list_tables(session: &Session) -> Vec<String> {
        Self::try_list_tables(session).await.unwrap_or_else(|e| {
            warn!("Error getting tables: {}", e);
            Vec::new()
        })
    }

    pub async fn list_columns(session: &Session, table: &str) -> Vec<ColumnDef> {
        Self::try_list_columns(session, table).await.unwrap_or_else(|e| {
            warn!("Error getting columns for {}: {}", table, e);
            Vec::new()
        })
    }

    pub async fn primary_key_columns(session: &Session, table: &str) -> Vec<String> {
        Self::try_primary_key_columns(session, table)
            .await
            .unwrap_or_else(|e| {
                warn!("Error getting primary keys for {}: {}", table, e);
                Vec::new()
            })
    }
}
