//! Schema Mutator
//!
//! Structural changes to tables of the working schema. Every statement is
//! durable when it returns. Dropping a table always snapshots it first and
//! refuses to drop when the snapshot cannot be written.

use crate::db::queries::SqlBuilder;
use crate::db::Session;
use crate::error::AppError;
use crate::introspection::ColumnDef;
use crate::snapshot::{SnapshotBackend, SnapshotEngine};
use std::path::PathBuf;
use tracing::{info, warn};

pub struct SchemaMutator;

impl SchemaMutator {
    pub async fn create_table(session: &Session, table: &str, columns: &[ColumnDef]) -> Result<(), AppError> {
        if columns.is_empty() {
            return Err(AppError::Validation(
                "A table needs at least one column".to_string(),
            ));
        }
        for column in columns {
            validate_type_expression(&column.data_type)?;
        }

        let sql = SqlBuilder::new(session.schema()).create_table(table, columns)?;
        run_ddl(session, &sql).await?;
        info!("Created table {} with {} columns", table, columns.len());
        Ok(())
    }

    /// Snapshot `table`, then drop it with CASCADE. Returns the snapshot path.
    pub async fn drop_table<B>(backend: &B, engine: &SnapshotEngine, table: &str) -> Result<PathBuf, AppError>
    where
        B: SnapshotBackend + ?Sized,
    {
        let sql = SqlBuilder::new(backend.schema()).drop_table(table)?;

        let snapshot = engine.snapshot_table(backend, table).await.map_err(|e| {
            warn!("Not dropping {}: snapshot failed: {}", table, e);
            e
        })?;

        backend
            .execute_script(&sql)
            .await
            .map_err(|e| AppError::Ddl {
                message: match e {
                    AppError::Query(message) => message,
                    other => other.to_string(),
                },
                statement: sql.clone(),
            })?;

        info!("Dropped table {} (snapshot at {})", table, snapshot.display());
        Ok(snapshot)
    }

    pub async fn rename_table(session: &Session, old: &str, new: &str) -> Result<(), AppError> {
        let sql = SqlBuilder::new(session.schema()).rename_table(old, new)?;
        run_ddl(session, &sql).await?;
        info!("Renamed table {} to {}", old, new);
        Ok(())
    }

    pub async fn add_column(session: &Session, table: &str, column: &ColumnDef) -> Result<(), AppError> {
        validate_type_expression(&column.data_type)?;
        let sql = SqlBuilder::new(session.schema()).add_column(table, column)?;
        run_ddl(session, &sql).await?;
        info!("Added column {} {} to {}", column.name, column.data_type, table);
        Ok(())
    }

    pub async fn drop_column(session: &Session, table: &str, column: &str) -> Result<(), AppError> {
        let sql = SqlBuilder::new(session.schema()).drop_column(table, column)?;
        run_ddl(session, &sql).await?;
        info!("Dropped column {} from {}", column, table);
        Ok(())
    }

    pub async fn rename_column(session: &Session, table: &str, old: &str, new: &str) -> Result<(), AppError> {
        let sql = SqlBuilder::new(session.schema()).rename_column(table, old, new)?;
        run_ddl(session, &sql).await?;
        info!("Renamed column {}.{} to {}", table, old, new);
        Ok(())
    }

    /// Existing values are converted by the store's default cast; a value
    /// that cannot be converted fails the whole statement.
    pub async fn change_column_type(
        session: &Session,
        table: &str,
        column: &str,
        new_type: &str,
    ) -> Result<(), AppError> {
        validate_type_expression(new_type)?;
        let sql = SqlBuilder::new(session.schema()).change_column_type(table, column, new_type)?;
        run_ddl(session, &sql).await?;
        info!("Changed type of {}.{} to {}", table, column, new_type);
        Ok(())
    }
}

async fn run_ddl(session: &Session, sql: &str) -> Result<(), AppError> {
    session
        .batch_execute(sql)
        .await
        .map_err(|e| AppError::ddl(sql, e))
}

/// Type expressions are passed through as written, so they must stay a
/// single type expression and not smuggle in another statement.
fn validate_type_expression(expr: &str) -> Result<(), AppError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Column type is empty".to_string()));
    }
    if trimmed.contains(';') || trimmed.contains("--") || trimmed.contains("/*") {
        return Err(AppError::Validation(format!(
            "Column type '{}' is not a single type expression",
            expr
        )));
    }
    Ok(())
}
