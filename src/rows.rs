//! Row Access Layer
//!
//! Fetch, insert, update and delete rows of a named table. Values travel in
//! their text form and are always bound as parameters; column names are
//! checked against the table's live column list before they reach SQL.

use crate::db::identifier::ensure_known_columns;
use crate::db::queries::SqlBuilder;
use crate::db::Session;
use crate::error::AppError;
use crate::introspection::{ColumnDef, Introspector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One row, positionally aligned with the column list it was read with.
/// `None` is SQL NULL.
pub type Row = Vec<Option<String>>;

/// Rows plus the column names they align with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// One equality condition; a `None` value matches NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub value: Option<String>,
}

/// Conjunction of equality conditions selecting the rows to touch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate {
    pub conditions: Vec<Condition>,
}

impl Predicate {
    #[cfg(test)]
    pub fn eq(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            value: value.map(str::to_string),
        });
        self
    }

    /// Identify a displayed row: by its primary key when the table has one,
    /// otherwise by the whole value tuple.
    pub fn identify(columns: &[String], row: &Row, primary_keys: &[String]) -> Self {
        let conditions = columns
            .iter()
            .zip(row.iter())
            .filter(|(name, _)| primary_keys.is_empty() || primary_keys.contains(name))
            .map(|(name, value)| Condition {
                column: name.clone(),
                value: value.clone(),
            })
            .collect();
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn columns(&self) -> Vec<String> {
        self.conditions.iter().map(|c| c.column.clone()).collect()
    }

    fn values(&self) -> impl Iterator<Item = Option<String>> + '_ {
        self.conditions.iter().map(|c| c.value.clone())
    }
}

/// How a client picks the rows to update or delete: an explicit predicate,
/// or a row exactly as `fetch_all` returned it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowTarget {
    Predicate(Predicate),
    Row(Row),
}

/// Result of an update. Zero matched rows is a soft failure, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "rowsAffected", rename_all = "camelCase")]
pub enum UpdateOutcome {
    NoRowsMatched,
    Updated(u64),
}

impl UpdateOutcome {
    pub fn rows_affected(&self) -> u64 {
        match self {
            UpdateOutcome::NoRowsMatched => 0,
            UpdateOutcome::Updated(n) => *n,
        }
    }

    /// More than one row changed; the caller should warn, not block.
    pub fn is_multi_row(&self) -> bool {
        self.rows_affected() > 1
    }

    pub fn message(&self) -> String {
        match self {
            UpdateOutcome::NoRowsMatched => "No rows matched the update condition".to_string(),
            UpdateOutcome::Updated(1) => "Updated 1 row".to_string(),
            UpdateOutcome::Updated(n) => {
                format!("Updated {} rows. Multiple rows matched the condition.", n)
            }
        }
    }
}

pub struct RowAccess;

impl RowAccess {
    /// All rows of a table in their text form.
    pub async fn try_fetch_all(session: &Session, table: &str) -> Result<RowSet, AppError> {
        let sql = SqlBuilder::new(session.schema()).select_all(table)?;
        let result = session.simple_rows(&sql).await?;
        debug!("Column names for {}: {:?}", table, result.columns);
        Ok(result)
    }

    /// UI variant: a failed read shows as an empty grid.
    pub async fn fetch_all(session: &Session, table: &str) -> RowSet {
        Self::try_fetch_all(session, table).await.unwrap_or_else(|e| {
            warn!("Error getting table data for {}: {}", table, e);
            RowSet::default()
        })
    }

    pub async fn insert(
        session: &Session,
        table: &str,
        columns: &[String],
        values: &[Option<String>],
    ) -> Result<(), AppError> {
        if columns.is_empty() {
            return Err(AppError::Validation("Insert needs at least one column".to_string()));
        }
        if columns.len() != values.len() {
            return Err(AppError::Validation(format!(
                "Got {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }

        let targets = Self::resolve(session, table, columns, &[]).await?;
        let sql = SqlBuilder::new(session.schema()).insert(table, &targets)?;
        session.execute(&sql, values).await?;

        info!("Inserted a row into {}", table);
        Ok(())
    }

    pub async fn update_where(
        session: &Session,
        table: &str,
        columns: &[String],
        new_values: &[Option<String>],
        predicate: &Predicate,
    ) -> Result<UpdateOutcome, AppError> {
        if columns.is_empty() {
            return Err(AppError::Validation("Update needs at least one column".to_string()));
        }
        if columns.len() != new_values.len() {
            return Err(AppError::Validation(format!(
                "Got {} values for {} columns",
                new_values.len(),
                columns.len()
            )));
        }
        if predicate.is_empty() {
            return Err(AppError::Validation("Update needs a row predicate".to_string()));
        }

        let predicate_columns = predicate.columns();
        let targets = Self::resolve(session, table, columns, &predicate_columns).await?;
        let sql = SqlBuilder::new(session.schema()).update(table, &targets, &predicate_columns)?;

        let params: Vec<Option<String>> = new_values
            .iter()
            .cloned()
            .chain(predicate.values())
            .collect();
        let affected = session.execute(&sql, &params).await?;

        if affected == 0 {
            warn!("No rows updated for table {}", table);
            return Ok(UpdateOutcome::NoRowsMatched);
        }
        debug!("Updated {} rows in {}", affected, table);
        Ok(UpdateOutcome::Updated(affected))
    }

    pub async fn delete_where(
        session: &Session,
        table: &str,
        predicate: &Predicate,
    ) -> Result<u64, AppError> {
        if predicate.is_empty() {
            return Err(AppError::Validation("Delete needs a row predicate".to_string()));
        }

        let predicate_columns = predicate.columns();
        Self::resolve(session, table, &[], &predicate_columns).await?;
        let sql = SqlBuilder::new(session.schema()).delete(table, &predicate_columns)?;

        let params: Vec<Option<String>> = predicate.values().collect();
        let deleted = session.execute(&sql, &params).await?;

        info!("Deleted {} rows from {}", deleted, table);
        Ok(deleted)
    }

    /// Predicate for a target; a displayed row is matched by primary key,
    /// or by every value when the table has none.
    pub async fn predicate_for(
        session: &Session,
        table: &str,
        target: RowTarget,
    ) -> Result<Predicate, AppError> {
        match target {
            RowTarget::Predicate(predicate) => Ok(predicate),
            RowTarget::Row(row) => {
                let columns: Vec<String> = Introspector::require_columns(session, table)
                    .await?
                    .into_iter()
                    .map(|c| c.name)
                    .collect();
                if row.len() != columns.len() {
                    return Err(AppError::Validation(format!(
                        "Row has {} values but '{}' has {} columns",
                        row.len(),
                        table,
                        columns.len()
                    )));
                }
                let primary_keys = Introspector::try_primary_key_columns(session, table).await?;
                Ok(Predicate::identify(&columns, &row, &primary_keys))
            }
        }
    }

    /// Run caller-written SQL (canned or custom analytical queries).
    pub async fn run_query(session: &Session, sql: &str) -> Result<RowSet, AppError> {
        if sql.trim().is_empty() {
            return Err(AppError::Validation("Query text is empty".to_string()));
        }
        Ok(session.simple_rows(sql).await?)
    }

    /// Look up the declared types of `columns`, rejecting any name (in
    /// either list) the table does not have.
    async fn resolve(
        session: &Session,
        table: &str,
        columns: &[String],
        predicate_columns: &[String],
    ) -> Result<Vec<ColumnDef>, AppError> {
        let known = Introspector::require_columns(session, table).await?;
        let names: Vec<String> = known.iter().map(|c| c.name.clone()).collect();
        ensure_known_columns(table, &names, columns.iter().chain(predicate_columns))?;

        Ok(columns
            .iter()
            .filter_map(|name| known.iter().find(|c| &c.name == name).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["id".to_string(), "name".to_string(), "price".to_string()]
    }

    #[test]
    fn test_identify_by_primary_key() {
        let row = vec![Some("2".to_string()), Some("Bread".to_string()), None];
        let predicate = Predicate::identify(&columns(), &row, &["id".to_string()]);
        assert_eq!(predicate, Predicate::default().eq("id", Some("2")));
    }

    #[test]
    fn test_identify_without_key_uses_full_tuple() {
        let row = vec![Some("2".to_string()), Some("Bread".to_string()), None];
        let predicate = Predicate::identify(&columns(), &row, &[]);
        assert_eq!(
            predicate,
            Predicate::default()
                .eq("id", Some("2"))
                .eq("name", Some("Bread"))
                .eq("price", None)
        );
    }

    #[test]
    fn test_update_outcome_reporting() {
        assert_eq!(UpdateOutcome::NoRowsMatched.rows_affected(), 0);
        assert_eq!(
            UpdateOutcome::NoRowsMatched.message(),
            "No rows matched the update condition"
        );
        assert!(!UpdateOutcome::Updated(1).is_multi_row());
        assert!(UpdateOutcome::Updated(3).is_multi_row());
        assert_eq!(UpdateOutcome::Updated(3).rows_affected(), 3);
    }

    #[test]
    fn test_row_target_forms() {
        let by_row: RowTarget = serde_json::from_str(r#"{"row":["2","Bread",null]}"#).unwrap();
        assert_eq!(
            by_row,
            RowTarget::Row(vec![Some("2".to_string()), Some("Bread".to_string()), None])
        );
        let by_predicate: RowTarget =
            serde_json::from_str(r#"{"predicate":[{"column":"id","value":"2"}]}"#).unwrap();
        assert_eq!(by_predicate, RowTarget::Predicate(Predicate::default().eq("id", Some("2"))));
    }

    #[test]
    fn test_predicate_deserializes_from_condition_list() {
        let predicate: Predicate =
            serde_json::from_str(r#"[{"column":"id","value":"1"},{"column":"note","value":null}]"#)
                .unwrap();
        assert_eq!(predicate, Predicate::default().eq("id", Some("1")).eq("note", None));
    }

    mod live {
        use super::*;
        use crate::test_support::{drop_schema, live_session};

        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        fn text(list: &[Option<&str>]) -> Vec<Option<String>> {
            list.iter().map(|v| v.map(str::to_string)).collect()
        }

        async fn seed(session: &Session) {
            session
                .batch_execute(&format!(
                    "CREATE TABLE {}.\"Product\" (id int, name text, price numeric)",
                    session.schema()
                ))
                .await
                .unwrap();
            for row in [
                [Some("1"), Some("Milk"), Some("2.5")],
                [Some("2"), Some("Bread"), None],
                [Some("3"), Some("Bread"), Some("1")],
            ] {
                RowAccess::insert(session, "Product", &names(&["id", "name", "price"]), &text(&row))
                    .await
                    .unwrap();
            }
        }

        #[tokio::test]
        async fn test_update_reports_zero_one_and_many() {
            let Some(session) = live_session("updates").await else { return };
            seed(&session).await;
            let price = names(&["price"]);

            let none = RowAccess::update_where(
                &session,
                "Product",
                &price,
                &text(&[Some("9")]),
                &Predicate::default().eq("id", Some("42")),
            )
            .await
            .unwrap();
            assert_eq!(none, UpdateOutcome::NoRowsMatched);

            let one = RowAccess::update_where(
                &session,
                "Product",
                &price,
                &text(&[Some("3.1")]),
                &Predicate::default().eq("id", Some("1")),
            )
            .await
            .unwrap();
            assert_eq!(one, UpdateOutcome::Updated(1));

            let many = RowAccess::update_where(
                &session,
                "Product",
                &price,
                &text(&[None]),
                &Predicate::default().eq("name", Some("Bread")),
            )
            .await
            .unwrap();
            assert_eq!(many, UpdateOutcome::Updated(2));
            assert!(many.is_multi_row());

            let rows = RowAccess::try_fetch_all(&session, "Product").await.unwrap();
            let milk = rows.rows.iter().find(|r| r[0].as_deref() == Some("1")).unwrap();
            assert_eq!(milk[2].as_deref(), Some("3.1"));
            drop_schema(&session).await;
        }

        #[tokio::test]
        async fn test_delete_by_displayed_row_matches_nulls() {
            let Some(session) = live_session("deletes").await else { return };
            seed(&session).await;

            let predicate = RowAccess::predicate_for(
                &session,
                "Product",
                RowTarget::Row(text(&[Some("2"), Some("Bread"), None])),
            )
            .await
            .unwrap();
            let deleted = RowAccess::delete_where(&session, "Product", &predicate).await.unwrap();
            assert_eq!(deleted, 1);

            let rows = RowAccess::try_fetch_all(&session, "Product").await.unwrap();
            assert_eq!(rows.rows.len(), 2);
            drop_schema(&session).await;
        }

        #[tokio::test]
        async fn test_unknown_column_and_hostile_values_are_safe() {
            let Some(session) = live_session("hostile").await else { return };
            seed(&session).await;

            let unknown = RowAccess::insert(
                &session,
                "Product",
                &names(&["id\"; DROP TABLE x; --"]),
                &text(&[Some("1")]),
            )
            .await;
            assert!(matches!(unknown, Err(AppError::Validation(_))));

            RowAccess::insert(
                &session,
                "Product",
                &names(&["id", "name"]),
                &text(&[Some("4"), Some("'); DROP TABLE grocery; --")]),
            )
            .await
            .unwrap();
            let rows = RowAccess::try_fetch_all(&session, "Product").await.unwrap();
            assert_eq!(rows.rows.len(), 4);
            drop_schema(&session).await;
        }

        #[tokio::test]
        async fn test_empty_predicate_is_rejected() {
            let Some(session) = live_session("emptypred").await else { return };
            seed(&session).await;
            let result = RowAccess::delete_where(&session, "Product", &Predicate::default()).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
            drop_schema(&session).await;
        }
    }
}
