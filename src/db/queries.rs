//! SQL query constants and builders
//!
//! Catalog queries take the working schema as `$1` and, where relevant, the
//! table name as `$2`. Every result column is cast to text so the session
//! can read it uniformly.

use super::identifier::{qualify, quote_ident};
use crate::error::AppError;
use crate::introspection::ColumnDef;

/// Base and partitioned tables of the working schema
pub const LIST_TABLES: &str = r#"
    SELECT c.relname::text
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
        AND c.relkind IN ('r', 'p')
    ORDER BY c.relname
"#;

/// Column name and full declared type (`numeric(10,2)`, `integer[]`, ...)
pub const LIST_COLUMNS: &str = r#"
    SELECT a.attname::text, pg_catalog.format_type(a.atttypid, a.atttypmod)
    FROM pg_catalog.pg_attribute a
    JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
        AND c.relname = $2
        AND a.attnum > 0
        AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

/// Primary key columns in key order
pub const PRIMARY_KEYS: &str = r#"
    SELECT a.attname::text
    FROM pg_catalog.pg_index i
    JOIN pg_catalog.pg_class c ON c.oid = i.indrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_catalog.pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
    WHERE n.nspname = $1
        AND c.relname = $2
        AND i.indisprimary
    ORDER BY array_position(i.indkey::int2[], a.attnum)
"#;

/// Statement text builder. Identifiers are quoted here and nowhere else;
/// values never appear in the output, only `$n` placeholders.
pub struct SqlBuilder<'a> {
    schema: &'a str,
}

impl<'a> SqlBuilder<'a> {
    pub fn new(schema: &'a str) -> Self {
        Self { schema }
    }

    fn table(&self, name: &str) -> Result<String, AppError> {
        qualify(self.schema, name)
    }

    /// `SELECT * FROM schema."t"`
    pub fn select_all(&self, table: &str) -> Result<String, AppError> {
        Ok(format!("SELECT * FROM {}", self.table(table)?))
    }

    /// Insert with each value bound as text and cast to its column type
    pub fn insert(&self, table: &str, columns: &[ColumnDef]) -> Result<String, AppError> {
        let names = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Result<Vec<_>, _>>()?;
        let values: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| cast_param(i + 1, &c.data_type))
            .collect();

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(table)?,
            names.join(", "),
            values.join(", ")
        ))
    }

    /// Update; SET parameters come first, predicate parameters follow
    pub fn update(
        &self,
        table: &str,
        columns: &[ColumnDef],
        predicate_columns: &[String],
    ) -> Result<String, AppError> {
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, c)| Ok(format!("{} = {}", quote_ident(&c.name)?, cast_param(i + 1, &c.data_type))))
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(format!(
            "UPDATE {} SET {} WHERE {}",
            self.table(table)?,
            assignments.join(", "),
            where_clause(predicate_columns, columns.len() + 1)?
        ))
    }

    pub fn delete(&self, table: &str, predicate_columns: &[String]) -> Result<String, AppError> {
        Ok(format!(
            "DELETE FROM {} WHERE {}",
            self.table(table)?,
            where_clause(predicate_columns, 1)?
        ))
    }

    pub fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<String, AppError> {
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.table(table)?,
            column_defs(columns)?
        ))
    }

    pub fn drop_table(&self, table: &str) -> Result<String, AppError> {
        Ok(format!("DROP TABLE {} CASCADE", self.table(table)?))
    }

    pub fn drop_table_if_exists(&self, table: &str) -> Result<String, AppError> {
        Ok(format!("DROP TABLE IF EXISTS {} CASCADE", self.table(table)?))
    }

    pub fn rename_table(&self, old: &str, new: &str) -> Result<String, AppError> {
        Ok(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.table(old)?,
            quote_ident(new)?
        ))
    }

    pub fn add_column(&self, table: &str, column: &ColumnDef) -> Result<String, AppError> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.table(table)?,
            quote_ident(&column.name)?,
            column.data_type
        ))
    }

    pub fn drop_column(&self, table: &str, column: &str) -> Result<String, AppError> {
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.table(table)?,
            quote_ident(column)?
        ))
    }

    pub fn rename_column(&self, table: &str, old: &str, new: &str) -> Result<String, AppError> {
        Ok(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.table(table)?,
            quote_ident(old)?,
            quote_ident(new)?
        ))
    }

    pub fn change_column_type(
        &self,
        table: &str,
        column: &str,
        new_type: &str,
    ) -> Result<String, AppError> {
        Ok(format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
            self.table(table)?,
            quote_ident(column)?,
            new_type
        ))
    }
}

/// `"a" integer, "b" text`; declared types pass through verbatim
pub fn column_defs(columns: &[ColumnDef]) -> Result<String, AppError> {
    let defs = columns
        .iter()
        .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, c.data_type)))
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(defs.join(", "))
}

fn cast_param(n: usize, data_type: &str) -> String {
    format!("CAST(${}::text AS {})", n, data_type)
}

/// Text comparison against values as `fetch_all` reported them; NULL
/// matches NULL.
fn where_clause(columns: &[String], first_param: usize) -> Result<String, AppError> {
    if columns.is_empty() {
        return Err(AppError::Validation(
            "A predicate needs at least one condition".to_string(),
        ));
    }
    let conditions = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            Ok(format!(
                "{}::text IS NOT DISTINCT FROM ${}::text",
                quote_ident(c)?,
                first_param + i
            ))
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(conditions.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn product_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("id", "integer"),
            ColumnDef::new("name", "text"),
            ColumnDef::new("price", "numeric"),
        ]
    }

    #[test]
    fn test_insert_binds_every_value() {
        let sql = SqlBuilder::new("grocery")
            .insert("Product", &product_columns())
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO grocery.\"Product\" (\"id\", \"name\", \"price\") VALUES \
             (CAST($1::text AS integer), CAST($2::text AS text), CAST($3::text AS numeric))"
        );
    }

    #[test]
    fn test_update_numbers_predicate_after_assignments() {
        let columns = vec![ColumnDef::new("price", "numeric")];
        let sql = SqlBuilder::new("grocery")
            .update("Product", &columns, &["id".to_string(), "name".to_string()])
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE grocery.\"Product\" SET \"price\" = CAST($1::text AS numeric) WHERE \
             \"id\"::text IS NOT DISTINCT FROM $2::text AND \"name\"::text IS NOT DISTINCT FROM $3::text"
        );
    }

    #[test]
    fn test_delete_requires_predicate() {
        let builder = SqlBuilder::new("grocery");
        assert!(matches!(
            builder.delete("Product", &[]),
            Err(AppError::Validation(_))
        ));
        assert_eq!(
            builder.delete("Товар", &["id".to_string()]).unwrap(),
            "DELETE FROM grocery.\"Товар\" WHERE \"id\"::text IS NOT DISTINCT FROM $1::text"
        );
    }

    #[test]
    fn test_ddl_statements() {
        let b = SqlBuilder::new("grocery");
        assert_eq!(
            b.create_table("Product", &product_columns()).unwrap(),
            "CREATE TABLE grocery.\"Product\" (\"id\" integer, \"name\" text, \"price\" numeric)"
        );
        assert_eq!(b.drop_table("Product").unwrap(), "DROP TABLE grocery.\"Product\" CASCADE");
        assert_eq!(
            b.rename_table("Product", "Товар").unwrap(),
            "ALTER TABLE grocery.\"Product\" RENAME TO \"Товар\""
        );
        assert_eq!(
            b.add_column("Product", &ColumnDef::new("stock", "integer")).unwrap(),
            "ALTER TABLE grocery.\"Product\" ADD COLUMN \"stock\" integer"
        );
        assert_eq!(
            b.drop_column("Product", "stock").unwrap(),
            "ALTER TABLE grocery.\"Product\" DROP COLUMN \"stock\""
        );
        assert_eq!(
            b.rename_column("Product", "name", "title").unwrap(),
            "ALTER TABLE grocery.\"Product\" RENAME COLUMN \"name\" TO \"title\""
        );
        assert_eq!(
            b.change_column_type("Product", "price", "numeric(10,2)").unwrap(),
            "ALTER TABLE grocery.\"Product\" ALTER COLUMN \"price\" TYPE numeric(10,2)"
        );
    }
}
