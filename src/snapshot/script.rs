//! Snapshot script rendering
//!
//! A snapshot is plain SQL, in this order:
//!
//! ```text
//! DROP TABLE IF EXISTS grocery."Product" CASCADE;
//! CREATE TABLE grocery."Product" ("id" integer, "name" text, "price" numeric);
//! INSERT INTO grocery."Product" ("id","name","price") VALUES
//! ('1', 'Milk', '2.5'),
//! ('2', 'Bread', NULL);
//! ```
//!
//! Drop precedes create and create precedes insert, so replaying the same
//! file twice, or onto a schema that still has the table, converges on the
//! captured state. The insert is omitted for an empty table. A table with
//! no columns renders as `CREATE TABLE .. ()` and one `DEFAULT VALUES`
//! insert per row.

use crate::db::identifier::{quote_ident, quote_literal};
use crate::db::queries::SqlBuilder;
use crate::error::AppError;
use crate::introspection::ColumnDef;
use crate::rows::RowSet;

/// Captured structure and contents of one table
#[derive(Debug, Clone)]
pub struct SnapshotScript {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub data: RowSet,
}

impl SnapshotScript {
    pub fn row_count(&self) -> usize {
        self.data.rows.len()
    }

    pub fn render(&self) -> Result<String, AppError> {
        let builder = SqlBuilder::new(&self.schema);
        let mut script = String::new();

        script.push_str(&builder.drop_table_if_exists(&self.table)?);
        script.push_str(";\n");
        script.push_str(&builder.create_table(&self.table, &self.columns)?);
        script.push_str(";\n");

        if let Some(insert) = self.render_insert()? {
            script.push_str(&insert);
            script.push('\n');
        }

        Ok(script)
    }

    /// One multi-row INSERT carrying every cell as a literal.
    fn render_insert(&self) -> Result<Option<String>, AppError> {
        if self.data.rows.is_empty() {
            return Ok(None);
        }

        let table = format!("{}.{}", self.schema, quote_ident(&self.table)?);
        if self.columns.is_empty() {
            let rows: Vec<String> = self
                .data
                .rows
                .iter()
                .map(|_| format!("INSERT INTO {} DEFAULT VALUES;", table))
                .collect();
            return Ok(Some(rows.join("\n")));
        }

        let columns = self
            .data
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(",");

        let tuples: Vec<String> = self
            .data
            .rows
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(|v| quote_literal(v.as_deref())).collect();
                format!("({})", values.join(", "))
            })
            .collect();

        Ok(Some(format!(
            "INSERT INTO {} ({}) VALUES\n{};",
            table,
            columns,
            tuples.join(",\n")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn product(rows: Vec<Vec<Option<&str>>>) -> SnapshotScript {
        SnapshotScript {
            schema: "grocery".to_string(),
            table: "Product".to_string(),
            columns: vec![
                ColumnDef::new("id", "integer"),
                ColumnDef::new("name", "text"),
                ColumnDef::new("price", "numeric"),
            ],
            data: RowSet {
                columns: vec!["id".into(), "name".into(), "price".into()],
                rows: rows
                    .into_iter()
                    .map(|r| r.into_iter().map(|v| v.map(str::to_string)).collect())
                    .collect(),
            },
        }
    }

    #[test]
    fn test_product_snapshot_layout() {
        let script = product(vec![
            vec![Some("1"), Some("Milk"), Some("2.5")],
            vec![Some("2"), Some("Bread"), None],
        ]);

        assert_eq!(
            script.render().unwrap(),
            "DROP TABLE IF EXISTS grocery.\"Product\" CASCADE;\n\
             CREATE TABLE grocery.\"Product\" (\"id\" integer, \"name\" text, \"price\" numeric);\n\
             INSERT INTO grocery.\"Product\" (\"id\",\"name\",\"price\") VALUES\n\
             ('1', 'Milk', '2.5'),\n\
             ('2', 'Bread', NULL);\n"
        );
    }

    #[test]
    fn test_null_is_literal_not_placeholder() {
        let rendered = product(vec![vec![Some("2"), Some("Bread"), None]])
            .render()
            .unwrap();
        let insert = rendered.lines().last().unwrap();
        assert!(insert.ends_with("('2', 'Bread', NULL);"));
        assert!(!rendered.contains('$'));
    }

    #[test]
    fn test_empty_table_has_no_insert() {
        let script = product(vec![]);
        let rendered = script.render().unwrap();
        assert_eq!(rendered.lines().count(), 2);
        assert!(!rendered.contains("INSERT"));
        assert_eq!(script.row_count(), 0);
    }

    #[test]
    fn test_table_without_columns() {
        let script = SnapshotScript {
            schema: "grocery".to_string(),
            table: "Empty".to_string(),
            columns: vec![],
            data: RowSet {
                columns: vec![],
                rows: vec![vec![], vec![]],
            },
        };

        assert_eq!(
            script.render().unwrap(),
            "DROP TABLE IF EXISTS grocery.\"Empty\" CASCADE;\n\
             CREATE TABLE grocery.\"Empty\" ();\n\
             INSERT INTO grocery.\"Empty\" DEFAULT VALUES;\n\
             INSERT INTO grocery.\"Empty\" DEFAULT VALUES;\n"
        );
    }

    #[test]
    fn test_statement_order() {
        let rendered = product(vec![vec![Some("1"), Some("Milk"), Some("2.5")]])
            .render()
            .unwrap();
        let drop = rendered.find("DROP TABLE").unwrap();
        let create = rendered.find("CREATE TABLE").unwrap();
        let insert = rendered.find("INSERT INTO").unwrap();
        assert!(drop < create && create < insert);
    }

    #[test]
    fn test_values_are_escaped() {
        let script = SnapshotScript {
            schema: "grocery".to_string(),
            table: "Поставщик".to_string(),
            columns: vec![ColumnDef::new("название", "character varying(100)")],
            data: RowSet {
                columns: vec!["название".into()],
                rows: vec![vec![Some("ООО \"Ромашка\" O'Neil".into())], vec![Some(String::new())]],
            },
        };

        assert_eq!(
            script.render().unwrap(),
            "DROP TABLE IF EXISTS grocery.\"Поставщик\" CASCADE;\n\
             CREATE TABLE grocery.\"Поставщик\" (\"название\" character varying(100));\n\
             INSERT INTO grocery.\"Поставщик\" (\"название\") VALUES\n\
             ('ООО \"Ромашка\" O''Neil'),\n\
             ('');\n"
        );
    }
}
