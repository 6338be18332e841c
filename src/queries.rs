//! Query catalog
//!
//! Canned analytical queries over the grocery schema, grouped by lab, plus
//! user-defined queries persisted to a JSON file as `[[name, sql], ...]`.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CUSTOM_GROUP: &str = "Custom";

/// `{schema}` is replaced with the working schema when listed
const CANNED: &[(&str, &[(&str, &str)])] = &[
    (
        "Lab 4",
        &[
            (
                "Employees with >10 years experience",
                r#"SELECT * FROM {schema}."Сотрудник" WHERE experience > 10"#,
            ),
            (
                "Employees with >5 years experience sorted",
                r#"SELECT * FROM {schema}."Сотрудник" WHERE experience > 5 ORDER BY full_name"#,
            ),
            (
                "All products sorted by price",
                r#"SELECT * FROM {schema}."Товар" ORDER BY price"#,
            ),
            ("All suppliers", r#"SELECT * FROM {schema}."Поставщик""#),
            (
                "Meat warehouses",
                r#"SELECT * FROM {schema}."Склад" WHERE storage_location = 'Мясной склад'"#,
            ),
        ],
    ),
    (
        "Lab 5",
        &[
            (
                "Average product price",
                r#"SELECT AVG(price) AS average_price FROM {schema}."Товар""#,
            ),
            (
                "Count of sellers",
                r#"SELECT COUNT(position) FROM {schema}."Сотрудник" WHERE position LIKE '%продавец'"#,
            ),
            (
                "Max warehouse temperature",
                r#"SELECT MAX(temperature) AS max_temperature FROM {schema}."Склад""#,
            ),
            (
                "Minimum order amount",
                r#"SELECT MIN(total_cost) AS min_total_cost FROM {schema}."Заказ""#,
            ),
            (
                "Total product quantity",
                r#"SELECT SUM(product_quantity) AS total_product_quantity FROM {schema}."Склад""#,
            ),
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedQuery {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryGroup {
    pub name: String,
    pub editable: bool,
    pub queries: Vec<NamedQuery>,
}

pub struct QueryCatalog {
    path: PathBuf,
    schema: String,
    custom: Vec<(String, String)>,
}

impl QueryCatalog {
    /// Load custom queries from `path`; a missing file means none yet.
    pub fn load(path: impl Into<PathBuf>, schema: &str) -> Result<Self, AppError> {
        let path = path.into();
        let custom: Vec<(String, String)> = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str(&json).map_err(|e| {
                AppError::Config(format!("Corrupt custom query file {}: {}", path.display(), e))
            })?
        } else {
            Vec::new()
        };

        debug!("Loaded {} custom queries from {}", custom.len(), path.display());
        Ok(Self {
            path,
            schema: schema.to_string(),
            custom,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Canned groups in fixed order, then the custom group.
    pub fn groups(&self) -> Vec<QueryGroup> {
        let mut groups: Vec<QueryGroup> = CANNED
            .iter()
            .map(|(group, queries)| QueryGroup {
                name: group.to_string(),
                editable: false,
                queries: queries
                    .iter()
                    .map(|(name, sql)| NamedQuery {
                        name: name.to_string(),
                        sql: sql.replace("{schema}", &self.schema),
                    })
                    .collect(),
            })
            .collect();

        groups.push(QueryGroup {
            name: CUSTOM_GROUP.to_string(),
            editable: true,
            queries: self
                .custom
                .iter()
                .map(|(name, sql)| NamedQuery {
                    name: name.clone(),
                    sql: sql.clone(),
                })
                .collect(),
        });
        groups
    }

    pub fn find(&self, group: &str, name: &str) -> Option<String> {
        self.groups()
            .into_iter()
            .find(|g| g.name == group)?
            .queries
            .into_iter()
            .find(|q| q.name == name)
            .map(|q| q.sql)
    }

    pub fn add(&mut self, name: &str, sql: &str) -> Result<(), AppError> {
        validate(name, sql)?;
        if self.contains(name) {
            return Err(AppError::Validation(format!(
                "A custom query named '{}' already exists",
                name
            )));
        }

        let mut next = self.custom.clone();
        next.push((name.to_string(), sql.to_string()));
        self.commit(next)?;
        info!("Custom query '{}' added", name);
        Ok(())
    }

    /// Remove `old_name`, then append the new entry at the end.
    pub fn update(&mut self, old_name: &str, new_name: &str, sql: &str) -> Result<(), AppError> {
        validate(new_name, sql)?;
        if !self.contains(old_name) {
            return Err(AppError::NotFound(format!("Custom query '{}' not found", old_name)));
        }
        if new_name != old_name && self.contains(new_name) {
            return Err(AppError::Validation(format!(
                "A custom query named '{}' already exists",
                new_name
            )));
        }

        let mut next: Vec<(String, String)> = self
            .custom
            .iter()
            .filter(|(n, _)| n != old_name)
            .cloned()
            .collect();
        next.push((new_name.to_string(), sql.to_string()));
        self.commit(next)?;
        info!("Custom query '{}' updated", new_name);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<(), AppError> {
        if !self.contains(name) {
            return Err(AppError::NotFound(format!("Custom query '{}' not found", name)));
        }
        let next = self.custom.iter().filter(|(n, _)| n != name).cloned().collect();
        self.commit(next)?;
        info!("Custom query '{}' deleted", name);
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.custom.iter().any(|(n, _)| n == name)
    }

    /// Persist first; memory only changes once the file is written.
    fn commit(&mut self, next: Vec<(String, String)>) -> Result<(), AppError> {
        let json = serde_json::to_string(&next)
            .map_err(|e| AppError::Internal(format!("Custom query serialization failed: {}", e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;
        self.custom = next;
        Ok(())
    }
}

fn validate(name: &str, sql: &str) -> Result<(), AppError> {
    if name.trim().is_empty() || sql.trim().is_empty() {
        return Err(AppError::Validation(
            "Please provide both a name and a query".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn catalog(tmp: &TempDir) -> QueryCatalog {
        QueryCatalog::load(tmp.path().join("custom_queries.json"), "grocery").unwrap()
    }

    fn custom_names(catalog: &QueryCatalog) -> Vec<String> {
        catalog
            .groups()
            .into_iter()
            .find(|g| g.name == CUSTOM_GROUP)
            .unwrap()
            .queries
            .into_iter()
            .map(|q| q.name)
            .collect()
    }

    #[test]
    fn test_canned_groups_use_working_schema() {
        let tmp = TempDir::new().unwrap();
        let catalog = QueryCatalog::load(tmp.path().join("q.json"), "shop").unwrap();

        let names: Vec<String> = catalog.groups().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["Lab 4", "Lab 5", "Custom"]);
        assert_eq!(
            catalog.find("Lab 4", "All suppliers").unwrap(),
            r#"SELECT * FROM shop."Поставщик""#
        );
    }

    #[test]
    fn test_add_persists_as_name_sql_pairs() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = catalog(&tmp);
        catalog.add("Cheap", "SELECT 1").unwrap();

        let json = fs::read_to_string(catalog.path()).unwrap();
        assert_eq!(json, r#"[["Cheap","SELECT 1"]]"#);

        let reloaded = QueryCatalog::load(catalog.path(), "grocery").unwrap();
        assert_eq!(reloaded.find(CUSTOM_GROUP, "Cheap").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_update_moves_entry_to_end() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = catalog(&tmp);
        catalog.add("a", "SELECT 1").unwrap();
        catalog.add("b", "SELECT 2").unwrap();

        catalog.update("a", "a2", "SELECT 3").unwrap();

        assert_eq!(custom_names(&catalog), vec!["b", "a2"]);
        assert_eq!(catalog.find(CUSTOM_GROUP, "a2").unwrap(), "SELECT 3");
        assert!(catalog.find(CUSTOM_GROUP, "a").is_none());
    }

    #[test]
    fn test_delete_and_missing_names() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = catalog(&tmp);
        catalog.add("a", "SELECT 1").unwrap();

        catalog.delete("a").unwrap();
        assert!(custom_names(&catalog).is_empty());
        assert!(matches!(catalog.delete("a"), Err(AppError::NotFound(_))));
        assert!(matches!(catalog.update("a", "b", "SELECT 1"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_name_and_sql_are_required() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = catalog(&tmp);
        assert!(matches!(catalog.add("", "SELECT 1"), Err(AppError::Validation(_))));
        assert!(matches!(catalog.add("x", "  "), Err(AppError::Validation(_))));
        catalog.add("x", "SELECT 1").unwrap();
        assert!(matches!(catalog.add("x", "SELECT 2"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom_queries.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(QueryCatalog::load(&path, "grocery"), Err(AppError::Config(_))));
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be makes every write fail
        let path = tmp.path().join("taken");
        fs::create_dir_all(&path).unwrap();

        let mut catalog = QueryCatalog {
            path,
            schema: "grocery".to_string(),
            custom: Vec::new(),
        };
        assert!(matches!(catalog.add("a", "SELECT 1"), Err(AppError::Io(_))));
        assert!(custom_names(&catalog).is_empty());
    }
}
