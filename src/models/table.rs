//! Table and column DTOs

use crate::introspection::ColumnDef;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to create a new table
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    #[validate(length(min = 1, max = 63, message = "Table name must be between 1 and 63 characters"))]
    pub table_name: String,

    #[validate(length(min = 1, message = "At least one column is required"))]
    pub columns: Vec<ColumnDef>,
}

/// Request to rename a table or a column
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    #[validate(length(min = 1, max = 63, message = "New name must be between 1 and 63 characters"))]
    pub new_name: String,
}

/// Request to add a column
#[derive(Debug, Deserialize, Validate)]
pub struct AddColumnRequest {
    #[validate(length(min = 1, max = 63, message = "Column name must be between 1 and 63 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "Column type is required"))]
    #[serde(rename = "type")]
    pub data_type: String,
}

impl AddColumnRequest {
    pub fn to_column(&self) -> ColumnDef {
        ColumnDef::new(self.name.clone(), self.data_type.clone())
    }
}

/// Request to change a column's declared type
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTypeRequest {
    #[validate(length(min = 1, message = "New type is required"))]
    pub new_type: String,
}

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ColumnListResponse {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKeyResponse {
    pub table: String,
    pub primary_keys: Vec<String>,
}

/// Result of dropping a table: where its last snapshot went
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropTableResponse {
    pub table: String,
    pub snapshot: String,
}
