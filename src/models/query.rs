//! Query catalog DTOs

use crate::queries::QueryGroup;
use crate::rows::RowSet;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to save a custom query, or to replace one under a new name
#[derive(Debug, Deserialize, Validate)]
pub struct SaveQueryRequest {
    #[validate(length(min = 1, message = "Query name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Query text is required"))]
    pub sql: String,
}

/// Run raw SQL, or a catalog entry named by `group` and `name`
#[derive(Debug, Default, Deserialize)]
pub struct RunQueryRequest {
    pub sql: Option<String>,
    pub group: Option<String>,
    pub name: Option<String>,
    /// Also write the result to a CSV file
    #[serde(default)]
    pub export: bool,
}

#[derive(Debug, Serialize)]
pub struct QueryCatalogResponse {
    pub groups: Vec<QueryGroup>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRunResponse {
    pub result: RowSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_path: Option<String>,
}
