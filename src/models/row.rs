//! Row DTOs

use crate::rows::{RowTarget, UpdateOutcome};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to insert one row; `values[i]` goes into `columns[i]`
#[derive(Debug, Deserialize, Validate)]
pub struct InsertRowRequest {
    #[validate(length(min = 1, message = "At least one column is required"))]
    pub columns: Vec<String>,
    pub values: Vec<Option<String>>,
}

/// Request to update every row matching the target
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRowsRequest {
    #[validate(length(min = 1, message = "At least one column is required"))]
    pub columns: Vec<String>,
    pub values: Vec<Option<String>>,
    #[serde(flatten)]
    pub target: RowTarget,
}

/// Request to delete every row matching the target
#[derive(Debug, Deserialize)]
pub struct DeleteRowsRequest {
    #[serde(flatten)]
    pub target: RowTarget,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRowsResponse {
    pub outcome: UpdateOutcome,
    pub rows_affected: u64,
    /// More than one row changed
    pub multi_row: bool,
}

impl From<UpdateOutcome> for UpdateRowsResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        Self {
            rows_affected: outcome.rows_affected(),
            multi_row: outcome.is_multi_row(),
            outcome,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowsResponse {
    pub rows_affected: u64,
}
