//! Snapshot and export DTOs

use crate::snapshot::SnapshotEntry;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Names a snapshot file or set directory inside the backup directory
#[derive(Debug, Deserialize, Validate)]
pub struct RestoreRequest {
    #[validate(length(min = 1, message = "Snapshot name is required"))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SnapshotListResponse {
    pub snapshots: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize)]
pub struct TableSnapshotResponse {
    pub table: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub path: String,
    pub rows: usize,
}
