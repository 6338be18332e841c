//! Snapshot API Routes
//!
//! Capture and replay of single tables and whole-schema sets. Clients name
//! snapshots by the entry names `GET /snapshots` reports. Every pass runs
//! detached from the request, so a disconnecting client cannot cut it short.

use crate::error::{validation_error, ApiResult};
use crate::models::{RestoreRequest, SnapshotListResponse, SuccessResponse, TableSnapshotResponse};
use crate::snapshot::{RestoreSummary, SetSummary};
use crate::state::{run_to_completion, SharedState};
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;
use validator::Validate;

pub async fn list_snapshots(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<SnapshotListResponse>>> {
    let snapshots = state.engine.store().list()?;

    Ok(Json(SuccessResponse::with_data(
        format!("{} snapshots found.", snapshots.len()),
        SnapshotListResponse { snapshots },
    )))
}

pub async fn snapshot_table(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Json<SuccessResponse<TableSnapshotResponse>>> {
    let path = run_to_completion({
        let table = table.clone();
        async move {
            let session = state.session().await?;
            state.engine.snapshot_table(&*session, &table).await
        }
    })
    .await?;

    Ok(Json(SuccessResponse::with_data(
        "Backup successfully created!",
        TableSnapshotResponse {
            table,
            path: path.display().to_string(),
        },
    )))
}

pub async fn snapshot_schema(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<SetSummary>>> {
    let summary = run_to_completion(async move {
        let session = state.session().await?;
        state.engine.snapshot_schema(&*session).await
    })
    .await?;

    Ok(Json(SuccessResponse::with_data(
        "Backup successfully created!",
        summary,
    )))
}

pub async fn restore_snapshot(
    State(state): State<SharedState>,
    Json(payload): Json<RestoreRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let path = state.engine.store().resolve(&payload.name)?;
    if path.is_dir() {
        return Err(validation_error(format!(
            "'{}' is a snapshot set; use /snapshots/restore-set",
            payload.name
        )));
    }

    run_to_completion(async move {
        let session = state.session().await?;
        state.engine.restore_snapshot(&*session, &path).await
    })
    .await?;

    info!("Restore of {} requested by client completed", payload.name);
    Ok(Json(SuccessResponse::message_only(format!(
        "Restored from {}.",
        payload.name
    ))))
}

pub async fn restore_snapshot_set(
    State(state): State<SharedState>,
    Json(payload): Json<RestoreRequest>,
) -> ApiResult<Json<SuccessResponse<RestoreSummary>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let dir = state.engine.store().resolve(&payload.name)?;
    if !dir.is_dir() {
        return Err(validation_error(format!(
            "'{}' is not a snapshot set directory",
            payload.name
        )));
    }

    let summary = run_to_completion(async move {
        let session = state.session().await?;
        state.engine.restore_snapshot_set(&*session, &dir).await
    })
    .await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Restored {} tables from {}.", summary.replayed.len(), payload.name),
        summary,
    )))
}
