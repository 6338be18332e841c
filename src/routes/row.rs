//! Row route handlers

use crate::error::{validation_error, ApiResult};
use crate::models::{
    DeleteRowsRequest, DeleteRowsResponse, InsertRowRequest, SuccessResponse, UpdateRowsRequest,
    UpdateRowsResponse,
};
use crate::rows::{RowAccess, RowSet};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

/// Every row of the table; a failed read shows as an empty grid
pub async fn fetch_rows(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Json<SuccessResponse<RowSet>>> {
    let session = state.session().await?;
    let data = RowAccess::fetch_all(&session, &table).await;

    Ok(Json(SuccessResponse::with_data(
        format!("{} rows fetched.", data.rows.len()),
        data,
    )))
}

pub async fn insert_row(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Json(payload): Json<InsertRowRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let session = state.session().await?;
    RowAccess::insert(&session, &table, &payload.columns, &payload.values).await?;

    Ok(Json(SuccessResponse::message_only("Record added successfully.")))
}

/// Zero matched rows is reported in the body, not as an error
pub async fn update_rows(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Json(payload): Json<UpdateRowsRequest>,
) -> ApiResult<Json<SuccessResponse<UpdateRowsResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let session = state.session().await?;
    let predicate = RowAccess::predicate_for(&session, &table, payload.target).await?;
    let outcome =
        RowAccess::update_where(&session, &table, &payload.columns, &payload.values, &predicate)
            .await?;

    Ok(Json(SuccessResponse::with_data(
        outcome.message(),
        UpdateRowsResponse::from(outcome),
    )))
}

pub async fn delete_rows(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Json(payload): Json<DeleteRowsRequest>,
) -> ApiResult<Json<SuccessResponse<DeleteRowsResponse>>> {
    let session = state.session().await?;
    let predicate = RowAccess::predicate_for(&session, &table, payload.target).await?;
    let rows_affected = RowAccess::delete_where(&session, &table, &predicate).await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Deleted {} rows.", rows_affected),
        DeleteRowsResponse { rows_affected },
    )))
}
