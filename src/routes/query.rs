//! Query catalog and raw query route handlers

use crate::error::{not_found_error, validation_error, ApiResult, AppError};
use crate::models::{
    QueryCatalogResponse, QueryRunResponse, RunQueryRequest, SaveQueryRequest, SuccessResponse,
};
use crate::rows::RowAccess;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

pub async fn list_queries(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<QueryCatalogResponse>>> {
    let groups = state.queries.read().await.groups();
    Ok(Json(SuccessResponse::with_data(
        "Queries fetched.",
        QueryCatalogResponse { groups },
    )))
}

pub async fn add_custom_query(
    State(state): State<SharedState>,
    Json(payload): Json<SaveQueryRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    state.queries.write().await.add(&payload.name, &payload.sql)?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Custom query '{}' added successfully!",
        payload.name
    ))))
}

pub async fn update_custom_query(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(payload): Json<SaveQueryRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    state
        .queries
        .write()
        .await
        .update(&name, &payload.name, &payload.sql)?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Custom query '{}' updated successfully!",
        payload.name
    ))))
}

pub async fn delete_custom_query(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    state.queries.write().await.delete(&name)?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Custom query '{}' deleted successfully!",
        name
    ))))
}

/// Run raw SQL or a catalog entry, optionally exporting the result
pub async fn run_query(
    State(state): State<SharedState>,
    Json(payload): Json<RunQueryRequest>,
) -> ApiResult<Json<SuccessResponse<QueryRunResponse>>> {
    let (label, sql) = resolve_sql(&state, &payload).await?;

    let result = {
        let session = state.session().await?;
        RowAccess::run_query(&session, &sql).await?
    };

    let export_path = if payload.export {
        Some(state.exporter.export(&label, &result)?.display().to_string())
    } else {
        None
    };

    Ok(Json(SuccessResponse::with_data(
        format!("{} rows returned.", result.rows.len()),
        QueryRunResponse {
            result,
            export_path,
        },
    )))
}

/// Explicit SQL wins over a catalog reference
async fn resolve_sql(state: &SharedState, payload: &RunQueryRequest) -> Result<(String, String), AppError> {
    if let Some(sql) = &payload.sql {
        return Ok(("query".to_string(), sql.clone()));
    }

    match (&payload.group, &payload.name) {
        (Some(group), Some(name)) => {
            let sql = state
                .queries
                .read()
                .await
                .find(group, name)
                .ok_or_else(|| not_found_error(format!("Query '{}' not found in '{}'", name, group)))?;
            Ok((name.clone(), sql))
        }
        _ => Err(validation_error(
            "Provide either sql or both group and name",
        )),
    }
}
