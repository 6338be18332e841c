//! Table, column and row-export route handlers

use crate::error::{validation_error, ApiResult};
use crate::introspection::Introspector;
use crate::models::{
    AddColumnRequest, ChangeTypeRequest, ColumnListResponse, CreateTableRequest,
    DropTableResponse, ExportResponse, PrimaryKeyResponse, RenameRequest, SuccessResponse,
    TableListResponse,
};
use crate::rows::RowAccess;
use crate::schema::SchemaMutator;
use crate::state::{run_to_completion, SharedState};
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, info};
use validator::Validate;

/// List all tables in the working schema
pub async fn list_tables(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<TableListResponse>>> {
    let session = state.session().await?;
    let tables = Introspector::list_tables(&session).await;

    info!("Listed {} tables", tables.len());
    Ok(Json(SuccessResponse::with_data(
        "Tables fetched successfully.",
        TableListResponse { tables },
    )))
}

/// Get columns for a specific table
pub async fn get_columns(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Json<SuccessResponse<ColumnListResponse>>> {
    debug!("Getting columns for table: {}", table);
    let session = state.session().await?;
    let columns = Introspector::list_columns(&session, &table).await;

    Ok(Json(SuccessResponse::with_data(
        format!("{} columns fetched.", columns.len()),
        ColumnListResponse { table, columns },
    )))
}

pub async fn get_primary_keys(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Json<SuccessResponse<PrimaryKeyResponse>>> {
    let session = state.session().await?;
    let primary_keys = Introspector::primary_key_columns(&session, &table).await;

    Ok(Json(SuccessResponse::with_data(
        "Primary keys fetched.",
        PrimaryKeyResponse {
            table,
            primary_keys,
        },
    )))
}

/// Create a new table
pub async fn create_table(
    State(state): State<SharedState>,
    Json(payload): Json<CreateTableRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let session = state.session().await?;
    SchemaMutator::create_table(&session, &payload.table_name, &payload.columns).await?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Table '{}' created successfully.",
        payload.table_name
    ))))
}

/// Drop a table after snapshotting it
pub async fn drop_table(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Json<SuccessResponse<DropTableResponse>>> {
    let snapshot = run_to_completion({
        let table = table.clone();
        async move {
            let session = state.session().await?;
            SchemaMutator::drop_table(&*session, &state.engine, &table).await
        }
    })
    .await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Table '{}' dropped.", table),
        DropTableResponse {
            table,
            snapshot: snapshot.display().to_string(),
        },
    )))
}

pub async fn rename_table(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Json(payload): Json<RenameRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let session = state.session().await?;
    SchemaMutator::rename_table(&session, &table, &payload.new_name).await?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Table '{}' renamed to '{}'.",
        table, payload.new_name
    ))))
}

pub async fn add_column(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Json(payload): Json<AddColumnRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let session = state.session().await?;
    SchemaMutator::add_column(&session, &table, &payload.to_column()).await?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Column '{}' added to '{}'.",
        payload.name, table
    ))))
}

pub async fn drop_column(
    State(state): State<SharedState>,
    Path((table, column)): Path<(String, String)>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    let session = state.session().await?;
    SchemaMutator::drop_column(&session, &table, &column).await?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Column '{}' dropped from '{}'.",
        column, table
    ))))
}

pub async fn rename_column(
    State(state): State<SharedState>,
    Path((table, column)): Path<(String, String)>,
    Json(payload): Json<RenameRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let session = state.session().await?;
    SchemaMutator::rename_column(&session, &table, &column, &payload.new_name).await?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Column '{}' renamed to '{}'.",
        column, payload.new_name
    ))))
}

pub async fn change_column_type(
    State(state): State<SharedState>,
    Path((table, column)): Path<(String, String)>,
    Json(payload): Json<ChangeTypeRequest>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let session = state.session().await?;
    SchemaMutator::change_column_type(&session, &table, &column, &payload.new_type).await?;

    Ok(Json(SuccessResponse::message_only(format!(
        "Column '{}' is now {}.",
        column, payload.new_type
    ))))
}

/// Write the table's current rows to a CSV file
pub async fn export_table(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Json<SuccessResponse<ExportResponse>>> {
    let data = {
        let session = state.session().await?;
        RowAccess::try_fetch_all(&session, &table).await?
    };
    let path = state.exporter.export(&table, &data)?;

    Ok(Json(SuccessResponse::with_data(
        format!("Exported '{}'.", table),
        ExportResponse {
            path: path.display().to_string(),
            rows: data.rows.len(),
        },
    )))
}
