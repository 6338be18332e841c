//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod query;
mod row;
mod snapshot;
mod table;

use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    extract::State,
    http::{header, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    let cors = build_cors_layer(settings);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        .route("/health", get(health_check))

        // Tables and columns
        .route("/tables", get(table::list_tables).post(table::create_table))
        .route("/tables/{table}", delete(table::drop_table))
        .route("/tables/{table}/rename", post(table::rename_table))
        .route("/tables/{table}/primary-keys", get(table::get_primary_keys))
        .route("/tables/{table}/columns", get(table::get_columns).post(table::add_column))
        .route("/tables/{table}/columns/{column}", delete(table::drop_column))
        .route("/tables/{table}/columns/{column}/rename", post(table::rename_column))
        .route("/tables/{table}/columns/{column}/type", post(table::change_column_type))
        .route("/tables/{table}/export", post(table::export_table))

        // Rows
        .route(
            "/tables/{table}/rows",
            get(row::fetch_rows)
                .post(row::insert_row)
                .put(row::update_rows)
                .delete(row::delete_rows),
        )

        // Snapshots
        .route("/snapshots", get(snapshot::list_snapshots))
        .route("/snapshots/tables/{table}", post(snapshot::snapshot_table))
        .route("/snapshots/schema", post(snapshot::snapshot_schema))
        .route("/snapshots/restore", post(snapshot::restore_snapshot))
        .route("/snapshots/restore-set", post(snapshot::restore_snapshot_set))

        // Query catalog
        .route("/queries", get(query::list_queries))
        .route("/queries/custom", post(query::add_custom_query))
        .route(
            "/queries/custom/{name}",
            put(query::update_custom_query).delete(query::delete_custom_query),
        )
        .route("/queries/run", post(query::run_query))

        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Health check endpoint, with the session and storage locations
async fn health_check(State(state): State<SharedState>) -> axum::Json<serde_json::Value> {
    let queries_file = state.queries.read().await.path().display().to_string();

    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "session": state.info,
        "storage": {
            "backupDir": state.engine.store().root().display().to_string(),
            "snapshotMode": state.engine.mode(),
            "exportDir": state.exporter.dir().display().to_string(),
            "queriesFile": queries_file,
        }
    }))
}
