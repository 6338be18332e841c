//! Error handling module
//!
//! Provides unified error types for the data-access API and the snapshot
//! engine. Each variant corresponds to one failure class the Presentation
//! Layer has to branch on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Session could not be opened (bad host, credentials, network)
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection not established: {0}")]
    NotConnected(String),

    /// A data statement failed; the store's message is carried verbatim
    #[error("Query error: {0}")]
    Query(String),

    /// A schema statement failed
    #[error("DDL error in `{statement}`: {message}")]
    Ddl { statement: String, message: String },

    /// Reading a table for a snapshot failed; earlier files may exist on disk
    #[error("Capture failed for table '{table}': {message}")]
    Capture { table: String, message: String },

    /// Replaying a snapshot failed; the target may be partially restored
    #[error("Restore failed: {0}")]
    Restore(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn ddl(statement: impl Into<String>, source: tokio_postgres::Error) -> Self {
        AppError::Ddl {
            statement: statement.into(),
            message: store_message(&source),
        }
    }

    pub fn capture(table: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Capture {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Machine-readable code, stable across message wording changes
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::NotConnected(_) => "NOT_CONNECTED",
            AppError::Query(_) => "QUERY_ERROR",
            AppError::Ddl { .. } => "DDL_ERROR",
            AppError::Capture { .. } => "CAPTURE_ERROR",
            AppError::Restore(_) => "RESTORE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Query(store_message(&e))
    }
}

/// Extract the server-side message when there is one.
///
/// `tokio_postgres::Error`'s Display for server errors is just "db error",
/// which is useless to a person looking at a failed restore.
pub fn store_message(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{}: {} ({})", db.severity(), db.message(), detail),
            None => format!("{}: {}", db.severity(), db.message()),
        },
        None => e.to_string(),
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            AppError::Connection(msg) => {
                error!("Connection error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Could not connect to the database".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::NotConnected(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone(), None),
            AppError::Query(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "The statement was rejected by the database".to_string(),
                Some(msg.clone()),
            ),
            AppError::Ddl { statement, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Schema change failed: {}", statement),
                Some(message.clone()),
            ),
            AppError::Capture { table, message } => {
                error!("Capture error on {}: {}", table, message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Snapshot of table '{}' failed", table),
                    Some(message.clone()),
                )
            }
            AppError::Restore(msg) => {
                error!("Restore error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Restore failed; the schema may be partially restored".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Io(e) => {
                error!("IO error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A file operation failed".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A configuration error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(self.code().to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}
