//! Application state management
//!
//! One database session serves every request. It sits behind a mutex so
//! data access and snapshot operations run strictly one at a time.

use crate::config::Settings;
use crate::connection::SessionInfo;
use crate::db::Session;
use crate::error::AppError;
use crate::export::CsvExporter;
use crate::queries::QueryCatalog;
use crate::snapshot::{SnapshotEngine, SnapshotStore};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

pub struct AppState {
    session: Mutex<Session>,

    /// Copy of the session's connection details, readable without the lock
    pub info: SessionInfo,

    pub engine: SnapshotEngine,

    pub exporter: CsvExporter,

    /// Canned and custom queries; writes persist to the queries file
    pub queries: RwLock<QueryCatalog>,
}

impl AppState {
    pub fn new(session: Session, settings: &Settings) -> Result<Self, AppError> {
        let storage = &settings.storage;
        let queries = QueryCatalog::load(&storage.queries_file, session.schema())?;

        Ok(Self {
            info: session.info().clone(),
            session: Mutex::new(session),
            engine: SnapshotEngine::new(
                SnapshotStore::new(&storage.backup_dir),
                storage.snapshot_mode,
            ),
            exporter: CsvExporter::new(&storage.export_dir),
            queries: RwLock::new(queries),
        })
    }

    /// Exclusive use of the session for the rest of the request.
    pub async fn session(&self) -> Result<MutexGuard<'_, Session>, AppError> {
        let session = self.session.lock().await;
        if session.is_closed() {
            return Err(AppError::NotConnected(
                "The database connection was closed; restart the server to reconnect".to_string(),
            ));
        }
        Ok(session)
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;

/// Run `task` on its own tokio task and wait for its result.
///
/// A request future is dropped when its client disconnects. Work started
/// here keeps going regardless, so a snapshot pass always reaches its
/// COMMIT or ROLLBACK and a set restore never stops between its drop and
/// replay phases.
pub async fn run_to_completion<T, F>(task: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(|e| AppError::Internal(format!("Background task failed: {}", e)))?
}
