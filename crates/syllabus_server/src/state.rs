//! Shared handler state.
//!
//! # Invariants
//! - One SQLite connection per process, shared by every request.
//! - Store calls run on the blocking pool; the lock is held for exactly one
//!   service call and never on an async worker thread.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use syllabus_core::db::{open_db, DbResult};
use syllabus_core::service::hierarchy_service::ServiceResult;
use syllabus_core::{HierarchyService, HierarchyServiceError, SqliteHierarchyRepository};
use tokio::task;

use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    /// Runs one service call against the shared connection on the blocking pool.
    pub async fn with_service<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&HierarchyService<SqliteHierarchyRepository<'_>>) -> ServiceResult<T>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T, AppError> {
            let conn = db.lock().unwrap_or_else(PoisonError::into_inner);
            let repo =
                SqliteHierarchyRepository::try_new(&conn).map_err(HierarchyServiceError::from)?;
            Ok(op(&HierarchyService::new(repo))?)
        })
        .await
        .map_err(|err| AppError::TaskFailed(err.to_string()))?
    }
}
