//! Database
//!
//! SQLite persistence for leads, call agents, roles, email log and
//! server-side attribution slots. A single connection sits behind a mutex;
//! work runs on the blocking thread pool so handlers never stall the runtime.

pub mod migrations;
mod roles;
mod visits;

pub use roles::ADMIN_ROLE;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from the persistence layer
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Stored timestamp format: RFC 3339, UTC, fixed microsecond width so text
/// order matches time order
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<crate::attribution::StoreError> for DbError {
    fn from(err: crate::attribution::StoreError) -> Self {
        match err {
            crate::attribution::StoreError::Serialization(e) => e.into(),
            other => DbError::Serialization(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Shared handle to the service database
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and bring the schema up to date
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        tracing::info!(path = ?path, "Opened database");
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and dry runs
    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> DbResult<Self> {
        migrations::run_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn execute<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&mut Connection) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| DbError::Lock(format!("Connection lock poisoned: {}", e)))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))?
    }

    /// Cheap liveness query for readiness probes
    pub async fn ping(&self) -> DbResult<()> {
        self.execute(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("funnel.db");

        let db = Database::open(&path).unwrap();
        db.ping().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("funnel.db");

        {
            let db = Database::open(&path).unwrap();
            db.grant_role("user-1", ADMIN_ROLE).await.unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.has_role("user-1", ADMIN_ROLE).await.unwrap());
    }

    #[test]
    fn test_timestamp_fixed_width() {
        use chrono::TimeZone;

        let whole = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = whole + chrono::Duration::milliseconds(250);
        let latest = whole + chrono::Duration::microseconds(250_001);

        assert_eq!(timestamp(whole), "2024-03-01T12:00:00.000000Z");
        assert_eq!(timestamp(later).len(), timestamp(whole).len());
        assert!(timestamp(whole) < timestamp(later));
        assert!(timestamp(later) < timestamp(latest));
    }

    #[test]
    fn test_error_display() {
        let err = DbError::NotFound("lead abc".to_string());
        assert_eq!(err.to_string(), "Not found: lead abc");
    }
}
