//! libSQL storage layer: Source Registry and Triage Ledger.
//!
//! The [`Storage`] struct wraps a local libSQL database holding source
//! configuration and run state, the acquisition router (one row per unique
//! url), staged lead content awaiting triage, and promoted cases.
//!
//! **Concurrency rules:**
//! - One [`Storage`] per task. Domain workers call [`Storage::connect_worker`]
//!   to get their own connection on the shared database.
//! - Writers serialize on the database (IMMEDIATE transactions plus a busy
//!   timeout). Duplicate urls are resolved by the `item_url` uniqueness
//!   constraint, never by an application lock.

mod ledger;
mod migrations;
mod sources;
mod triage;

pub use ledger::RecordOutcome;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hunter_shared::{HunterError, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Arc<Database>,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HunterError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(HunterError::storage)?;

        let conn = db.connect().map_err(HunterError::storage)?;
        configure_connection(&conn).await?;

        // WAL lets readers proceed while a worker holds the write lock.
        if let Err(e) = conn.query("PRAGMA journal_mode = WAL", params![]).await {
            tracing::warn!(error = %e, "could not enable WAL, writers will block readers");
        }

        let storage = Self {
            db: Arc::new(db),
            conn,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// A new handle with its own connection to the same database.
    pub async fn connect_worker(&self) -> Result<Self> {
        let conn = self.db.connect().map_err(HunterError::storage)?;
        configure_connection(&conn).await?;
        Ok(Self {
            db: Arc::clone(&self.db),
            conn,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    HunterError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(HunterError::storage)?;
    conn.execute("PRAGMA foreign_keys = ON", params![])
        .await
        .map_err(HunterError::storage)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn col_text(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(HunterError::storage)
}

pub(crate) fn col_opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok()
}

pub(crate) fn col_i64(row: &libsql::Row, idx: i32) -> Result<i64> {
    row.get::<i64>(idx).map_err(HunterError::storage)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HunterError::Storage(format!("invalid timestamp '{raw}': {e}")))
}

pub(crate) fn col_timestamp(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>> {
    parse_timestamp(&col_text(row, idx)?)
}

pub(crate) fn col_opt_timestamp(row: &libsql::Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    col_opt_text(row, idx)
        .map(|raw| parse_timestamp(&raw))
        .transpose()
}

pub(crate) fn col_uuid(row: &libsql::Row, idx: i32) -> Result<Uuid> {
    let raw = col_text(row, idx)?;
    Uuid::parse_str(&raw).map_err(|e| HunterError::Storage(format!("invalid uuid '{raw}': {e}")))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("hunter_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn file_databases_use_wal() {
        let storage = test_storage().await;
        let mut rows = storage
            .conn
            .query("PRAGMA journal_mode", params![])
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap().to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn worker_connections_share_data() {
        let storage = test_storage().await;
        let source_id = seed_source(&storage, "Shared", "test_data").await;

        let worker = storage.connect_worker().await.expect("worker connection");
        let found = worker.get_source(source_id).await.unwrap();
        assert_eq!(found.map(|s| s.name), Some("Shared".to_string()));
    }
}
