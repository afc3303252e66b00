//! SQLite-backed notes store

use crate::store::{validate_collection, InsertResult, Note, StoreDriver, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
enum Location {
    Memory,
    File(PathBuf),
}

/// SQLite notes store
///
/// Each `connect` opens a single-connection pool, so an in-memory database
/// lives exactly as long as the session that created it.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    location: Location,
    collection: String,
    connect_timeout: Duration,
}

/// An open SQLite session
#[derive(Debug)]
pub struct SqliteSession {
    id: Uuid,
    pool: SqlitePool,
}

impl SqliteSession {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl SqliteStore {
    /// Store backed by a database file, created on first connect
    pub fn new(path: impl AsRef<Path>, collection: impl Into<String>) -> Result<Self, StoreError> {
        Self::at(Location::File(path.as_ref().to_path_buf()), collection.into())
    }

    /// Store backed by a private in-memory database
    pub fn in_memory(collection: impl Into<String>) -> Result<Self, StoreError> {
        Self::at(Location::Memory, collection.into())
    }

    fn at(location: Location, collection: String) -> Result<Self, StoreError> {
        validate_collection(&collection)?;
        Ok(Self {
            location,
            collection,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Default database location under the user's local data dir
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stepwise")
            .join("notes.db")
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, StoreError> {
        match &self.location {
            Location::Memory => Ok(SqliteConnectOptions::new().in_memory(true)),
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::ConnectionRefused(format!("{}: {}", parent.display(), e))
                    })?;
                }
                Ok(SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true))
            }
        }
    }

    fn describe(&self) -> String {
        match &self.location {
            Location::Memory => ":memory:".to_string(),
            Location::File(path) => path.display().to_string(),
        }
    }
}

fn map_error(err: sqlx::Error, timeout: Duration) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::NetworkTimeout(timeout),
        sqlx::Error::PoolClosed => StoreError::Closed,
        sqlx::Error::Io(io) => StoreError::ConnectionRefused(io.to_string()),
        other => StoreError::Driver(other.to_string()),
    }
}

#[async_trait]
impl StoreDriver for SqliteStore {
    type Connection = SqliteSession;

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn connect(&self) -> Result<SqliteSession, StoreError> {
        let options = self.connect_options()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(self.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| match map_error(e, self.connect_timeout) {
                StoreError::Driver(message) => StoreError::ConnectionRefused(message),
                other => other,
            })?;

        let created = sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                message TEXT NOT NULL,
                value INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            self.collection
        ))
        .execute(&pool)
        .await;

        if let Err(e) = created {
            // No session owns the pool yet, so nobody else will close it
            pool.close().await;
            return Err(map_error(e, self.connect_timeout));
        }

        let session = SqliteSession {
            id: Uuid::new_v4(),
            pool,
        };
        info!("Connected to sqlite database {}", self.describe());
        debug!("Opened sqlite session {}", session.id);
        Ok(session)
    }

    async fn count(&self, conn: &SqliteSession) -> Result<u64, StoreError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {}", self.collection))
            .fetch_one(&conn.pool)
            .await
            .map_err(|e| map_error(e, self.connect_timeout))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| map_error(e, self.connect_timeout))?;
        Ok(count.max(0) as u64)
    }

    async fn insert(&self, conn: &SqliteSession, note: &Note) -> Result<InsertResult, StoreError> {
        let id = Uuid::new_v4();
        let done = sqlx::query(&format!(
            "INSERT INTO {} (id, message, value, created_at) VALUES (?1, ?2, ?3, ?4)",
            self.collection
        ))
        .bind(id.to_string())
        .bind(&note.message)
        .bind(note.value)
        .bind(Utc::now().naive_utc())
        .execute(&conn.pool)
        .await
        .map_err(|e| map_error(e, self.connect_timeout))?;

        Ok(InsertResult {
            inserted_count: done.rows_affected(),
            inserted_id: id,
        })
    }

    async fn close(&self, conn: SqliteSession) -> Result<(), StoreError> {
        if conn.pool.is_closed() {
            return Err(StoreError::Closed);
        }
        conn.pool.close().await;
        debug!("Closed sqlite session {}", conn.id);
        Ok(())
    }
}
