//! Store drivers the notes chain runs against

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{Faults, MemoryConnection, MemoryStore, StoreStats};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteSession, SqliteStore};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Error types for store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("network timeout after {0:?}")]
    NetworkTimeout(Duration),

    #[error("connection is closed")]
    Closed,

    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),

    #[error("driver error: {0}")]
    Driver(String),
}

/// A document in the notes collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Note {
    pub message: String,
    pub value: i64,
}

impl Note {
    pub fn new(message: impl Into<String>, value: i64) -> Self {
        Self {
            message: message.into(),
            value,
        }
    }

    /// The note the coroutine flavour of the demo writes
    pub fn coroutine_default() -> Self {
        Self::new("co is neat", 4)
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new("hi", 345)
    }
}

/// Acknowledgement of an insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub inserted_count: u64,
    pub inserted_id: Uuid,
}

/// Which driver to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process, gone when the process exits
    #[default]
    Memory,
    /// SQLite file
    Sqlite,
}

/// A connection-oriented notes store
///
/// `connect` hands out a connection that the other calls borrow; `close`
/// consumes it.
#[async_trait]
pub trait StoreDriver: Send + Sync {
    type Connection: Send + Sync + 'static;

    /// Collection this driver reads and writes
    fn collection(&self) -> &str;

    async fn connect(&self) -> Result<Self::Connection, StoreError>;

    async fn count(&self, conn: &Self::Connection) -> Result<u64, StoreError>;

    async fn insert(&self, conn: &Self::Connection, note: &Note) -> Result<InsertResult, StoreError>;

    async fn close(&self, conn: Self::Connection) -> Result<(), StoreError>;
}

/// Collection names end up in SQL, so only plain identifiers are accepted
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    static IDENT: OnceLock<Option<Regex>> = OnceLock::new();
    let ident = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

    if ident.as_ref().is_some_and(|re| re.is_match(name)) {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}
