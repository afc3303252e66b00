//! In-memory store with fault injection

use crate::store::{validate_collection, InsertResult, Note, StoreDriver, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Failures to inject into a [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Every `connect` fails with this
    pub connect: Option<StoreError>,

    /// The Nth `count`/`insert` call (0-based, store-wide) fails once with this
    pub operations: HashMap<usize, StoreError>,

    /// Every `close` fails with this
    pub close: Option<StoreError>,

    /// Delay applied before every call
    pub latency: Option<Duration>,
}

/// Call counters for a [`MemoryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub connects: usize,
    pub close_calls: usize,
    pub open_connections: usize,
    pub operations: usize,
}

struct Shared {
    collections: RwLock<HashMap<String, Vec<Note>>>,
    faults: Mutex<Faults>,
    connects: AtomicUsize,
    close_calls: AtomicUsize,
    open_connections: AtomicUsize,
    operations: AtomicUsize,
}

/// A connection to a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryConnection {
    id: Uuid,
    open: AtomicBool,
}

impl MemoryConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// In-memory store (for tests, demos, or ephemeral use)
///
/// Clones share the same data, faults and counters.
#[derive(Clone)]
pub struct MemoryStore {
    collection: String,
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new(collection: impl Into<String>) -> Result<Self, StoreError> {
        let collection = collection.into();
        validate_collection(&collection)?;

        Ok(Self {
            collection,
            shared: Arc::new(Shared {
                collections: RwLock::new(HashMap::new()),
                faults: Mutex::new(Faults::default()),
                connects: AtomicUsize::new(0),
                close_calls: AtomicUsize::new(0),
                open_connections: AtomicUsize::new(0),
                operations: AtomicUsize::new(0),
            }),
        })
    }

    /// Replace the injected faults
    pub fn set_faults(&self, faults: Faults) {
        *self.faults() = faults;
    }

    pub fn with_faults(self, faults: Faults) -> Self {
        self.set_faults(faults);
        self
    }

    pub fn refuse_connections(self, reason: impl Into<String>) -> Self {
        self.faults().connect = Some(StoreError::ConnectionRefused(reason.into()));
        self
    }

    pub fn fail_operation(self, nth: usize, error: StoreError) -> Self {
        self.faults().operations.insert(nth, error);
        self
    }

    pub fn fail_close(self, error: StoreError) -> Self {
        self.faults().close = Some(error);
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.faults().latency = Some(latency);
        self
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            connects: self.shared.connects.load(Ordering::SeqCst),
            close_calls: self.shared.close_calls.load(Ordering::SeqCst),
            open_connections: self.shared.open_connections.load(Ordering::SeqCst),
            operations: self.shared.operations.load(Ordering::SeqCst),
        }
    }

    /// Snapshot of this store's collection
    pub async fn notes(&self) -> Vec<Note> {
        self.shared
            .collections
            .read()
            .await
            .get(&self.collection)
            .cloned()
            .unwrap_or_default()
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.shared
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        let latency = self.faults().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Count an operation and report its injected fault, if any
    async fn begin_operation(&self, conn: &MemoryConnection) -> Result<(), StoreError> {
        self.simulate_latency().await;

        if !conn.is_open() {
            return Err(StoreError::Closed);
        }

        let nth = self.shared.operations.fetch_add(1, Ordering::SeqCst);
        match self.faults().operations.remove(&nth) {
            Some(error) => {
                debug!("Injecting fault into operation {}: {}", nth, error);
                Err(error)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StoreDriver for MemoryStore {
    type Connection = MemoryConnection;

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn connect(&self) -> Result<MemoryConnection, StoreError> {
        self.simulate_latency().await;
        self.shared.connects.fetch_add(1, Ordering::SeqCst);

        let refused = self.faults().connect.clone();
        if let Some(error) = refused {
            return Err(error);
        }

        self.shared.open_connections.fetch_add(1, Ordering::SeqCst);
        let conn = MemoryConnection {
            id: Uuid::new_v4(),
            open: AtomicBool::new(true),
        };
        debug!("Opened memory connection {}", conn.id);
        Ok(conn)
    }

    async fn count(&self, conn: &MemoryConnection) -> Result<u64, StoreError> {
        self.begin_operation(conn).await?;

        let collections = self.shared.collections.read().await;
        Ok(collections
            .get(&self.collection)
            .map(|notes| notes.len() as u64)
            .unwrap_or(0))
    }

    async fn insert(&self, conn: &MemoryConnection, note: &Note) -> Result<InsertResult, StoreError> {
        self.begin_operation(conn).await?;

        let mut collections = self.shared.collections.write().await;
        collections
            .entry(self.collection.clone())
            .or_insert_with(Vec::new)
            .push(note.clone());

        Ok(InsertResult {
            inserted_count: 1,
            inserted_id: Uuid::new_v4(),
        })
    }

    async fn close(&self, conn: MemoryConnection) -> Result<(), StoreError> {
        self.simulate_latency().await;
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self.faults().close.clone();
        if let Some(error) = failing {
            return Err(error);
        }

        if !conn.open.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        self.shared.open_connections.fetch_sub(1, Ordering::SeqCst);
        debug!("Closed memory connection {}", conn.id);
        Ok(())
    }
}
