//! RPC server state types.

use crate::persistence::DocumentPersistence;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use topicboard::remote::{FileObjectStore, MemoryDocumentStore};
use tracing::error;

/// Request counters reported by `relay.stats`.
#[derive(Debug)]
pub struct RelayCounters {
    started_at: Instant,
    requests: AtomicU64,
    failures: AtomicU64,
}

impl RelayCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn record(&self, failed: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Default for RelayCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Combined application state.
#[derive(Clone)]
pub struct AppState {
    pub documents: MemoryDocumentStore,
    pub objects: FileObjectStore,
    pub counters: Arc<RelayCounters>,
    /// Disk copy of `documents`; `None` keeps documents in memory only.
    pub persistence: Option<Arc<DocumentPersistence>>,
}

impl AppState {
    pub fn new(documents: MemoryDocumentStore, objects: FileObjectStore) -> Self {
        Self {
            documents,
            objects,
            counters: Arc::new(RelayCounters::new()),
            persistence: None,
        }
    }

    /// Saves documents to `persistence` after every write.
    pub fn with_persistence(mut self, persistence: DocumentPersistence) -> Self {
        self.persistence = Some(Arc::new(persistence));
        self
    }

    /// Writes the documents to disk, if persistence is enabled.
    ///
    /// A failed save is logged; the write it follows has already been
    /// applied and delivered.
    pub fn persist(&self) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(&self.documents) {
                error!("Failed to persist documents: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("documents", &self.documents)
            .field("objects", &self.objects.root())
            .field("requests", &self.counters.requests())
            .field(
                "persistence",
                &self.persistence.as_ref().map(|p| p.path().to_path_buf()),
            )
            .finish()
    }
}
