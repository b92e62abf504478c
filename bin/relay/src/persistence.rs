//! Document persistence for the relay server.
//!
//! The relay serves documents from memory and keeps a copy on disk so a
//! restart does not orphan the objects stored next to it.
//!
//! ## Storage Layout
//!
//! - `{data_dir}/documents.json`: every topic and post, comments inline
//! - `{data_dir}/objects/`: uploaded files (see `FileObjectStore`)
//!
//! The document file is rewritten after every successful write, through a
//! temporary file renamed over the previous copy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use topicboard::remote::{DocumentSnapshot, MemoryDocumentStore};
use tracing::{debug, info};

/// Document file name inside the data directory.
const DOCUMENTS_FILE: &str = "documents.json";

/// JSON file backed copy of the relay's documents.
#[derive(Debug)]
pub struct DocumentPersistence {
    path: PathBuf,
    /// Serializes saves so an older copy never replaces a newer one.
    write_lock: Mutex<()>,
}

impl DocumentPersistence {
    /// Creates a persistence manager storing under `data_dir`.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Result<Self, String> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .map_err(|e| format!("Failed to create data directory {:?}: {}", data_dir, e))?;
        Ok(Self {
            path: data_dir.join(DOCUMENTS_FILE),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved documents, or an empty store when nothing was saved.
    pub fn load(&self) -> Result<MemoryDocumentStore, String> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No saved documents at {:?}, starting empty", self.path);
                return Ok(MemoryDocumentStore::new());
            }
            Err(e) => return Err(format!("Failed to read {:?}: {}", self.path, e)),
        };

        let snapshot: DocumentSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| format!("Failed to parse {:?}: {}", self.path, e))?;
        info!(
            "Loaded {} topics and {} posts from {:?}",
            snapshot.topics.len(),
            snapshot.posts.len(),
            self.path
        );
        Ok(MemoryDocumentStore::from_snapshot(snapshot))
    }

    /// Writes the current contents of `documents`.
    pub fn save(&self, documents: &MemoryDocumentStore) -> Result<(), String> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let snapshot = documents.export();
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| format!("Failed to serialize documents: {}", e))?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, &bytes)
            .map_err(|e| format!("Failed to write {:?}: {}", temp, e))?;
        std::fs::rename(&temp, &self.path)
            .map_err(|e| format!("Failed to replace {:?}: {}", self.path, e))?;

        debug!(
            "Saved {} topics and {} posts",
            snapshot.topics.len(),
            snapshot.posts.len()
        );
        Ok(())
    }
}
