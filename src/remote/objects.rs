//! Object storage for uploaded images.

use super::ObjectStore;
use crate::error::{BoardError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, instrument};

/// Rejects names that could escape the storage root.
fn checked_object_name(name: &str) -> Result<&str> {
    let path = Path::new(name);
    let safe = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(name)
    } else {
        Err(BoardError::validation(format!(
            "Invalid object name: {}",
            name
        )))
    }
}

fn object_url(base_url: &str, name: &str) -> String {
    format!("{}/objects/{}", base_url.trim_end_matches('/'), name)
}

/// Stores objects as files under a root directory.
///
/// URLs are `<public base>/objects/<name>`; the owning server is expected to
/// serve the root directory under `/objects`.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FileObjectStore {
    /// Creates the store, creating `root` if it does not exist.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                BoardError::storage(format!("Failed to create object directory: {}", e))
            })?;
            info!("Created object directory: {:?}", root);
        }
        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    /// Directory objects are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<String> {
        let name = checked_object_name(suggested_name)?;
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| BoardError::storage(format!("Failed to write object: {}", e)))?;
        info!("Stored object {} ({} bytes)", name, bytes.len());
        Ok(object_url(&self.public_base_url, name))
    }
}

/// Keeps objects in memory. Used by tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failing: Arc<RwLock<bool>>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes uploads fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap_or_else(|p| p.into_inner()) = failing;
    }

    /// Returns a stored object by name.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .cloned()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn store(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<String> {
        if *self.failing.read().unwrap_or_else(|p| p.into_inner()) {
            return Err(BoardError::remote("object storage unavailable"));
        }
        let name = checked_object_name(suggested_name)?;
        self.objects
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name.to_string(), bytes);
        Ok(format!("memory://objects/{}", name))
    }
}
