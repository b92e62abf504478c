//! Local device identity.
//!
//! A device id is an opaque string created once and reused afterwards. It is
//! stored as the author id on posts and comments and compared later to decide
//! whether to offer the delete control. Nothing on the store side checks it.

use crate::error::{BoardError, Result};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Get-or-create access to this device's identifier.
pub trait DeviceIdentity: Send + Sync {
    fn device_id(&self) -> Result<String>;
}

/// Generates a fresh device id.
pub fn generate_device_id() -> String {
    format!("device-{}", Uuid::new_v4().simple())
}

/// A fixed identifier (a browser session, or a test).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDeviceIdentity(String);

impl StaticDeviceIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl DeviceIdentity for StaticDeviceIdentity {
    fn device_id(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Identifier persisted in a file, created on first use.
#[derive(Debug)]
pub struct FileDeviceIdentity {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileDeviceIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    fn load_or_create(&self) -> Result<String> {
        if self.path.exists() {
            let stored = std::fs::read_to_string(&self.path)?;
            let stored = stored.trim();
            if !stored.is_empty() {
                return Ok(stored.to_string());
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let id = generate_device_id();
        std::fs::write(&self.path, &id).map_err(|e| {
            BoardError::storage(format!("Failed to persist device id: {}", e))
        })?;
        info!("Created device id at {:?}", self.path);
        Ok(id)
    }
}

impl DeviceIdentity for FileDeviceIdentity {
    fn device_id(&self) -> Result<String> {
        if let Some(id) = self.cached.read().unwrap_or_else(|p| p.into_inner()).as_ref() {
            return Ok(id.clone());
        }
        let mut cached = self.cached.write().unwrap_or_else(|p| p.into_inner());
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }
        let id = self.load_or_create()?;
        *cached = Some(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_identity_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("device_id");

        let first = FileDeviceIdentity::new(&path).device_id().unwrap();
        assert!(first.starts_with("device-"));

        let again = FileDeviceIdentity::new(&path).device_id().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_empty_file_is_regenerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("device_id");
        std::fs::write(&path, "  \n").unwrap();

        let id = FileDeviceIdentity::new(&path).device_id().unwrap();
        assert!(!id.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), id);
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_device_id(), generate_device_id());
        let fixed = StaticDeviceIdentity::new("abc");
        assert_eq!(fixed.device_id().unwrap(), "abc");
    }
}
