/*!
 * Resource Stores
 * Read-only access to payloads bundled with the host application
 */

use crate::core::errors::{ResourceError, ResourceResult};
use bytes::{Buf, Bytes};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Source of embedded payloads, keyed by name
pub trait ResourceStore: Send + Sync {
    /// Open a payload for streaming; `NotFound` when the name is unknown
    fn open(&self, name: &str) -> ResourceResult<Box<dyn Read + Send>>;

    /// Whether `name` can be opened
    fn contains(&self, name: &str) -> bool;
}

/// Payloads shipped as plain files in one directory
#[derive(Debug, Clone)]
pub struct BundleDirectory {
    root: PathBuf,
}

impl BundleDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ResourceStore for BundleDirectory {
    fn open(&self, name: &str) -> ResourceResult<Box<dyn Read + Send>> {
        let path = self.path_for(name);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ResourceError::NotFound(name.to_string()))
            }
            Err(e) => Err(ResourceError::io(path, e)),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }
}

/// Payloads compiled into the host binary (`include_bytes!`) or held in memory
#[derive(Debug, Default)]
pub struct EmbeddedStore {
    payloads: RwLock<HashMap<String, Bytes>>,
}

impl EmbeddedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_static(self, name: impl Into<String>, payload: &'static [u8]) -> Self {
        self.insert(name, Bytes::from_static(payload));
        self
    }

    pub fn with_payload(self, name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        self.insert(name, payload.into());
        self
    }

    pub fn insert(&self, name: impl Into<String>, payload: Bytes) {
        self.payloads.write().insert(name.into(), payload);
    }

    pub fn len(&self) -> usize {
        self.payloads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.read().is_empty()
    }
}

impl ResourceStore for EmbeddedStore {
    fn open(&self, name: &str) -> ResourceResult<Box<dyn Read + Send>> {
        // Bytes clones share the underlying buffer
        let payload = self
            .payloads
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))?;
        Ok(Box::new(payload.reader()))
    }

    fn contains(&self, name: &str) -> bool {
        self.payloads.read().contains_key(name)
    }
}
