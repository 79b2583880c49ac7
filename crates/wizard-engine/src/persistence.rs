//! Draft snapshots and the stores that hold them.
//!
//! The engine never fails because of its store: unreadable or malformed
//! snapshots are treated as absent, and failed writes are logged.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;
use wizard_spec::{FormData, StepId};

use crate::error::StoreError;

/// Raw key/value access to wherever drafts live.
pub trait PersistenceAdapter: Send {
    fn read(&self, namespace: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, namespace: &str, payload: &str) -> Result<(), StoreError>;
    fn clear(&self, namespace: &str) -> Result<(), StoreError>;
}

/// The persisted `{currentStepId, data}` pair. Deliberately versionless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub current_step_id: StepId,
    pub data: FormData,
}

impl Snapshot {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Process-local store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(namespace).cloned())
    }

    pub fn insert(&self, namespace: impl Into<String>, payload: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(namespace.into(), payload.into());
        }
    }
}

impl PersistenceAdapter for MemoryStore {
    fn read(&self, namespace: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Lock)?;
        Ok(entries.get(namespace).cloned())
    }

    fn write(&self, namespace: &str, payload: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Lock)?;
        entries.insert(namespace.to_string(), payload.to_string());
        Ok(())
    }

    fn clear(&self, namespace: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Lock)?;
        entries.remove(namespace);
        Ok(())
    }
}

/// One JSON file per namespace inside `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, namespace: &str) -> PathBuf {
        let file_name: String = namespace
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

impl PersistenceAdapter for FileStore {
    fn read(&self, namespace: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(namespace)) {
            Ok(payload) => Ok(Some(payload)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, namespace: &str, payload: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(namespace), payload)?;
        Ok(())
    }

    fn clear(&self, namespace: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(namespace)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Typed, failure-swallowing view of an adapter scoped to one namespace.
pub(crate) struct DraftStore {
    adapter: Box<dyn PersistenceAdapter>,
    namespace: String,
    enabled: bool,
}

impl DraftStore {
    pub(crate) fn new(adapter: Box<dyn PersistenceAdapter>, namespace: String, enabled: bool) -> Self {
        Self {
            adapter,
            namespace,
            enabled,
        }
    }

    pub(crate) fn load(&self) -> Option<Snapshot> {
        if !self.enabled {
            return None;
        }
        let payload = match self.adapter.read(&self.namespace) {
            Ok(payload) => payload?,
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "draft read failed; starting fresh");
                return None;
            }
        };
        match Snapshot::parse(&payload) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "discarding malformed draft");
                None
            }
        }
    }

    pub(crate) fn save(&self, snapshot: &Snapshot) {
        if !self.enabled {
            return;
        }
        let payload = match snapshot.to_json() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "draft encode failed");
                return;
            }
        };
        if let Err(err) = self.adapter.write(&self.namespace, &payload) {
            warn!(namespace = %self.namespace, error = %err, "draft write failed");
        }
    }

    pub(crate) fn clear(&self) {
        if !self.enabled {
            return;
        }
        if let Err(err) = self.adapter.clear(&self.namespace) {
            warn!(namespace = %self.namespace, error = %err, "draft clear failed");
        }
    }
}
