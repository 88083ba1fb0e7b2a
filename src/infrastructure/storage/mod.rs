//! File-based snapshot storage

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::errors::StorageError;
use crate::domain::entities::{Snapshot, StateValue};
use crate::domain::traits::SnapshotStore;

const PLUGIN_STATES_KEY: &str = "plugin-states";

/// Keeps the snapshot as one JSON document. Writes go to a sibling temp
/// file first and are renamed into place. Plugin state blobs are decoded
/// one by one on load; an unreadable blob is skipped with a warning.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn decode(content: &str) -> Result<Snapshot, StorageError> {
    let mut document: Value = serde_json::from_str(content)?;
    let states = document
        .as_object_mut()
        .and_then(|fields| fields.remove(PLUGIN_STATES_KEY));
    let mut snapshot: Snapshot = serde_json::from_value(document)?;

    match states {
        None | Some(Value::Null) => {}
        Some(Value::Object(states)) => {
            for (name, raw) in states {
                match serde_json::from_value::<StateValue>(raw) {
                    Ok(state) => {
                        snapshot.plugin_states.insert(name, state);
                    }
                    Err(e) => warn!(plugin = %name, "Skipping unreadable saved state for plugin {}: {}", name, e),
                }
            }
        }
        Some(other) => warn!("Ignoring saved plugin states: expected an object, got {}", other),
    }
    Ok(snapshot)
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = decode(&content)?;
        debug!("Read snapshot from {}", self.path.display());
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!("Wrote snapshot to {}", self.path.display());
        Ok(())
    }
}
