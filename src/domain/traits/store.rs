use async_trait::async_trait;
use crate::application::errors::StorageError;
use crate::domain::entities::Snapshot;

/// Store trait - durable home of the single bot snapshot
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the snapshot; `Ok(None)` when nothing has been saved yet
    async fn load(&self) -> Result<Option<Snapshot>, StorageError>;

    /// Replace the stored snapshot
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}
