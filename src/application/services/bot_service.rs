//! Bot service - State that outlives any single connection
//!
//! Owns the identity, the plugin registry, the privilege map and the
//! snapshot store. Each new [`Connection`] is bound to it.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

use crate::application::errors::BotError;
use crate::application::messaging::Connection;
use crate::domain::entities::snapshot::SNAPSHOT_VERSION;
use crate::domain::entities::{Identity, Snapshot};
use crate::domain::traits::SnapshotStore;
use crate::plugins::PluginRegistry;
use super::auth::AuthMap;

pub struct BotService {
    identity: RwLock<Identity>,
    registry: Arc<PluginRegistry>,
    auth: RwLock<AuthMap>,
    store: Arc<dyn SnapshotStore>,
    live: RwLock<Option<Arc<Connection>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl BotService {
    pub fn new(identity: Identity, registry: Arc<PluginRegistry>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            identity: RwLock::new(identity),
            registry,
            auth: RwLock::new(AuthMap::new()),
            store,
            live: RwLock::new(None),
        }
    }

    pub fn identity(&self) -> Identity {
        read(&self.identity).clone()
    }

    /// Takes effect on the next connection
    pub fn set_identity(&self, identity: Identity) {
        *write(&self.identity) = identity;
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    // Privileges

    pub fn grant(&self, mask: &str, privilege: &str) -> bool {
        write(&self.auth).grant(mask, privilege)
    }

    pub fn revoke(&self, mask: &str, privilege: &str) -> bool {
        write(&self.auth).revoke(mask, privilege)
    }

    pub fn holders(&self, privilege: &str) -> BTreeSet<String> {
        read(&self.auth).holders(privilege)
    }

    pub fn principal_has(&self, principal: &str, privilege: &str) -> bool {
        read(&self.auth).principal_has(principal, privilege)
    }

    pub fn principal_has_in_channel(&self, channel: &str, principal: &str, privilege: &str) -> bool {
        read(&self.auth).principal_has_in_channel(channel, principal, privilege)
    }

    pub fn privileges(&self) -> BTreeMap<String, BTreeSet<String>> {
        read(&self.auth).to_map()
    }

    // Live connection

    /// Record `conn` as the live session, superseding any earlier one
    pub fn set_live(&self, conn: Arc<Connection>) {
        *write(&self.live) = Some(conn);
    }

    /// Forget `conn` if it is still the live session
    pub fn clear_live(&self, conn: &Arc<Connection>) {
        let mut live = write(&self.live);
        if live.as_ref().is_some_and(|c| Arc::ptr_eq(c, conn)) {
            *live = None;
        }
    }

    pub fn live(&self) -> Option<Arc<Connection>> {
        read(&self.live).clone()
    }

    // Persistence

    /// Assemble a snapshot of everything worth keeping. Plugins stay enabled.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new(self.identity());
        snapshot.saved_at = Some(Utc::now());
        snapshot.plugins_enabled = self.registry.enabled_names();
        snapshot.plugin_states = self.registry.harvest_states();
        snapshot.privileges = self.privileges();
        snapshot
    }

    /// Write the current snapshot to the store
    pub async fn save(&self) -> Result<(), BotError> {
        let snapshot = self.snapshot();
        self.store.save(&snapshot).await?;
        info!(
            "Saved state: {} plugins enabled, {} privileges",
            snapshot.plugins_enabled.len(),
            snapshot.privileges.len()
        );
        Ok(())
    }

    /// Restore from the store. A missing or unreadable snapshot leaves the
    /// defaults in place. Returns whether a snapshot was applied.
    pub async fn load(&self) -> bool {
        let snapshot = match self.store.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!("No saved state found, starting fresh");
                return false;
            }
            Err(e) => {
                warn!("Could not read saved state, starting fresh: {}", e);
                return false;
            }
        };
        self.apply(snapshot);
        true
    }

    fn apply(&self, snapshot: Snapshot) {
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                "Saved state has version {}, expected {}; loading anyway",
                snapshot.version, SNAPSHOT_VERSION
            );
        }

        self.set_identity(snapshot.identity);
        write(&self.auth).load(snapshot.privileges);
        self.registry.set_saved_states(snapshot.plugin_states);

        for name in &snapshot.plugins_enabled {
            if let Err(e) = self.registry.enable_by_name(name) {
                error!("Problem enabling saved plugin {}: {}", name, e);
            }
        }
        info!("Loaded state: {} plugins enabled", snapshot.plugins_enabled.len());
    }

    /// Final save, then let every plugin clean up
    pub async fn shutdown(&self) -> Result<(), BotError> {
        let saved = self.save().await;
        if let Some(conn) = self.live() {
            if let Err(e) = conn.transport().disconnect("shutting down").await {
                warn!("Error closing connection: {}", e);
            }
            self.clear_live(&conn);
        }
        self.registry.shutdown_all();
        saved
    }
}
