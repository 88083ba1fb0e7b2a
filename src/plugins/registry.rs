//! Plugin registry - enabled plugins and the event/command indexes built
//! from them.
//!
//! The indexes are rebuilt wholesale by [`PluginRegistry::rescan`] after
//! every enable/disable/reload. No plugin code ever runs while the internal
//! lock is held, so plugins may call back into the registry (even from
//! their interest queries during a scan).

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

use crate::application::errors::{PluginError, PluginResult};
use crate::domain::entities::{EventKind, StateValue};
use super::catalog::PluginCatalog;
use super::trait_def::{BotPlugin, PluginFactory, PluginInfo};

/// Result of [`PluginRegistry::enable_by_name`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    /// Instantiated and indexed
    Enabled,
    /// Was already running; nothing changed
    AlreadyEnabled,
    /// No implementation found yet; the name is reserved and will be
    /// activated by a later rescan
    Pending,
}

enum Slot {
    /// Enabled but no implementation discovered
    Pending,
    /// Being instantiated outside the lock
    Loading,
    Loaded(Arc<dyn BotPlugin>),
}

struct Entry {
    name: String,
    slot: Slot,
}

#[derive(Default)]
struct Indexes {
    events: HashMap<EventKind, Vec<Arc<dyn BotPlugin>>>,
    commands: HashMap<String, Vec<Arc<dyn BotPlugin>>>,
}

#[derive(Default)]
struct RegistryInner {
    /// Enable order
    enabled: Vec<Entry>,
    /// Last harvested state per plugin name, including disabled plugins
    saved_states: BTreeMap<String, StateValue>,
    indexes: Indexes,
    scanning: bool,
    scan_again: bool,
    passes: u64,
}

impl RegistryInner {
    fn entry(&self, name: &str) -> Option<&Entry> {
        self.enabled.iter().find(|e| e.name == name)
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.enabled.iter_mut().find(|e| e.name == name)
    }

    fn reserve(&mut self, name: &str) {
        if self.entry(name).is_none() {
            self.enabled.push(Entry { name: name.to_string(), slot: Slot::Pending });
        }
    }

    fn loaded(&self) -> Vec<Arc<dyn BotPlugin>> {
        self.enabled
            .iter()
            .filter_map(|e| match &e.slot {
                Slot::Loaded(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Registry for enabled plugins
pub struct PluginRegistry {
    catalog: Arc<dyn PluginCatalog>,
    inner: Mutex<RegistryInner>,
}

/// Clears the in-progress flag even if a plugin panics mid-scan
struct ScanGuard<'a>(&'a PluginRegistry);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.scanning = false;
        inner.scan_again = false;
    }
}

impl PluginRegistry {
    pub fn new(catalog: Arc<dyn PluginCatalog>) -> Self {
        Self {
            catalog,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current discoverable implementations. Later duplicates of a name are
    /// a configuration error and are dropped.
    pub fn discover(&self) -> Vec<Arc<dyn PluginFactory>> {
        let mut found: Vec<Arc<dyn PluginFactory>> = Vec::new();
        for factory in self.catalog.discover() {
            if found.iter().any(|f| f.name() == factory.name()) {
                error!("Duplicate plugin name '{}' in discovery, ignoring later one", factory.name());
                continue;
            }
            found.push(factory);
        }
        found
    }

    fn find_factory(&self, name: &str) -> Option<Arc<dyn PluginFactory>> {
        self.discover().into_iter().find(|f| f.name() == name)
    }

    /// Hand any saved state to a fresh instance. Failures are logged and the
    /// plugin keeps its default state.
    fn restore(&self, plugin: &Arc<dyn BotPlugin>) {
        let state = self.lock().saved_states.get(plugin.name()).cloned();
        if let Some(state) = state {
            info!("Loading state for plugin {}", plugin.name());
            if let Err(e) = plugin.load_state(state) {
                error!(plugin = %plugin.name(), "Failed to restore plugin state: {}", e);
            }
        }
    }

    fn instantiate(&self, factory: &Arc<dyn PluginFactory>) -> PluginResult<Arc<dyn BotPlugin>> {
        info!("Instantiating plugin {}", factory.name());
        let plugin = factory.create()?;
        self.restore(&plugin);
        Ok(plugin)
    }

    /// Enable a plugin by name; reserve the name if no implementation is
    /// currently discoverable.
    pub fn enable_by_name(&self, name: &str) -> PluginResult<EnableOutcome> {
        {
            let mut inner = self.lock();
            match inner.entry(name).map(|e| &e.slot) {
                Some(Slot::Loaded(_)) => return Ok(EnableOutcome::AlreadyEnabled),
                // someone further up the stack is already instantiating it
                Some(Slot::Loading) => return Ok(EnableOutcome::Pending),
                Some(Slot::Pending) | None => {}
            }
            inner.reserve(name);
        }

        let Some(factory) = self.find_factory(name) else {
            info!("Plugin {} marked for loading once it is found", name);
            self.rescan();
            return Ok(EnableOutcome::Pending);
        };

        if let Some(entry) = self.lock().entry_mut(name) {
            entry.slot = Slot::Loading;
        }

        let plugin = match self.instantiate(&factory) {
            Ok(plugin) => plugin,
            Err(e) => {
                error!("Problem loading plugin {}: {}", name, e);
                if let Some(entry) = self.lock().entry_mut(name) {
                    entry.slot = Slot::Pending;
                }
                return Err(e);
            }
        };

        let installed = {
            let mut inner = self.lock();
            match inner.entry_mut(name) {
                Some(entry) => {
                    entry.slot = Slot::Loaded(plugin.clone());
                    true
                }
                None => false,
            }
        };
        if !installed {
            // disabled while we were instantiating
            plugin.shutdown();
            return Err(PluginError::NotEnabled(name.to_string()));
        }

        info!("Plugin {} enabled", name);
        self.rescan();
        Ok(EnableOutcome::Enabled)
    }

    /// Disable a plugin, keeping its state for a later enable. Also drops a
    /// pending reservation. Returns false if the name was not enabled.
    pub fn disable_by_name(&self, name: &str) -> bool {
        let removed = {
            let mut inner = self.lock();
            let pos = inner.enabled.iter().position(|e| e.name == name);
            pos.map(|i| inner.enabled.remove(i))
        };
        let Some(entry) = removed else {
            return false;
        };

        match entry.slot {
            Slot::Loaded(plugin) => {
                info!("Disabling plugin {}. Saving state.", name);
                self.harvest(&plugin);
                plugin.shutdown();
            }
            Slot::Pending | Slot::Loading => {
                info!("Dropping reservation for plugin {}", name);
            }
        }

        self.rescan();
        true
    }

    /// Replace a running plugin with a fresh instance from its current
    /// implementation. On failure the running instance is left untouched.
    pub fn reload(&self, name: &str) -> PluginResult<()> {
        let old = {
            let inner = self.lock();
            match inner.entry(name).map(|e| &e.slot) {
                Some(Slot::Loaded(p)) => Some(p.clone()),
                Some(_) => None,
                None => return Err(PluginError::NotEnabled(name.to_string())),
            }
        };
        let Some(old) = old else {
            return self.enable_by_name(name).map(|_| ());
        };

        let factory = self
            .find_factory(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        let fresh = factory.create()?;

        self.harvest(&old);
        self.restore(&fresh);

        let swapped = {
            let mut inner = self.lock();
            match inner.entry_mut(name) {
                Some(entry) if matches!(&entry.slot, Slot::Loaded(p) if Arc::ptr_eq(p, &old)) => {
                    entry.slot = Slot::Loaded(fresh.clone());
                    true
                }
                _ => false,
            }
        };
        if !swapped {
            fresh.shutdown();
            return Err(PluginError::NotEnabled(name.to_string()));
        }

        old.shutdown();
        info!("Plugin {} reloaded", name);
        self.rescan();
        Ok(())
    }

    fn harvest(&self, plugin: &Arc<dyn BotPlugin>) {
        let state = plugin.save_state();
        let mut inner = self.lock();
        match state {
            Some(state) => {
                inner.saved_states.insert(plugin.name().to_string(), state);
            }
            None => {
                inner.saved_states.remove(plugin.name());
            }
        }
    }

    /// Ask every running plugin for its current state, without disabling
    /// anything. Returns all retained state blobs.
    pub fn harvest_states(&self) -> BTreeMap<String, StateValue> {
        let plugins = self.lock().loaded();
        for plugin in &plugins {
            self.harvest(plugin);
        }
        self.lock().saved_states.clone()
    }

    /// Replace retained state blobs, e.g. from a loaded snapshot
    pub fn set_saved_states(&self, states: BTreeMap<String, StateValue>) {
        self.lock().saved_states = states;
    }

    pub fn saved_state(&self, name: &str) -> Option<StateValue> {
        self.lock().saved_states.get(name).cloned()
    }

    /// Rebuild both indexes from the enabled plugins.
    ///
    /// A rescan requested while one is running is folded into the running
    /// one, which loops until a pass completes with no new request.
    pub fn rescan(&self) {
        {
            let mut inner = self.lock();
            if inner.scanning {
                inner.scan_again = true;
                return;
            }
            inner.scanning = true;
        }
        let _guard = ScanGuard(self);

        loop {
            self.lock().scan_again = false;
            self.scan_once();
            if !self.lock().scan_again {
                break;
            }
            debug!("Rescan requested during scan, scanning again");
        }
    }

    fn scan_once(&self) {
        let factories = self.discover();

        let to_activate: Vec<(String, Arc<dyn PluginFactory>)> = {
            let mut inner = self.lock();
            let mut found = Vec::new();
            for entry in inner.enabled.iter_mut() {
                if !matches!(entry.slot, Slot::Pending) {
                    continue;
                }
                if let Some(f) = factories.iter().find(|f| f.name() == entry.name) {
                    entry.slot = Slot::Loading;
                    found.push((entry.name.clone(), f.clone()));
                }
            }
            found
        };

        for (name, factory) in to_activate {
            info!("Loading plugin {} (first time)...", name);
            match self.instantiate(&factory) {
                Ok(plugin) => {
                    let installed = {
                        let mut inner = self.lock();
                        match inner.entry_mut(&name) {
                            Some(entry) if matches!(entry.slot, Slot::Loading) => {
                                entry.slot = Slot::Loaded(plugin.clone());
                                true
                            }
                            _ => false,
                        }
                    };
                    if !installed {
                        plugin.shutdown();
                    }
                }
                Err(e) => {
                    error!("Problem loading plugin {}: {}", name, e);
                    let mut inner = self.lock();
                    if let Some(entry) = inner.entry_mut(&name) {
                        if matches!(entry.slot, Slot::Loading) {
                            entry.slot = Slot::Pending;
                        }
                    }
                }
            }
        }

        let plugins = self.lock().loaded();
        let mut indexes = Indexes::default();

        for plugin in &plugins {
            if let Some(mut kinds) = query(plugin, "interesting_events", |p| p.interesting_events()) {
                kinds.sort();
                kinds.dedup();
                for kind in kinds {
                    indexes.events.entry(kind).or_default().push(plugin.clone());
                }
            }
            if let Some(verbs) = query(plugin, "implemented_commands", |p| p.implemented_commands()) {
                let mut verbs: Vec<String> = verbs.into_iter().map(|v| v.to_lowercase()).collect();
                verbs.sort();
                verbs.dedup();
                for verb in verbs {
                    indexes.commands.entry(verb).or_default().push(plugin.clone());
                }
            }
        }

        let mut inner = self.lock();
        inner.indexes = indexes;
        inner.passes += 1;
    }

    /// Call every running plugin's shutdown hook. Plugins stay enabled so a
    /// snapshot taken afterwards still lists them.
    pub fn shutdown_all(&self) {
        let plugins = self.lock().loaded();
        for plugin in plugins {
            debug!("Shutting down plugin {}", plugin.name());
            plugin.shutdown();
        }
    }

    /// Plugins subscribed to `kind`, in enable order
    pub fn subscribers(&self, kind: EventKind) -> Vec<Arc<dyn BotPlugin>> {
        self.lock().indexes.events.get(&kind).cloned().unwrap_or_default()
    }

    /// Plugins implementing `verb` (case-insensitive), in enable order
    pub fn command_handlers(&self, verb: &str) -> Vec<Arc<dyn BotPlugin>> {
        self.lock()
            .indexes
            .commands
            .get(&verb.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BotPlugin>> {
        match self.lock().entry(name).map(|e| &e.slot) {
            Some(Slot::Loaded(p)) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every discoverable implementation, sorted by name
    pub fn list_available(&self) -> Vec<PluginInfo> {
        let mut infos: Vec<PluginInfo> = self
            .discover()
            .iter()
            .map(|f| PluginInfo {
                name: f.name().to_string(),
                description: f.description().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Running plugins, in enable order
    pub fn list_enabled(&self) -> Vec<String> {
        self.lock()
            .enabled
            .iter()
            .filter(|e| matches!(e.slot, Slot::Loaded(_)))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Enabled names with no implementation found yet
    pub fn list_missing(&self) -> Vec<String> {
        self.lock()
            .enabled
            .iter()
            .filter(|e| !matches!(e.slot, Slot::Loaded(_)))
            .map(|e| e.name.clone())
            .collect()
    }

    /// All enabled names, running or reserved, in enable order
    pub fn enabled_names(&self) -> Vec<String> {
        self.lock().enabled.iter().map(|e| e.name.clone()).collect()
    }

    /// Number of completed scan passes since creation
    pub fn scan_passes(&self) -> u64 {
        self.lock().passes
    }
}

/// Run one capability query, containing errors and panics to this plugin
fn query<T>(
    plugin: &Arc<dyn BotPlugin>,
    what: &str,
    f: impl FnOnce(&dyn BotPlugin) -> PluginResult<T>,
) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(|| f(plugin.as_ref()))) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!(plugin = %plugin.name(), "Exception in plugin {} for {} request: {}", plugin.name(), what, e);
            None
        }
        Err(_) => {
            error!(plugin = %plugin.name(), "Plugin {} panicked during {} request", plugin.name(), what);
            None
        }
    }
}
