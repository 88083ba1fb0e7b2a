//! Plugin trait definitions

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::application::errors::{BotError, PluginError, PluginResult};
use crate::application::messaging::Connection;
use crate::domain::entities::{CommandRequest, Event, EventKind, StateValue};

/// Core plugin trait that every enabled plugin instance implements
///
/// Instances are shared between the registry and in-flight handler tasks,
/// so mutable plugin state lives behind interior locks.
#[async_trait]
pub trait BotPlugin: Send + Sync {
    /// Unique identifier for the plugin
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> Option<&str> {
        None
    }

    /// Events this plugin wants to observe. Re-queried on every rescan.
    fn interesting_events(&self) -> PluginResult<Vec<EventKind>> {
        Ok(Vec::new())
    }

    /// Command verbs this plugin handles. Re-queried on every rescan.
    fn implemented_commands(&self) -> PluginResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// State worth persisting, or `None` for nothing to save
    fn save_state(&self) -> Option<StateValue> {
        None
    }

    /// Restore previously saved state. A fresh instance must work without it.
    fn load_state(&self, _state: StateValue) -> PluginResult<()> {
        Ok(())
    }

    /// Called for every event named in `interesting_events`
    async fn on_event(&self, _bot: &Connection, _event: &Event) -> Result<(), BotError> {
        Ok(())
    }

    /// Called for every command verb named in `implemented_commands`
    async fn on_command(&self, _bot: &Connection, _cmd: &CommandRequest) -> Result<(), BotError> {
        Ok(())
    }

    /// Optional: Cleanup resources when the plugin is disabled
    fn shutdown(&self) {}
}

/// A discoverable plugin implementation (the "known" phase)
pub trait PluginFactory: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Instantiate the plugin
    fn create(&self) -> PluginResult<Arc<dyn BotPlugin>>;
}

type Constructor = Box<dyn Fn() -> PluginResult<Arc<dyn BotPlugin>> + Send + Sync>;

/// Factory backed by a constructor closure
pub struct FnFactory {
    name: String,
    description: String,
    constructor: Constructor,
}

impl FnFactory {
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> PluginResult<Arc<dyn BotPlugin>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            constructor: Box::new(constructor),
        }
    }

    /// Factory for a plugin type with a `Default` constructor
    pub fn of<P>(name: impl Into<String>) -> Self
    where
        P: BotPlugin + Default + 'static,
    {
        Self::new(name, || Ok(Arc::new(P::default()) as Arc<dyn BotPlugin>))
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

impl PluginFactory for FnFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn create(&self) -> PluginResult<Arc<dyn BotPlugin>> {
        let plugin = (self.constructor)()?;
        if plugin.name() != self.name {
            return Err(PluginError::Load(format!(
                "factory '{}' produced plugin named '{}'",
                self.name,
                plugin.name()
            )));
        }
        Ok(plugin)
    }
}

impl fmt::Debug for FnFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory").field("name", &self.name).finish()
    }
}

/// Plugin information for listing
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
}
