//! Plugin discovery - the set of implementations the host can instantiate

use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::application::errors::{PluginError, PluginResult};
use super::trait_def::PluginFactory;

/// Source of discoverable plugin implementations
///
/// May return a different set on every call; the registry re-asks on each
/// rescan.
pub trait PluginCatalog: Send + Sync {
    fn discover(&self) -> Vec<Arc<dyn PluginFactory>>;
}

/// Explicit registration list
#[derive(Default)]
pub struct StaticCatalog {
    factories: RwLock<Vec<Arc<dyn PluginFactory>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Names must be unique.
    pub fn register<F: PluginFactory + 'static>(&self, factory: F) -> PluginResult<()> {
        self.register_arc(Arc::new(factory))
    }

    pub fn register_arc(&self, factory: Arc<dyn PluginFactory>) -> PluginResult<()> {
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.iter().any(|f| f.name() == factory.name()) {
            return Err(PluginError::Duplicate(factory.name().to_string()));
        }
        info!("Registering plugin: {}", factory.name());
        factories.push(factory);
        Ok(())
    }

    /// Replace the factory registered under the same name, e.g. after an
    /// implementation was rebuilt. Returns false if nothing was replaced.
    pub fn replace(&self, factory: Arc<dyn PluginFactory>) -> bool {
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        match factories.iter_mut().find(|f| f.name() == factory.name()) {
            Some(slot) => {
                *slot = factory;
                true
            }
            None => false,
        }
    }

    /// Forget a factory. Returns false if it was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        let before = factories.len();
        factories.retain(|f| f.name() != name);
        factories.len() != before
    }
}

impl PluginCatalog for StaticCatalog {
    fn discover(&self) -> Vec<Arc<dyn PluginFactory>> {
        self.factories.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::trait_def::{BotPlugin, FnFactory};

    #[derive(Default)]
    struct Quiet;

    impl BotPlugin for Quiet {
        fn name(&self) -> &str {
            "Quiet"
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let catalog = StaticCatalog::new();
        catalog.register(FnFactory::of::<Quiet>("Quiet")).unwrap();
        let err = catalog.register(FnFactory::of::<Quiet>("Quiet")).unwrap_err();
        assert_eq!(err, PluginError::Duplicate("Quiet".into()));
        assert_eq!(catalog.discover().len(), 1);
    }

    #[test]
    fn test_unregister_and_replace() {
        let catalog = StaticCatalog::new();
        catalog.register(FnFactory::of::<Quiet>("Quiet")).unwrap();
        assert!(catalog.replace(Arc::new(FnFactory::of::<Quiet>("Quiet").with_description("v2"))));
        assert_eq!(catalog.discover()[0].description(), "v2");
        assert!(catalog.unregister("Quiet"));
        assert!(!catalog.unregister("Quiet"));
        assert!(catalog.discover().is_empty());
    }
}
