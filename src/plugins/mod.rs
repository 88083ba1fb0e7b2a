//! Plugin system for cassbot
//!
//! Plugins implement [`BotPlugin`]; a [`PluginCatalog`] says which ones can
//! be instantiated, and the [`PluginRegistry`] tracks the enabled ones and
//! indexes them by event and command.

pub mod builtin;
pub mod catalog;
pub mod registry;
pub mod trait_def;

pub use catalog::{PluginCatalog, StaticCatalog};
pub use registry::{EnableOutcome, PluginRegistry};
pub use trait_def::{BotPlugin, FnFactory, PluginFactory, PluginInfo};
