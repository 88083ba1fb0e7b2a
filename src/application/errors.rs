//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Shutdown requested")]
    Shutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Plugin lifecycle and registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("Failed to load plugin: {0}")]
    Load(String),

    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Plugin not enabled: {0}")]
    NotEnabled(String),

    #[error("Plugin '{0}' already registered")]
    Duplicate(String),

    #[error("Invalid plugin state: {0}")]
    State(String),

    #[error("Plugin query failed: {0}")]
    Query(String),
}

pub type PluginResult<T> = Result<T, PluginError>;

/// Command line parsing errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
