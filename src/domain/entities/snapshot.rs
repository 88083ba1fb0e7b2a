use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::StateValue;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Base identity handed to every new connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Identity {
    pub nickname: String,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub command_prefix: Option<String>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            nickname: "cassbot".to_string(),
            channels: Vec::new(),
            command_prefix: None,
        }
    }
}

/// The single durable record written on save and read once on startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    pub identity: Identity,
    /// Enabled plugin names, in enable order
    #[serde(default)]
    pub plugins_enabled: Vec<String>,
    #[serde(default)]
    pub plugin_states: BTreeMap<String, StateValue>,
    /// Privilege name -> masks holding it directly
    #[serde(default)]
    pub privileges: BTreeMap<String, BTreeSet<String>>,
}

impl Snapshot {
    pub fn new(identity: Identity) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: None,
            identity,
            plugins_enabled: Vec::new(),
            plugin_states: BTreeMap::new(),
            privileges: BTreeMap::new(),
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(Identity::default())
    }
}
