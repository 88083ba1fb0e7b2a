//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::application::messaging::parser::split_words;
use crate::application::services::Backoff;
use crate::domain::entities::Identity;

/// Bot configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    /// Server address handed to the connector
    pub server: String,
    pub state_file: PathBuf,
    pub plugins: PluginsConfig,
    /// Mask granted the `admin` privilege at startup
    pub admin: Option<String>,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub nickname: String,
    pub channels: Vec<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginsConfig {
    /// Enabled at startup, after any saved state is loaded
    pub autoload: Vec<String>,
    /// Periodic rescan so newly discoverable plugins get picked up; 0 disables
    pub scan_period_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            server: "console".to_string(),
            state_file: PathBuf::from("cassbot.state.json"),
            plugins: PluginsConfig::default(),
            admin: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nickname: "cassbot".to_string(),
            channels: Vec::new(),
            prefix: None,
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            autoload: vec!["Admin".to_string()],
            scan_period_secs: 240,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 300_000,
            factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.factor,
        )
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.nickname.trim().is_empty() {
            return Err(ConfigError::MissingField("bot.nickname".to_string()));
        }
        if self.bot.nickname.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(format!(
                "bot.nickname {:?} contains whitespace",
                self.bot.nickname
            )));
        }
        Ok(())
    }

    /// Defaults overridden by the process environment
    pub fn load_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `CASSBOT_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(nickname) = lookup("CASSBOT_NICKNAME") {
            self.bot.nickname = nickname;
        }
        if let Some(channels) = lookup("CASSBOT_CHANNELS") {
            self.bot.channels = split_words(&channels)
                .map_err(|e| ConfigError::InvalidValue(format!("CASSBOT_CHANNELS: {}", e)))?;
        }
        if let Some(server) = lookup("CASSBOT_SERVER") {
            self.server = server;
        }
        if let Some(state_file) = lookup("CASSBOT_STATEFILE") {
            self.state_file = PathBuf::from(state_file);
        }
        if let Some(prefix) = lookup("CASSBOT_PREFIX") {
            self.bot.prefix = Some(prefix).filter(|p| !p.is_empty());
        }
        if let Some(admin) = lookup("CASSBOT_ADMIN") {
            self.admin = Some(admin).filter(|a| !a.is_empty());
        }
        self.validate()
    }

    /// Identity used until a saved snapshot says otherwise
    pub fn identity(&self) -> Identity {
        Identity {
            nickname: self.bot.nickname.clone(),
            channels: self.bot.channels.clone(),
            command_prefix: self.bot.prefix.clone(),
        }
    }
}
