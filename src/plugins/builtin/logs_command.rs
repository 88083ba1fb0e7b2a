//! `logs` command - tells people where the channel logs live

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use crate::application::errors::{BotError, PluginResult};
use crate::application::messaging::Connection;
use crate::domain::entities::{CommandRequest, StateValue};
use crate::plugins::trait_def::BotPlugin;

pub const NAME: &str = "LogsCommand";
pub const DESCRIPTION: &str = "Tells people where the logs are";

const DEFAULT_LOGS_URL: &str = "http://www.eflorenzano.com/cassbot/";

#[derive(Debug)]
pub struct LogsCommand {
    logs_url: Mutex<String>,
}

impl Default for LogsCommand {
    fn default() -> Self {
        Self { logs_url: Mutex::new(DEFAULT_LOGS_URL.to_string()) }
    }
}

impl LogsCommand {
    pub fn logs_url(&self) -> String {
        self.logs_url.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl BotPlugin for LogsCommand {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> Option<&str> {
        Some(DESCRIPTION)
    }

    fn implemented_commands(&self) -> PluginResult<Vec<String>> {
        Ok(vec!["logs".to_string()])
    }

    fn save_state(&self) -> Option<StateValue> {
        Some(StateValue::map().with("logs_url", self.logs_url()))
    }

    fn load_state(&self, state: StateValue) -> PluginResult<()> {
        if let Some(url) = state.get("logs_url").and_then(StateValue::as_str) {
            *self.logs_url.lock().unwrap_or_else(PoisonError::into_inner) = url.to_string();
        }
        Ok(())
    }

    async fn on_command(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        bot.reply(req, &self.logs_url()).await
    }
}
