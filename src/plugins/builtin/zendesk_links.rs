//! Zendesk links - answers `z123` style mentions with ticket URLs

use async_trait::async_trait;
use regex_lite::Regex;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::application::errors::{BotError, PluginError, PluginResult};
use crate::application::messaging::Connection;
use crate::domain::entities::{Event, EventKind, StateValue};
use crate::plugins::trait_def::BotPlugin;

pub const NAME: &str = "ZendeskLinks";
pub const DESCRIPTION: &str = "Posts support ticket links";

const DEFAULT_TICKETS_URL: &str = "http://unconfigured.zendesk-url.com/tickets/";
const DEFAULT_TICKET_LETTER: &str = "z";

#[derive(Debug)]
struct Settings {
    tickets_url: String,
    ticket_letter: String,
    pattern: Option<Regex>,
}

impl Settings {
    fn new(tickets_url: String, ticket_letter: String) -> Self {
        let pattern = ticket_pattern(&ticket_letter);
        Self { tickets_url, ticket_letter, pattern }
    }
}

fn ticket_pattern(letter: &str) -> Option<Regex> {
    let source = format!(r"\b{}([1-9][0-9]{{0,4}})\b", regex_lite::escape(letter));
    match Regex::new(&source) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Unusable ticket letter {:?}: {}", letter, e);
            None
        }
    }
}

#[derive(Debug)]
pub struct ZendeskLinks {
    settings: Mutex<Settings>,
}

impl Default for ZendeskLinks {
    fn default() -> Self {
        Self {
            settings: Mutex::new(Settings::new(
                DEFAULT_TICKETS_URL.to_string(),
                DEFAULT_TICKET_LETTER.to_string(),
            )),
        }
    }
}

impl ZendeskLinks {
    fn settings(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn references(&self, text: &str) -> Vec<String> {
        let settings = self.settings();
        let Some(pattern) = &settings.pattern else {
            return Vec::new();
        };
        pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| format!("{}{}", settings.tickets_url, m.as_str()))
            .collect()
    }
}

#[async_trait]
impl BotPlugin for ZendeskLinks {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> Option<&str> {
        Some(DESCRIPTION)
    }

    fn interesting_events(&self) -> PluginResult<Vec<EventKind>> {
        Ok(vec![EventKind::Privmsg, EventKind::Action])
    }

    fn save_state(&self) -> Option<StateValue> {
        let settings = self.settings();
        Some(
            StateValue::map()
                .with("tickets_url", settings.tickets_url.as_str())
                .with("ticket_letter", settings.ticket_letter.as_str()),
        )
    }

    fn load_state(&self, state: StateValue) -> PluginResult<()> {
        if state.as_map().is_none() {
            return Err(PluginError::State(format!("expected a map, got {}", state.type_name())));
        }
        let mut settings = self.settings();
        let url = state
            .get("tickets_url")
            .and_then(StateValue::as_str)
            .map_or_else(|| settings.tickets_url.clone(), str::to_string);
        let letter = state
            .get("ticket_letter")
            .and_then(StateValue::as_str)
            .map_or_else(|| settings.ticket_letter.clone(), str::to_string);
        *settings = Settings::new(url, letter);
        Ok(())
    }

    async fn on_event(&self, bot: &Connection, event: &Event) -> Result<(), BotError> {
        let (user, channel, text) = match event {
            Event::Privmsg { user, channel, message } => (user, channel, message),
            Event::Action { user, channel, data } => (user, channel, data),
            _ => return Ok(()),
        };
        for link in self.references(text) {
            bot.address_msg_with(user, channel, &link, false).await?;
        }
        Ok(())
    }
}
