//! Link checker - answers `#1234` and `r5678` mentions with tracker links

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::application::errors::{BotError, PluginError, PluginResult};
use crate::application::messaging::Connection;
use crate::domain::entities::{Event, EventKind, StateValue};
use crate::plugins::trait_def::BotPlugin;

pub const NAME: &str = "LinkChecker";
pub const DESCRIPTION: &str = "Posts issue tracker and revision links";

/// `#N` only counts above this; `##N` always counts
const LOW_TICKET_CUTOFF: u64 = 10;

static TICKET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[\]\s\[(){}<>/:",-])(#{1,2})(\d+)\b"#).expect("ticket pattern is valid")
});

static COMMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\br(\d+)\b").expect("revision pattern is valid"));

/// URL templates; `{id}` is replaced by the number
#[derive(Debug, Clone, PartialEq, Eq)]
struct Templates {
    ticket_url: String,
    commit_url: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            ticket_url: "https://issues.apache.org/jira/browse/CASSANDRA-{id}".to_string(),
            commit_url: "https://svn.apache.org/viewvc?view=rev&revision={id}".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LinkChecker {
    templates: Mutex<Templates>,
}

impl LinkChecker {
    fn templates(&self) -> MutexGuard<'_, Templates> {
        self.templates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Links for every ticket reference, then every revision reference
    pub fn links(&self, text: &str) -> Vec<String> {
        let templates = self.templates().clone();
        let mut links = Vec::new();

        for caps in TICKET_RE.captures_iter(text) {
            let Some(ticket) = caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok()) else {
                continue;
            };
            let doubled = caps.get(1).is_some_and(|m| m.as_str() == "##");
            if ticket > LOW_TICKET_CUTOFF || doubled {
                links.push(templates.ticket_url.replace("{id}", &ticket.to_string()));
            }
        }
        for caps in COMMIT_RE.captures_iter(text) {
            if let Some(rev) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                links.push(templates.commit_url.replace("{id}", &rev.to_string()));
            }
        }
        links
    }
}

#[async_trait]
impl BotPlugin for LinkChecker {
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
        let templates = self.templates();
        Some(
            StateValue::map()
                .with("ticket_url", templates.ticket_url.as_str())
                .with("commit_url", templates.commit_url.as_str()),
        )
    }

    fn load_state(&self, state: StateValue) -> PluginResult<()> {
        if state.as_map().is_none() {
            return Err(PluginError::State(format!("expected a map, got {}", state.type_name())));
        }
        let mut templates = self.templates();
        if let Some(url) = state.get("ticket_url").and_then(StateValue::as_str) {
            templates.ticket_url = url.to_string();
        }
        if let Some(url) = state.get("commit_url").and_then(StateValue::as_str) {
            templates.commit_url = url.to_string();
        }
        Ok(())
    }

    async fn on_event(&self, bot: &Connection, event: &Event) -> Result<(), BotError> {
        let (user, channel, text) = match event {
            Event::Privmsg { user, channel, message } => (user, channel, message),
            Event::Action { user, channel, data } => (user, channel, data),
            _ => return Ok(()),
        };
        for link in self.links(text) {
            bot.address_msg_with(user, channel, &link, false).await?;
        }
        Ok(())
    }
}
