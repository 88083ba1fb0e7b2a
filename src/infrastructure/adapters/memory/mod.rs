//! In-memory transport - records what the bot would have sent

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::application::errors::BotError;
use crate::domain::traits::Transport;

#[derive(Debug, Default)]
struct Recorded {
    lines: Vec<(String, String)>,
    joins: Vec<String>,
    disconnects: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    name: String,
    recorded: Mutex<Recorded>,
}

impl MemoryTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            recorded: Mutex::default(),
        }
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `(target, text)` pairs in send order
    pub fn lines(&self) -> Vec<(String, String)> {
        self.recorded().lines.clone()
    }

    /// Just the texts, in send order
    pub fn texts(&self) -> Vec<String> {
        self.recorded().lines.iter().map(|(_, text)| text.clone()).collect()
    }

    pub fn take_lines(&self) -> Vec<(String, String)> {
        std::mem::take(&mut self.recorded().lines)
    }

    pub fn joins(&self) -> Vec<String> {
        self.recorded().joins.clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.recorded().disconnects.clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_line(&self, target: &str, text: &str) -> Result<(), BotError> {
        self.recorded().lines.push((target.to_string(), text.to_string()));
        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<(), BotError> {
        self.recorded().joins.push(channel.to_string());
        Ok(())
    }

    async fn disconnect(&self, reason: &str) -> Result<(), BotError> {
        self.recorded().disconnects.push(reason.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}
