//! Console adapter for development/testing
//!
//! Each stdin line arrives as a private message to the bot; everything the
//! bot sends is printed.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::application::errors::BotError;
use crate::application::services::{Connector, Link};
use crate::domain::entities::Event;
use crate::domain::traits::Transport;

/// Principal the console user speaks as
pub const CONSOLE_USER: &str = "console!console@localhost";

/// Prints outbound lines to stdout
#[derive(Debug, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_line(&self, target: &str, text: &str) -> Result<(), BotError> {
        println!("[BOT -> {}] {}", target, text);
        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<(), BotError> {
        info!("Console transport pretending to join {}", channel);
        Ok(())
    }

    fn describe(&self) -> String {
        "console".to_string()
    }
}

/// Hands out one console session; stdin EOF ends it for good
pub struct ConsoleConnector {
    nickname: String,
    used: AtomicBool,
}

impl ConsoleConnector {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            used: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connector for ConsoleConnector {
    async fn connect(&self) -> Result<Link, BotError> {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(BotError::Shutdown);
        }

        let (tx, rx) = mpsc::channel(64);
        let nickname = self.nickname.clone();
        tokio::spawn(async move {
            if tx.send(Event::Connected).await.is_err() || tx.send(Event::SignedOn).await.is_err() {
                return;
            }
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        let event = Event::Privmsg {
                            user: CONSOLE_USER.to_string(),
                            channel: nickname.clone(),
                            message: line,
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Console input closed");
                        let _ = tx.send(Event::Disconnected { reason: "end of input".to_string() }).await;
                        break;
                    }
                    Err(e) => {
                        let _ = tx.send(Event::Disconnected { reason: e.to_string() }).await;
                        break;
                    }
                }
            }
        });

        Ok(Link {
            transport: Arc::new(ConsoleTransport),
            events: rx,
        })
    }
}
