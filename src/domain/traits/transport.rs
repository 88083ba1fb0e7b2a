use async_trait::async_trait;
use crate::application::errors::BotError;

/// Transport trait - the outbound half of a live connection
///
/// The wire protocol lives behind this trait; the core only needs to send
/// lines and ask for channel joins.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message line to a channel or nickname
    async fn send_line(&self, target: &str, text: &str) -> Result<(), BotError>;

    /// Ask the server to join a channel
    async fn join(&self, channel: &str) -> Result<(), BotError>;

    /// Close the underlying connection
    async fn disconnect(&self, _reason: &str) -> Result<(), BotError> {
        Ok(())
    }

    /// Short description for logs, e.g. the server address
    fn describe(&self) -> String {
        "transport".to_string()
    }
}
