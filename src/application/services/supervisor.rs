//! Reconnect supervisor - binds each new connection to the service and
//! retries with backoff when it drops.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::application::errors::BotError;
use crate::application::messaging::Connection;
use crate::domain::entities::Event;
use crate::domain::traits::Transport;
use super::bot_service::BotService;

/// Exponential reconnect delay, reset after every successful sign-on
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            factor: if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 },
            current: initial,
        }
    }

    /// Delay to wait now; the following one grows by `factor` up to `max`
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.factor).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300), 2.0)
    }
}

/// One established connection: where to send, and what arrives
pub struct Link {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::Receiver<Event>,
}

/// Opens connections. The wire protocol lives behind this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new connection. `BotError::Shutdown` means never retry.
    async fn connect(&self) -> Result<Link, BotError>;
}

/// Resolves once shutdown is requested or nobody can request it any more
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Why [`Supervisor::pump`] stopped
enum PumpEnd {
    Lost,
    Shutdown,
}

pub struct Supervisor {
    service: Arc<BotService>,
    backoff: Backoff,
}

impl Supervisor {
    pub fn new(service: Arc<BotService>, backoff: Backoff) -> Self {
        Self { service, backoff }
    }

    pub fn service(&self) -> &Arc<BotService> {
        &self.service
    }

    /// Create a connection with the service's current identity injected
    pub fn bind(&self, transport: Arc<dyn Transport>) -> Arc<Connection> {
        Connection::new(self.service.clone(), transport)
    }

    /// Sign-on completed: this is now the live session
    pub fn mark_signed_on(&mut self, conn: &Arc<Connection>) {
        self.backoff.reset();
        self.service.set_live(conn.clone());
        info!("Signed on as {}", conn.nickname());
    }

    /// The transport went away without saying so; tell everyone
    pub async fn connection_lost(&self, conn: &Arc<Connection>, reason: &str) {
        self.service.clear_live(conn);
        conn.handle_event(Event::Disconnected { reason: reason.to_string() })
            .await
            .detach();
    }

    /// Connect, pump events, reconnect on loss. Returns when `shutdown`
    /// becomes true (or its sender goes away) or the connector gives up.
    pub async fn run(&mut self, connector: &dyn Connector, mut shutdown: watch::Receiver<bool>) -> Result<(), BotError> {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let attempt = tokio::select! {
                attempt = connector.connect() => attempt,
                _ = stopped(&mut shutdown) => break,
            };

            match attempt {
                Ok(link) => {
                    let conn = self.bind(link.transport);
                    match self.pump(&conn, link.events, &mut shutdown).await {
                        PumpEnd::Shutdown => {
                            if let Err(e) = conn.transport().disconnect("shutting down").await {
                                warn!("Error closing connection: {}", e);
                            }
                            self.service.clear_live(&conn);
                            break;
                        }
                        PumpEnd::Lost => info!("Lost connection {}", conn.transport().describe()),
                    }
                }
                Err(BotError::Shutdown) => {
                    info!("Connector has nothing more to connect to");
                    break;
                }
                Err(e) => warn!("Connection attempt failed: {}", e),
            }

            let delay = self.backoff.next_delay();
            info!("Reconnecting in {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut shutdown) => break,
            }
        }

        info!("Supervisor stopped");
        Ok(())
    }

    /// Dispatch one connection's events strictly in arrival order
    async fn pump(
        &mut self,
        conn: &Arc<Connection>,
        mut events: mpsc::Receiver<Event>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PumpEnd {
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = stopped(shutdown) => return PumpEnd::Shutdown,
            };

            let Some(event) = event else {
                self.connection_lost(conn, "connection closed").await;
                return PumpEnd::Lost;
            };

            debug!(event = %event.kind(), "Dispatching event");
            let signed_on = matches!(event, Event::SignedOn);
            let lost = matches!(event, Event::Disconnected { .. });

            // every handler has run to completion or its first suspension
            conn.handle_event(event).await.detach();

            if signed_on {
                self.mark_signed_on(conn);
            }
            if lost {
                self.service.clear_live(conn);
                return PumpEnd::Lost;
            }
        }
    }
}
