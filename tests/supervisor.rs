//! Reconnect supervision: every new connection is bound to the same service

mod common;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use cassbot::application::errors::BotError;
use cassbot::application::services::{Backoff, Connector, Link, Supervisor};
use cassbot::domain::entities::{Event, EventKind, Identity};
use cassbot::infrastructure::adapters::MemoryTransport;
use common::{eventually, Behaviour, Harness};

/// Hands out prepared links in order, then gives up
struct ScriptedConnector {
    links: Mutex<VecDeque<Link>>,
    attempts: Mutex<usize>,
}

impl ScriptedConnector {
    fn new(links: Vec<Link>) -> Self {
        Self {
            links: Mutex::new(links.into()),
            attempts: Mutex::new(0),
        }
    }

    fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Link, BotError> {
        *self.attempts.lock().unwrap() += 1;
        self.links.lock().unwrap().pop_front().ok_or(BotError::Shutdown)
    }
}

/// A link whose event queue already holds `events`. The sender is returned
/// so the caller decides when the connection drops.
fn link(transport: &Arc<MemoryTransport>, events: Vec<Event>) -> (Link, mpsc::Sender<Event>) {
    let (tx, rx) = mpsc::channel(16);
    for event in events {
        tx.try_send(event).unwrap();
    }
    let link = Link {
        transport: transport.clone(),
        events: rx,
    };
    (link, tx)
}

fn quick_backoff() -> Backoff {
    Backoff::new(Duration::from_millis(1), Duration::from_millis(5), 2.0)
}

#[tokio::test]
async fn test_reconnect_rebinds_service() {
    let h = Harness::new();
    h.add_recorder(
        "Watcher",
        vec![EventKind::SignedOn, EventKind::Disconnected],
        vec![],
        Behaviour::Ok,
    );

    let first = Arc::new(MemoryTransport::new("first"));
    let second = Arc::new(MemoryTransport::new("second"));
    let (link1, tx1) = link(&first, vec![Event::Connected, Event::SignedOn]);
    let (link2, tx2) = link(&second, vec![Event::Connected, Event::SignedOn]);
    // both connections drop once their queues drain
    drop(tx1);
    drop(tx2);

    let connector = ScriptedConnector::new(vec![link1, link2]);
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut supervisor = Supervisor::new(h.service.clone(), quick_backoff());

    supervisor.run(&connector, stop_rx).await.unwrap();

    assert_eq!(connector.attempts(), 3);
    assert_eq!(first.joins(), vec!["#a", "#b"]);
    assert_eq!(second.joins(), vec!["#a", "#b"]);
    assert!(h.service.live().is_none());
    assert!(
        eventually(|| {
            let seen = h.seen();
            seen.iter().filter(|s| *s == "Watcher:signed-on").count() == 2
                && seen.iter().filter(|s| *s == "Watcher:disconnected").count() == 2
        })
        .await
    );
}

#[tokio::test]
async fn test_bind_uses_current_identity() {
    let h = Harness::new();
    let supervisor = Supervisor::new(h.service.clone(), quick_backoff());

    h.service.set_identity(Identity {
        nickname: "renamed".to_string(),
        channels: vec!["#c".to_string()],
        command_prefix: None,
    });

    let transport = Arc::new(MemoryTransport::new("fresh"));
    let conn = supervisor.bind(transport.clone());
    assert_eq!(conn.nickname(), "renamed");

    conn.handle_event(Event::SignedOn).await.wait().await;
    assert_eq!(transport.joins(), vec!["#c"]);
}

#[tokio::test]
async fn test_live_connection_follows_sign_on_and_loss() {
    let h = Harness::new();
    let mut supervisor = Supervisor::new(h.service.clone(), quick_backoff());
    let transport = Arc::new(MemoryTransport::new("one"));
    let conn = supervisor.bind(transport);

    assert!(h.service.live().is_none());
    supervisor.mark_signed_on(&conn);
    assert!(h.service.live().is_some_and(|live| Arc::ptr_eq(&live, &conn)));

    // a stale connection going away leaves the live one alone
    let stale = supervisor.bind(Arc::new(MemoryTransport::new("stale")));
    supervisor.connection_lost(&stale, "gone").await;
    assert!(h.service.live().is_some());

    supervisor.connection_lost(&conn, "gone").await;
    assert!(h.service.live().is_none());
}

#[tokio::test]
async fn test_shutdown_closes_live_connection() {
    let h = Harness::new();
    let transport = Arc::new(MemoryTransport::new("live"));
    let (link1, _keep_open) = link(&transport, vec![Event::SignedOn]);
    let connector = ScriptedConnector::new(vec![link1]);
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut supervisor = Supervisor::new(h.service.clone(), quick_backoff());
    let service = h.service.clone();

    let (result, _) = tokio::join!(supervisor.run(&connector, stop_rx), async {
        assert!(eventually(|| service.live().is_some()).await);
        stop_tx.send(true).unwrap();
    });

    result.unwrap();
    assert_eq!(connector.attempts(), 1);
    assert_eq!(transport.disconnects(), vec!["shutting down"]);
    assert!(h.service.live().is_none());
}

#[tokio::test]
async fn test_failed_attempts_are_retried() {
    struct Flaky {
        inner: ScriptedConnector,
        failures: Mutex<u32>,
    }

    #[async_trait]
    impl Connector for Flaky {
        async fn connect(&self) -> Result<Link, BotError> {
            let refuse = {
                let mut failures = self.failures.lock().unwrap();
                let refuse = *failures > 0;
                if refuse {
                    *failures -= 1;
                }
                refuse
            };
            if refuse {
                return Err(BotError::Transport("connection refused".to_string()));
            }
            self.inner.connect().await
        }
    }

    let h = Harness::new();
    let transport = Arc::new(MemoryTransport::new("eventually"));
    let (link1, tx) = link(&transport, vec![Event::SignedOn]);
    drop(tx);
    let connector = Flaky {
        inner: ScriptedConnector::new(vec![link1]),
        failures: Mutex::new(2),
    };
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut supervisor = Supervisor::new(h.service.clone(), quick_backoff());

    supervisor.run(&connector, stop_rx).await.unwrap();

    assert_eq!(transport.joins(), vec!["#a", "#b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pumped_events_reach_plugins_in_order() {
    let h = Harness::new();
    h.add_recorder("A", vec![EventKind::Joined], vec![], Behaviour::Yield);
    h.add_recorder("B", vec![EventKind::Joined], vec![], Behaviour::Ok);

    let (tx, rx) = mpsc::channel(128);
    for n in 0..100 {
        tx.try_send(Event::Joined { channel: format!("#c{}", n) }).unwrap();
    }
    drop(tx);
    let transport = Arc::new(MemoryTransport::new("ordered"));
    let connector = ScriptedConnector::new(vec![Link {
        transport: transport.clone(),
        events: rx,
    }]);
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut supervisor = Supervisor::new(h.service.clone(), quick_backoff());

    supervisor.run(&connector, stop_rx).await.unwrap();

    let joined: Vec<String> = h.seen().into_iter().filter(|s| s.contains(":joined:")).collect();
    let expected: Vec<String> = (0..100)
        .flat_map(|n| {
            [
                format!("A:joined:#c{}:in=true", n),
                format!("B:joined:#c{}:in=true", n),
            ]
        })
        .collect();
    assert_eq!(joined, expected);
}
