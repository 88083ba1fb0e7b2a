//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tempfile::TempDir;

use cassbot::application::errors::{BotError, PluginResult};
use cassbot::application::messaging::{Connection, DispatchReport};
use cassbot::application::services::BotService;
use cassbot::domain::entities::{CommandRequest, Event, EventKind, Identity};
use cassbot::infrastructure::adapters::MemoryTransport;
use cassbot::infrastructure::storage::JsonSnapshotStore;
use cassbot::plugins::builtin::register_builtins;
use cassbot::plugins::{BotPlugin, FnFactory, PluginRegistry, StaticCatalog};

static INIT: Once = Once::new();

pub fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub type Seen = Arc<Mutex<Vec<String>>>;

/// What a [`Recorder`] does when called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Ok,
    Fail,
    Panic,
    /// Suspends once after recording, then succeeds
    Yield,
}

/// Test plugin that writes down every call it gets
pub struct Recorder {
    pub name: String,
    pub events: Vec<EventKind>,
    pub commands: Vec<String>,
    pub seen: Seen,
    pub behaviour: Behaviour,
}

impl Recorder {
    async fn outcome(&self) -> Result<(), BotError> {
        match self.behaviour {
            Behaviour::Ok => Ok(()),
            Behaviour::Yield => {
                tokio::task::yield_now().await;
                Ok(())
            }
            Behaviour::Fail => Err(BotError::Internal(format!("{} failed on purpose", self.name))),
            Behaviour::Panic => panic!("{} panicked on purpose", self.name),
        }
    }
}

#[async_trait]
impl BotPlugin for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn interesting_events(&self) -> PluginResult<Vec<EventKind>> {
        Ok(self.events.clone())
    }

    fn implemented_commands(&self) -> PluginResult<Vec<String>> {
        Ok(self.commands.clone())
    }

    async fn on_event(&self, bot: &Connection, event: &Event) -> Result<(), BotError> {
        let mut entry = format!("{}:{}", self.name, event.kind());
        if let Event::Joined { channel } = event {
            // default handling must already have run
            entry.push_str(&format!(":{}:in={}", channel, bot.channels().contains(channel)));
        }
        self.seen.lock().unwrap().push(entry);
        self.outcome().await
    }

    async fn on_command(&self, _bot: &Connection, cmd: &CommandRequest) -> Result<(), BotError> {
        self.seen
            .lock()
            .unwrap()
            .push(format!("{}:{} {}", self.name, cmd.verb, cmd.args.join(" ")));
        self.outcome().await
    }
}

pub fn recorder_factory(
    name: &'static str,
    events: Vec<EventKind>,
    commands: Vec<&'static str>,
    behaviour: Behaviour,
    seen: Seen,
) -> FnFactory {
    FnFactory::new(name, move || {
        Ok(Arc::new(Recorder {
            name: name.to_string(),
            events: events.clone(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            seen: seen.clone(),
            behaviour,
        }) as Arc<dyn BotPlugin>)
    })
}

pub fn identity() -> Identity {
    Identity {
        nickname: "cassbot".to_string(),
        channels: vec!["#a".to_string(), "#b".to_string()],
        command_prefix: Some("!".to_string()),
    }
}

/// A service with the built-ins available and one live memory connection
pub struct Harness {
    pub dir: TempDir,
    pub catalog: Arc<StaticCatalog>,
    pub registry: Arc<PluginRegistry>,
    pub service: Arc<BotService>,
    pub transport: Arc<MemoryTransport>,
    pub conn: Arc<Connection>,
    pub seen: Seen,
}

impl Harness {
    pub fn new() -> Self {
        ensure_init();
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(StaticCatalog::new());
        register_builtins(&catalog).unwrap();
        let registry = Arc::new(PluginRegistry::new(catalog.clone()));
        let store = Arc::new(JsonSnapshotStore::new(dir.path().join("state.json")));
        let service = Arc::new(BotService::new(identity(), registry.clone(), store));
        let transport = Arc::new(MemoryTransport::new("test"));
        let conn = Connection::new(service.clone(), transport.clone());

        Self {
            dir,
            catalog,
            registry,
            service,
            transport,
            conn,
            seen: Seen::default(),
        }
    }

    pub fn add_recorder(&self, name: &'static str, events: Vec<EventKind>, commands: Vec<&'static str>, behaviour: Behaviour) {
        self.catalog
            .register(recorder_factory(name, events, commands, behaviour, self.seen.clone()))
            .unwrap();
        self.registry.enable_by_name(name).unwrap();
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub async fn event(&self, event: Event) -> DispatchReport {
        self.conn.handle_event(event).await.wait().await
    }

    pub async fn say(&self, user: &str, channel: &str, message: &str) -> DispatchReport {
        self.event(Event::Privmsg {
            user: user.to_string(),
            channel: channel.to_string(),
            message: message.to_string(),
        })
        .await
    }
}

/// Poll `check` until it holds or a second has passed
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
