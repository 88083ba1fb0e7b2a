//! Event dispatcher - Fans events and commands out to plugin handlers
//!
//! Handlers are started one after another, in enable order, on the dispatch
//! stream itself. Each handler runs until it completes or first suspends; a
//! suspended handler is moved onto its own tokio task so the next handler
//! (and the next event) is not held up by it. A caller that needs a
//! synchronization point awaits [`DispatchHandle::wait`].

use std::any::Any;
use std::future::{poll_fn, Future};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::domain::entities::{CommandRequest, Event};
use crate::plugins::PluginRegistry;
use super::connection::Connection;

/// One handler invocation; resolves to whether the handler succeeded
type HandlerFuture = Pin<Box<dyn Future<Output = bool> + Send + 'static>>;

/// Handler invocations for one dispatched occurrence
#[derive(Default)]
#[must_use = "dropping a DispatchHandle detaches the handlers without logging panics"]
pub struct DispatchHandle {
    finished: usize,
    finished_failed: usize,
    pending: Vec<Pending>,
}

struct Pending {
    plugin: String,
    what: String,
    task: JoinHandle<bool>,
}

/// Outcome of awaiting a [`DispatchHandle`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failed: usize,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl DispatchHandle {
    pub fn merge(&mut self, other: DispatchHandle) {
        self.finished += other.finished;
        self.finished_failed += other.finished_failed;
        self.pending.extend(other.pending);
    }

    /// Handlers invoked so far, finished or not
    pub fn len(&self) -> usize {
        self.finished + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handlers that suspended and are still running on their own task
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Drive `fut` until it completes or first suspends. Panics during that
    /// first poll are contained and logged here.
    async fn start(&mut self, plugin: String, what: String, mut fut: HandlerFuture) {
        let polled = poll_fn(|cx| Poll::Ready(panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(cx))))).await;

        match polled {
            Ok(Poll::Ready(ok)) => {
                self.finished += 1;
                if !ok {
                    self.finished_failed += 1;
                }
            }
            Ok(Poll::Pending) => {
                let task = tokio::spawn(fut);
                self.pending.push(Pending { plugin, what, task });
            }
            Err(payload) => {
                error!(
                    plugin = %plugin,
                    "Plugin {} panicked while in {}: {}",
                    plugin, what, panic_message(payload.as_ref())
                );
                self.finished += 1;
                self.finished_failed += 1;
            }
        }
    }

    /// Wait for every suspended handler to finish. Handler errors were
    /// already logged by the handler future; panics are logged here.
    pub async fn wait(self) -> DispatchReport {
        let mut report = DispatchReport {
            invoked: self.finished,
            failed: self.finished_failed,
        };
        for pending in self.pending {
            report.invoked += 1;
            match pending.task.await {
                Ok(true) => {}
                Ok(false) => report.failed += 1,
                Err(e) => {
                    error!(
                        plugin = %pending.plugin,
                        "Plugin {} panicked while in {}: {}",
                        pending.plugin, pending.what, e
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Let the suspended handlers finish in the background
    pub fn detach(self) {
        if !self.pending.is_empty() {
            tokio::spawn(self.wait());
        }
    }
}

/// Routes events and commands to the plugins indexed for them
pub struct EventDispatcher {
    registry: Arc<PluginRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Invoke every plugin interested in `event`, in enable order
    pub async fn fan_out(&self, conn: &Arc<Connection>, event: Arc<Event>) -> DispatchHandle {
        let kind = event.kind();
        let mut handle = DispatchHandle::default();

        for plugin in self.registry.subscribers(kind) {
            let conn = conn.clone();
            let event = event.clone();
            let name = plugin.name().to_string();
            let fut: HandlerFuture = Box::pin(async move {
                match plugin.on_event(&conn, &event).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(
                            plugin = %plugin.name(),
                            event = %kind,
                            "Exception in plugin {} for event {}: {}",
                            plugin.name(), kind, e
                        );
                        false
                    }
                }
            });
            handle.start(name, kind.to_string(), fut).await;
        }
        handle
    }

    /// Invoke every plugin implementing the request's verb, in enable order.
    /// With no handler at all the requester gets an apology instead.
    pub async fn route_command(&self, conn: &Arc<Connection>, req: CommandRequest) -> DispatchHandle {
        let handlers = self.registry.command_handlers(&req.verb);
        let mut handle = DispatchHandle::default();

        if handlers.is_empty() {
            debug!(command = %req.verb, "No plugin implements command");
            let apology = format!("Sorry, I don't understand '{}'. :(", req.verb);
            if let Err(e) = conn.reply(&req, &apology).await {
                error!("Failed to send reply to {}: {}", req.nick(), e);
            }
            return handle;
        }

        let req = Arc::new(req);
        for plugin in handlers {
            let conn = conn.clone();
            let req = req.clone();
            let name = plugin.name().to_string();
            let what = format!("command_{}", req.verb);
            let fut: HandlerFuture = Box::pin(async move {
                match plugin.on_command(&conn, &req).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(
                            plugin = %plugin.name(),
                            command = %req.verb,
                            "Exception in plugin {} while in command_{}: {}",
                            plugin.name(), req.verb, e
                        );
                        false
                    }
                }
            });
            handle.start(name, what, fut).await;
        }
        handle
    }
}
