//! Live connection - one session bound to the shared service

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info};

use crate::application::errors::BotError;
use crate::application::services::BotService;
use crate::domain::entities::{CommandRequest, Event};
use crate::domain::mask::nick_of;
use crate::domain::traits::Transport;
use super::dispatcher::{DispatchHandle, EventDispatcher};
use super::parser::{Addressed, MessageParser};
use super::session::{FollowUp, Session};

/// A live bot connection: its session state, the outbound transport and a
/// back-reference to the service that outlives it.
pub struct Connection {
    me: Weak<Connection>,
    service: Arc<BotService>,
    transport: Arc<dyn Transport>,
    session: Mutex<Session>,
    dispatcher: EventDispatcher,
}

impl Connection {
    /// Bind a fresh connection, injecting the service's current identity
    pub fn new(service: Arc<BotService>, transport: Arc<dyn Transport>) -> Arc<Self> {
        let identity = service.identity();
        info!(
            "Binding connection {} as {} (channels: {:?})",
            transport.describe(),
            identity.nickname,
            identity.channels
        );
        let dispatcher = EventDispatcher::new(service.registry().clone());
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            session: Mutex::new(Session::new(&identity)),
            service,
            transport,
            dispatcher,
        })
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn this(&self) -> Option<Arc<Connection>> {
        self.me.upgrade()
    }

    pub fn service(&self) -> &Arc<BotService> {
        &self.service
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn nickname(&self) -> String {
        self.session().nickname.clone()
    }

    pub fn is_signed_on(&self) -> bool {
        self.session().is_signed_on
    }

    pub fn channels(&self) -> Vec<String> {
        self.session().channels.iter().cloned().collect()
    }

    pub fn members(&self, channel: &str) -> Vec<String> {
        self.session().members(channel)
    }

    pub fn topic(&self, channel: &str) -> Option<String> {
        self.session().topics.get(channel).cloned()
    }

    /// Read-only view of the whole session
    pub fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.session())
    }

    /// Process one inbound event: default handling first, then every
    /// interested plugin in enable order. When this returns every handler
    /// has either finished or suspended; the returned handle covers all
    /// plugin calls the event triggered, including command handlers.
    pub async fn handle_event(&self, event: Event) -> DispatchHandle {
        let follow_up = self.session().apply(&event);
        let Some(this) = self.this() else {
            return DispatchHandle::default();
        };

        let mut handle = DispatchHandle::default();
        match follow_up {
            FollowUp::None => {}
            FollowUp::Inspect { user, channel, message } => {
                handle.merge(self.inspect(&this, &user, &channel, &message).await);
            }
            FollowUp::JoinChannels(channels) => {
                for channel in channels {
                    debug!("Joining {}", channel);
                    if let Err(e) = self.transport.join(&channel).await {
                        error!("Failed to join {}: {}", channel, e);
                    }
                }
            }
        }

        handle.merge(self.dispatcher.fan_out(&this, Arc::new(event)).await);
        handle
    }

    async fn inspect(&self, this: &Arc<Connection>, user: &str, channel: &str, message: &str) -> DispatchHandle {
        let parser = {
            let session = self.session();
            MessageParser::new(session.nickname.clone(), session.command_prefix.clone())
        };

        match parser.parse(channel, message) {
            Ok(Addressed::Command { verb, args }) => {
                let req = CommandRequest::new(verb, args, user, channel);
                self.dispatcher.route_command(this, req).await
            }
            Ok(Addressed::Chatter) | Ok(Addressed::Empty) => DispatchHandle::default(),
            Err(e) => {
                debug!("Unparseable command from {}: {}", user, e);
                let reply = format!("I couldn't parse that: {}", e);
                if let Err(e) = self.address_msg(user, channel, &reply).await {
                    error!("Failed to send reply to {}: {}", nick_of(user), e);
                }
                DispatchHandle::default()
            }
        }
    }

    /// Send one line and let observers of outbound traffic see it
    pub async fn msg(&self, target: &str, text: &str) -> Result<(), BotError> {
        self.transport.send_line(target, text).await?;
        if let Some(this) = self.this() {
            let sent = Event::MessageSent {
                target: target.to_string(),
                text: text.to_string(),
            };
            self.dispatcher.fan_out(&this, Arc::new(sent)).await.detach();
        }
        Ok(())
    }

    /// Reply to `user` wherever they spoke: in a channel each line is
    /// prefixed with their nick, in private it goes straight back to them.
    pub async fn address_msg(&self, user: &str, channel: &str, text: &str) -> Result<(), BotError> {
        self.address_msg_with(user, channel, text, true).await
    }

    /// Like [`Connection::address_msg`], optionally without the nick prefix
    pub async fn address_msg_with(&self, user: &str, channel: &str, text: &str, prefix: bool) -> Result<(), BotError> {
        let nick = nick_of(user);
        let private = channel.eq_ignore_ascii_case(&self.nickname()) || channel == nick;
        let target = if private { nick } else { channel };

        for line in text.split('\n') {
            if private || !prefix {
                self.msg(target, line).await?;
            } else {
                self.msg(target, &format!("{}: {}", nick, line)).await?;
            }
        }
        Ok(())
    }

    pub async fn reply(&self, req: &CommandRequest, text: &str) -> Result<(), BotError> {
        self.address_msg(&req.user, &req.channel, text).await
    }
}
