//! Bot logger - writes channel traffic to the `irclog` tracing target
//!
//! Nicks on a channel's blacklist (shell-style wildcards allowed) are left
//! out of the message log for that channel.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::application::errors::{BotError, PluginError, PluginResult};
use crate::application::messaging::Connection;
use crate::domain::entities::{CommandRequest, Event, EventKind, StateValue};
use crate::domain::mask::{nick_of, wildcard_match};
use crate::plugins::trait_def::BotPlugin;
use super::natural_list;

pub const NAME: &str = "BotLogger";
pub const DESCRIPTION: &str = "Logs channel traffic, with per-channel blacklists";

/// Lets a user blacklist others, globally or as `<channel>:log_blacklist_admin`
pub const BLACKLIST_ADMIN_PRIV: &str = "log_blacklist_admin";

const EVENTS: &[EventKind] = &[
    EventKind::SignedOn,
    EventKind::Joined,
    EventKind::Left,
    EventKind::Noticed,
    EventKind::ModeChanged,
    EventKind::KickedFrom,
    EventKind::NickChanged,
    EventKind::UserJoined,
    EventKind::UserLeft,
    EventKind::UserQuit,
    EventKind::UserKicked,
    EventKind::TopicUpdated,
    EventKind::UserRenamed,
    EventKind::ReceivedMotd,
    EventKind::MessageSent,
    EventKind::Action,
    EventKind::Privmsg,
    EventKind::Disconnected,
];

#[derive(Debug, Default)]
pub struct BotLogger {
    blacklists: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl BotLogger {
    fn blacklists(&self) -> MutexGuard<'_, BTreeMap<String, BTreeSet<String>>> {
        self.blacklists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_blacklisted(&self, channel: &str, nick: &str) -> bool {
        self.blacklists()
            .get(channel)
            .is_some_and(|names| names.iter().any(|pattern| wildcard_match(pattern, nick)))
    }

    pub fn blacklist_for(&self, channel: &str) -> Vec<String> {
        self.blacklists()
            .get(channel)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Log line for `event`, or `None` if it should not be logged
    pub fn render(&self, own_nick: &str, event: &Event) -> Option<String> {
        let line = match event {
            Event::SignedOn => format!("Signed on as {}.", own_nick),
            Event::Joined { channel } => format!("Joined {}.", channel),
            Event::Left { channel } => format!("Left {}.", channel),
            Event::Noticed { user, channel, message } => {
                format!("NOTICE -!- [{}] <{}> {}", channel, user, message)
            }
            Event::ModeChanged { user, channel, set, modes, args } => format!(
                "MODE -!- {} {} modes {:?} in {:?} for {:?}",
                user,
                if *set { "set" } else { "unset" },
                modes,
                channel,
                args
            ),
            Event::KickedFrom { channel, kicker, message } => {
                format!("KICKED -!- from {} by {} [{}]", channel, kicker, message)
            }
            Event::NickChanged { nick } => format!("NICKCHANGE -!- my nick changed to {}", nick),
            Event::UserJoined { user, channel } => format!("{} joined {}", user, channel),
            Event::UserLeft { user, channel } => format!("{} left {}", user, channel),
            Event::UserQuit { user, message } => format!("{} quit [{}]", user, message),
            Event::UserKicked { kickee, channel, kicker, message } => {
                format!("{} was kicked from {} by {} [{}]", kickee, channel, kicker, message)
            }
            Event::TopicUpdated { user, channel, topic } => {
                format!("[{}] -!- topic changed by {} to {:?}", channel, user, topic)
            }
            Event::UserRenamed { old_name, new_name } => {
                format!("RENAME {} is now known as {}", old_name, new_name)
            }
            Event::ReceivedMotd { motd } => format!("MOTD {}", motd.join(" / ")),
            Event::MessageSent { target, text } => format!("[{}] <{}> {}", target, own_nick, text),
            Event::Action { user, channel, data } => {
                let nick = nick_of(user);
                if self.is_blacklisted(channel, nick) {
                    return None;
                }
                format!("[{}] * {} {}", channel, nick, data)
            }
            Event::Privmsg { user, channel, message } => {
                let nick = nick_of(user);
                if self.is_blacklisted(channel, nick) {
                    return None;
                }
                format!("[{}] <{}> {}", channel, nick, message)
            }
            Event::Disconnected { reason } => format!("Disconnected [{}]", reason),
            _ => return None,
        };
        Some(line)
    }

    fn blacklist(&self, bot: &Connection, req: &CommandRequest) -> String {
        let nick = req.nick();
        let chan = req.channel.as_str();
        if req.args.is_empty() {
            return "usage: \"blacklist me\" OR \"blacklist [name [name2 [...]]]\". \
                    Second form requires log_blacklist_admin privilege in this channel. \
                    Shell-style wildcards are ok."
                .to_string();
        }
        if let [only] = req.args.as_slice() {
            if only == "me" || only == nick {
                self.blacklists().entry(chan.to_string()).or_default().insert(nick.to_string());
                return format!("Blacklisting you for {}.", chan);
            }
        }
        if !bot.service().principal_has_in_channel(chan, &req.user, BLACKLIST_ADMIN_PRIV) {
            return "blacklisting other names requires the log_blacklist_admin privilege in this channel."
                .to_string();
        }

        let mut blacklists = self.blacklists();
        let names = blacklists.entry(chan.to_string()).or_default();
        let added: Vec<String> = req
            .args
            .iter()
            .filter(|name| names.insert(name.to_string()))
            .map(|name| format!("'{}'", name))
            .collect();
        format!("Blacklisted {}", natural_list(&added))
    }

    fn unblacklist(&self, bot: &Connection, req: &CommandRequest) -> String {
        let nick = req.nick();
        let chan = req.channel.as_str();
        if req.args.is_empty() {
            return "usage: \"unblacklist me\" OR \"unblacklist [name [name2 [...]]]\". \
                    Second form requires log_blacklist_admin privilege in this channel. \
                    Shell-style wildcards are ok."
                .to_string();
        }
        if let [only] = req.args.as_slice() {
            if only == "me" || only == nick {
                let removed = self
                    .blacklists()
                    .get_mut(chan)
                    .is_some_and(|names| names.remove(nick));
                return if removed {
                    format!("Unblacklisting you for {}.", chan)
                } else {
                    format!("You are not blacklisted in {}.", chan)
                };
            }
        }
        if !bot.service().principal_has_in_channel(chan, &req.user, BLACKLIST_ADMIN_PRIV) {
            return "unblacklisting other names requires the log_blacklist_admin privilege in this channel."
                .to_string();
        }

        let mut blacklists = self.blacklists();
        let found: Vec<String> = match blacklists.get_mut(chan) {
            Some(names) => req
                .args
                .iter()
                .filter(|name| names.remove(name.as_str()))
                .map(|name| format!("'{}'", name))
                .collect(),
            None => Vec::new(),
        };
        format!("Unblacklisted {}", natural_list(&found))
    }

    fn show(&self, req: &CommandRequest) -> String {
        match req.args.as_slice() {
            [what] if what == "blacklist" => {
                let names: Vec<String> = self
                    .blacklist_for(&req.channel)
                    .into_iter()
                    .map(|name| format!("'{}'", name))
                    .collect();
                format!("Blacklist for {}: {}", req.channel, natural_list(&names))
            }
            _ => "usage: show blacklist".to_string(),
        }
    }
}

#[async_trait]
impl BotPlugin for BotLogger {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> Option<&str> {
        Some(DESCRIPTION)
    }

    fn interesting_events(&self) -> PluginResult<Vec<EventKind>> {
        Ok(EVENTS.to_vec())
    }

    fn implemented_commands(&self) -> PluginResult<Vec<String>> {
        Ok(vec!["blacklist".into(), "unblacklist".into(), "show".into()])
    }

    fn save_state(&self) -> Option<StateValue> {
        let map = self
            .blacklists()
            .iter()
            .map(|(chan, names)| (chan.clone(), StateValue::Set(names.clone())))
            .collect();
        Some(StateValue::Map(map))
    }

    fn load_state(&self, state: StateValue) -> PluginResult<()> {
        let kind = state.type_name();
        let StateValue::Map(channels) = state else {
            return Err(PluginError::State(format!(
                "expected a map of channel blacklists, got {}",
                kind
            )));
        };

        let mut loaded: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (chan, names) in channels {
            match names {
                StateValue::Set(names) => {
                    loaded.insert(chan, names);
                }
                StateValue::List(items) => {
                    let names: BTreeSet<String> = items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
                    loaded.insert(chan, names);
                }
                other => {
                    return Err(PluginError::State(format!(
                        "blacklist for {} is a {}",
                        chan,
                        other.type_name()
                    )))
                }
            }
        }
        *self.blacklists() = loaded;
        Ok(())
    }

    async fn on_event(&self, bot: &Connection, event: &Event) -> Result<(), BotError> {
        if let Some(line) = self.render(&bot.nickname(), event) {
            info!(target: "irclog", "{}", line);
        }
        Ok(())
    }

    async fn on_command(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        let reply = match req.verb.as_str() {
            "blacklist" => self.blacklist(bot, req),
            "unblacklist" => self.unblacklist(bot, req),
            "show" => self.show(req),
            _ => return Ok(()),
        };
        bot.reply(req, &reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn privmsg(user: &str, channel: &str, message: &str) -> Event {
        Event::Privmsg {
            user: user.into(),
            channel: channel.into(),
            message: message.into(),
        }
    }

    #[test]
    fn test_render_privmsg_uses_nick() {
        let logger = BotLogger::default();
        assert_eq!(
            logger.render("cassbot", &privmsg("bob!b@host", "#chan", "hi")).as_deref(),
            Some("[#chan] <bob> hi")
        );
        assert_eq!(
            logger
                .render("cassbot", &Event::MessageSent { target: "#chan".into(), text: "yo".into() })
                .as_deref(),
            Some("[#chan] <cassbot> yo")
        );
        assert!(logger.render("cassbot", &Event::Connected).is_none());
    }

    #[test]
    fn test_blacklist_suppresses_messages_per_channel() {
        let logger = BotLogger::default();
        let state = StateValue::Map(
            [("#chan".to_string(), StateValue::Set(["ev*".to_string()].into_iter().collect()))]
                .into_iter()
                .collect(),
        );
        logger.load_state(state).unwrap();

        assert!(logger.render("cassbot", &privmsg("evn!e@h", "#chan", "secret")).is_none());
        assert!(logger.render("cassbot", &privmsg("evn!e@h", "#other", "public")).is_some());
        assert!(logger.render("cassbot", &privmsg("bob!b@h", "#chan", "public")).is_some());
        assert!(logger
            .render(
                "cassbot",
                &Event::Action { user: "evan".into(), channel: "#chan".into(), data: "waves".into() }
            )
            .is_none());
    }

    #[test]
    fn test_state_round_trip() {
        let logger = BotLogger::default();
        logger.blacklists().entry("#a".into()).or_default().insert("x".into());
        let saved = logger.save_state().unwrap();

        let fresh = BotLogger::default();
        fresh.load_state(saved).unwrap();
        assert_eq!(fresh.blacklist_for("#a"), vec!["x"]);
    }

    #[test]
    fn test_bad_state_rejected() {
        let logger = BotLogger::default();
        assert!(logger.load_state(StateValue::Int(3)).is_err());
        let bad = StateValue::map().with("#a", 4i64);
        assert!(logger.load_state(bad).is_err());
    }

    #[test]
    fn test_show_blacklist() {
        let logger = BotLogger::default();
        logger.blacklists().entry("#a".into()).or_default().insert("x".into());
        let req = CommandRequest::new("show", vec!["blacklist".into()], "bob!b@h", "#a");
        assert_eq!(logger.show(&req), "Blacklist for #a: 'x'");
        let req = CommandRequest::new("show", vec![], "bob!b@h", "#a");
        assert_eq!(logger.show(&req), "usage: show blacklist");
    }
}
