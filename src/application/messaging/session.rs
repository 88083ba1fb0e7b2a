//! Per-connection session state and the default handling of each event.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::entities::{Event, Identity};

/// A mode letter currently in effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeEntry {
    pub set_by: Option<String>,
    pub args: Vec<Option<String>>,
}

/// Server details learned during registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub user_modes: Option<String>,
    pub channel_modes: Option<String>,
    pub daemon_info: Option<String>,
    pub host_info: Option<String>,
    pub isupport: Vec<String>,
    pub motd: Vec<String>,
}

/// Work the connection must do after the session has absorbed an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    None,
    /// A privmsg worth handing to the command parser
    Inspect { user: String, channel: String, message: String },
    /// Sign-on finished; join these channels
    JoinChannels(Vec<String>),
}

/// State owned by exactly one live connection
#[derive(Debug, Clone)]
pub struct Session {
    pub nickname: String,
    pub join_channels: Vec<String>,
    pub command_prefix: Option<String>,

    pub channels: BTreeSet<String>,
    pub channel_memberships: HashMap<String, HashSet<String>>,
    pub topics: HashMap<String, String>,
    pub channel_modes: HashMap<String, HashMap<char, ModeEntry>>,
    pub server_modes: HashMap<String, HashMap<char, ModeEntry>>,
    pub server: ServerInfo,

    pub is_signed_on: bool,
    pub connected_at: DateTime<Utc>,
    pub signed_on_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(identity: &Identity) -> Self {
        Self {
            nickname: identity.nickname.clone(),
            join_channels: identity.channels.clone(),
            command_prefix: identity.command_prefix.clone(),
            channels: BTreeSet::new(),
            channel_memberships: HashMap::new(),
            topics: HashMap::new(),
            channel_modes: HashMap::new(),
            server_modes: HashMap::new(),
            server: ServerInfo::default(),
            is_signed_on: false,
            connected_at: Utc::now(),
            signed_on_at: None,
        }
    }

    /// Default handling for `event`. Runs before any plugin sees it.
    pub fn apply(&mut self, event: &Event) -> FollowUp {
        match event {
            Event::MyInfo { server_name, version, user_modes, channel_modes } => {
                self.server.name = Some(server_name.clone());
                self.server.version = Some(version.clone());
                self.server.user_modes = Some(user_modes.clone());
                self.server.channel_modes = Some(channel_modes.clone());
            }
            Event::YourHost { info } => self.server.daemon_info = Some(info.clone()),
            Event::LuserMe { info } => self.server.host_info = Some(info.clone()),
            Event::ISupport { options } => self.server.isupport.extend(options.iter().cloned()),
            Event::ReceivedMotd { motd } => self.server.motd = motd.clone(),
            Event::Privmsg { user, channel, message } => {
                return FollowUp::Inspect {
                    user: user.clone(),
                    channel: channel.clone(),
                    message: message.clone(),
                };
            }
            Event::Joined { channel } => {
                self.channels.insert(channel.clone());
            }
            Event::Left { channel } | Event::KickedFrom { channel, .. } => self.leave_channel(channel),
            Event::ModeChanged { user, channel, set, modes, args } => {
                self.change_modes(user, channel, *set, modes, args);
            }
            Event::SignedOn => {
                self.is_signed_on = true;
                self.signed_on_at = Some(Utc::now());
                return FollowUp::JoinChannels(self.join_channels.clone());
            }
            Event::NickChanged { nick } => self.nickname = nick.clone(),
            Event::UserJoined { user, channel } => {
                self.channel_memberships
                    .entry(channel.clone())
                    .or_default()
                    .insert(user.clone());
            }
            Event::UserLeft { user, channel } | Event::UserKicked { kickee: user, channel, .. } => {
                if let Some(members) = self.channel_memberships.get_mut(channel) {
                    members.remove(user);
                }
            }
            Event::UserQuit { user, .. } => {
                for members in self.channel_memberships.values_mut() {
                    members.remove(user);
                }
            }
            Event::TopicUpdated { channel, topic, .. } => {
                self.topics.insert(channel.clone(), topic.clone());
            }
            Event::UserRenamed { old_name, new_name } => {
                for members in self.channel_memberships.values_mut() {
                    if members.remove(old_name) {
                        members.insert(new_name.clone());
                    }
                }
            }
            Event::Disconnected { .. } => self.is_signed_on = false,
            Event::Connected
            | Event::Created { .. }
            | Event::LuserClient { .. }
            | Event::Bounce { .. }
            | Event::LuserChannels { .. }
            | Event::LuserOp { .. }
            | Event::Noticed { .. }
            | Event::Action { .. }
            | Event::MessageSent { .. } => {}
        }
        FollowUp::None
    }

    fn leave_channel(&mut self, channel: &str) {
        self.channels.remove(channel);
        self.topics.remove(channel);
        self.channel_modes.remove(channel);
        self.channel_memberships.remove(channel);
    }

    fn change_modes(&mut self, user: &str, channel: &str, set: bool, modes: &str, args: &[Option<String>]) {
        // a mode change whose target is the actor is a user mode
        let (map, set_by) = if user == channel {
            (self.server_modes.entry(user.to_string()).or_default(), None)
        } else {
            (self.channel_modes.entry(channel.to_string()).or_default(), Some(user.to_string()))
        };

        for m in modes.chars() {
            if set {
                map.insert(m, ModeEntry { set_by: set_by.clone(), args: args.to_vec() });
            } else {
                map.remove(&m);
            }
        }
    }

    pub fn members(&self, channel: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .channel_memberships
            .get(channel)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(&Identity {
            nickname: "cassbot".into(),
            channels: vec!["#a".into(), "#b".into()],
            command_prefix: Some("!".into()),
        })
    }

    #[test]
    fn test_join_leave_clears_channel_state() {
        let mut s = session();
        s.apply(&Event::Joined { channel: "#a".into() });
        s.apply(&Event::UserJoined { user: "bob".into(), channel: "#a".into() });
        s.apply(&Event::TopicUpdated { user: "bob".into(), channel: "#a".into(), topic: "t".into() });
        assert!(s.channels.contains("#a"));
        assert_eq!(s.topics.get("#a").map(String::as_str), Some("t"));

        s.apply(&Event::KickedFrom { channel: "#a".into(), kicker: "op".into(), message: "bye".into() });
        assert!(!s.channels.contains("#a"));
        assert!(s.topics.get("#a").is_none());
        assert!(s.members("#a").is_empty());
    }

    #[test]
    fn test_memberships_follow_renames_and_quits() {
        let mut s = session();
        s.apply(&Event::UserJoined { user: "bob".into(), channel: "#a".into() });
        s.apply(&Event::UserJoined { user: "bob".into(), channel: "#b".into() });
        s.apply(&Event::UserJoined { user: "amy".into(), channel: "#b".into() });

        s.apply(&Event::UserRenamed { old_name: "bob".into(), new_name: "rob".into() });
        assert_eq!(s.members("#a"), vec!["rob"]);
        assert_eq!(s.members("#b"), vec!["amy", "rob"]);

        s.apply(&Event::UserQuit { user: "rob".into(), message: "gone".into() });
        assert!(s.members("#a").is_empty());
        assert_eq!(s.members("#b"), vec!["amy"]);

        s.apply(&Event::UserKicked {
            kickee: "amy".into(),
            channel: "#b".into(),
            kicker: "op".into(),
            message: "".into(),
        });
        assert!(s.members("#b").is_empty());
    }

    #[test]
    fn test_mode_maps() {
        let mut s = session();
        s.apply(&Event::ModeChanged {
            user: "op!o@h".into(),
            channel: "#a".into(),
            set: true,
            modes: "tk".into(),
            args: vec![None, Some("key".into())],
        });
        let modes = &s.channel_modes["#a"];
        assert_eq!(modes[&'t'].set_by.as_deref(), Some("op!o@h"));
        assert_eq!(modes.len(), 2);

        s.apply(&Event::ModeChanged {
            user: "op!o@h".into(),
            channel: "#a".into(),
            set: false,
            modes: "t".into(),
            args: vec![None],
        });
        assert!(!s.channel_modes["#a"].contains_key(&'t'));

        s.apply(&Event::ModeChanged {
            user: "cassbot".into(),
            channel: "cassbot".into(),
            set: true,
            modes: "i".into(),
            args: vec![None],
        });
        assert!(s.server_modes["cassbot"].contains_key(&'i'));
    }

    #[test]
    fn test_sign_on_and_disconnect() {
        let mut s = session();
        assert_eq!(
            s.apply(&Event::SignedOn),
            FollowUp::JoinChannels(vec!["#a".into(), "#b".into()])
        );
        assert!(s.is_signed_on);
        assert!(s.signed_on_at.is_some());

        s.apply(&Event::Disconnected { reason: "eof".into() });
        assert!(!s.is_signed_on);
    }

    #[test]
    fn test_nick_change_and_server_info() {
        let mut s = session();
        s.apply(&Event::NickChanged { nick: "cassbot_".into() });
        assert_eq!(s.nickname, "cassbot_");

        s.apply(&Event::MyInfo {
            server_name: "irc.example.org".into(),
            version: "ircd-1".into(),
            user_modes: "iow".into(),
            channel_modes: "ntk".into(),
        });
        assert_eq!(s.server.name.as_deref(), Some("irc.example.org"));
    }

    #[test]
    fn test_privmsg_is_inspected() {
        let mut s = session();
        let follow = s.apply(&Event::Privmsg {
            user: "bob!b@h".into(),
            channel: "#a".into(),
            message: "!logs".into(),
        });
        assert!(matches!(follow, FollowUp::Inspect { .. }));
    }
}
