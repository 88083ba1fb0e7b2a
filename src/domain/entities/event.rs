//! Inbound lifecycle events, as delivered by the protocol layer.

use std::fmt;

/// The fixed set of lifecycle event names plugins can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Connected,
    Created,
    YourHost,
    MyInfo,
    LuserClient,
    Bounce,
    ISupport,
    LuserChannels,
    LuserOp,
    LuserMe,
    Privmsg,
    Joined,
    Left,
    Noticed,
    ModeChanged,
    SignedOn,
    KickedFrom,
    NickChanged,
    UserJoined,
    UserLeft,
    UserQuit,
    UserKicked,
    Action,
    TopicUpdated,
    UserRenamed,
    ReceivedMotd,
    MessageSent,
    Disconnected,
}

impl EventKind {
    pub const ALL: [EventKind; 28] = [
        EventKind::Connected,
        EventKind::Created,
        EventKind::YourHost,
        EventKind::MyInfo,
        EventKind::LuserClient,
        EventKind::Bounce,
        EventKind::ISupport,
        EventKind::LuserChannels,
        EventKind::LuserOp,
        EventKind::LuserMe,
        EventKind::Privmsg,
        EventKind::Joined,
        EventKind::Left,
        EventKind::Noticed,
        EventKind::ModeChanged,
        EventKind::SignedOn,
        EventKind::KickedFrom,
        EventKind::NickChanged,
        EventKind::UserJoined,
        EventKind::UserLeft,
        EventKind::UserQuit,
        EventKind::UserKicked,
        EventKind::Action,
        EventKind::TopicUpdated,
        EventKind::UserRenamed,
        EventKind::ReceivedMotd,
        EventKind::MessageSent,
        EventKind::Disconnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Created => "created",
            EventKind::YourHost => "your-host",
            EventKind::MyInfo => "my-info",
            EventKind::LuserClient => "luser-client",
            EventKind::Bounce => "bounce",
            EventKind::ISupport => "isupport",
            EventKind::LuserChannels => "luser-channels",
            EventKind::LuserOp => "luser-op",
            EventKind::LuserMe => "luser-me",
            EventKind::Privmsg => "privmsg",
            EventKind::Joined => "joined",
            EventKind::Left => "left",
            EventKind::Noticed => "noticed",
            EventKind::ModeChanged => "mode-changed",
            EventKind::SignedOn => "signed-on",
            EventKind::KickedFrom => "kicked-from",
            EventKind::NickChanged => "nick-changed",
            EventKind::UserJoined => "user-joined",
            EventKind::UserLeft => "user-left",
            EventKind::UserQuit => "user-quit",
            EventKind::UserKicked => "user-kicked",
            EventKind::Action => "action",
            EventKind::TopicUpdated => "topic-updated",
            EventKind::UserRenamed => "user-renamed",
            EventKind::ReceivedMotd => "received-motd",
            EventKind::MessageSent => "message-sent",
            EventKind::Disconnected => "disconnected",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded protocol event with its argument shape.
///
/// `user` fields carry the full `nick!user@host` principal where the
/// protocol provides one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connected,
    Created { when: String },
    YourHost { info: String },
    MyInfo {
        server_name: String,
        version: String,
        user_modes: String,
        channel_modes: String,
    },
    LuserClient { info: String },
    Bounce { info: String },
    ISupport { options: Vec<String> },
    LuserChannels { channels: u32 },
    LuserOp { ops: u32 },
    LuserMe { info: String },
    Privmsg { user: String, channel: String, message: String },
    Joined { channel: String },
    Left { channel: String },
    Noticed { user: String, channel: String, message: String },
    ModeChanged {
        user: String,
        channel: String,
        set: bool,
        modes: String,
        args: Vec<Option<String>>,
    },
    SignedOn,
    KickedFrom { channel: String, kicker: String, message: String },
    NickChanged { nick: String },
    UserJoined { user: String, channel: String },
    UserLeft { user: String, channel: String },
    UserQuit { user: String, message: String },
    UserKicked {
        kickee: String,
        channel: String,
        kicker: String,
        message: String,
    },
    Action { user: String, channel: String, data: String },
    TopicUpdated { user: String, channel: String, topic: String },
    UserRenamed { old_name: String, new_name: String },
    ReceivedMotd { motd: Vec<String> },
    MessageSent { target: String, text: String },
    Disconnected { reason: String },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connected => EventKind::Connected,
            Event::Created { .. } => EventKind::Created,
            Event::YourHost { .. } => EventKind::YourHost,
            Event::MyInfo { .. } => EventKind::MyInfo,
            Event::LuserClient { .. } => EventKind::LuserClient,
            Event::Bounce { .. } => EventKind::Bounce,
            Event::ISupport { .. } => EventKind::ISupport,
            Event::LuserChannels { .. } => EventKind::LuserChannels,
            Event::LuserOp { .. } => EventKind::LuserOp,
            Event::LuserMe { .. } => EventKind::LuserMe,
            Event::Privmsg { .. } => EventKind::Privmsg,
            Event::Joined { .. } => EventKind::Joined,
            Event::Left { .. } => EventKind::Left,
            Event::Noticed { .. } => EventKind::Noticed,
            Event::ModeChanged { .. } => EventKind::ModeChanged,
            Event::SignedOn => EventKind::SignedOn,
            Event::KickedFrom { .. } => EventKind::KickedFrom,
            Event::NickChanged { .. } => EventKind::NickChanged,
            Event::UserJoined { .. } => EventKind::UserJoined,
            Event::UserLeft { .. } => EventKind::UserLeft,
            Event::UserQuit { .. } => EventKind::UserQuit,
            Event::UserKicked { .. } => EventKind::UserKicked,
            Event::Action { .. } => EventKind::Action,
            Event::TopicUpdated { .. } => EventKind::TopicUpdated,
            Event::UserRenamed { .. } => EventKind::UserRenamed,
            Event::ReceivedMotd { .. } => EventKind::ReceivedMotd,
            Event::MessageSent { .. } => EventKind::MessageSent,
            Event::Disconnected { .. } => EventKind::Disconnected,
        }
    }
}
