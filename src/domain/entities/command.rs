use crate::domain::mask::nick_of;

/// An explicitly addressed command, ready for routing to plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Case-folded command verb
    pub verb: String,
    pub args: Vec<String>,
    /// Full principal of the requester (`nick!user@host`)
    pub user: String,
    /// Channel the command arrived on; the bot's own nickname when private
    pub channel: String,
}

impl CommandRequest {
    pub fn new(verb: impl Into<String>, args: Vec<String>, user: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            verb: verb.into().to_lowercase(),
            args,
            user: user.into(),
            channel: channel.into(),
        }
    }

    pub fn nick(&self) -> &str {
        nick_of(&self.user)
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}
