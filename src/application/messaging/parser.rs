//! Message parser - Detects addressed commands and splits them into words

use crate::application::errors::CommandError;

/// What a privmsg turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressed {
    /// Not directed at the bot
    Chatter,
    /// Directed at the bot; verb (case-folded) and arguments
    Command { verb: String, args: Vec<String> },
    /// Directed at the bot but only whitespace followed
    Empty,
}

/// Recognizes commands addressed to the bot
pub struct MessageParser {
    nickname: String,
    command_prefix: Option<String>,
}

impl MessageParser {
    pub fn new(nickname: impl Into<String>, command_prefix: Option<String>) -> Self {
        Self {
            nickname: nickname.into(),
            command_prefix: command_prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Extract the command text from a message, if it is addressed to us.
    ///
    /// `<nick>:` / `<nick>,` wins over the prefix; a private message is a
    /// command even without either.
    pub fn command_text<'a>(&self, channel: &str, message: &'a str) -> Option<&'a str> {
        if let Some(rest) = self.strip_nick(message) {
            return Some(rest);
        }
        if let Some(prefix) = &self.command_prefix {
            if let Some(rest) = message.strip_prefix(prefix.as_str()) {
                return Some(rest);
            }
        }
        if channel.eq_ignore_ascii_case(&self.nickname) {
            return Some(message);
        }
        None
    }

    fn strip_nick<'a>(&self, message: &'a str) -> Option<&'a str> {
        let head = message.get(..self.nickname.len())?;
        if !head.eq_ignore_ascii_case(&self.nickname) {
            return None;
        }
        let rest = &message[self.nickname.len()..];
        rest.strip_prefix(':').or_else(|| rest.strip_prefix(','))
    }

    /// Classify a privmsg
    pub fn parse(&self, channel: &str, message: &str) -> Result<Addressed, CommandError> {
        let Some(text) = self.command_text(channel, message) else {
            return Ok(Addressed::Chatter);
        };

        let mut words = split_words(text.trim())?.into_iter();
        match words.next() {
            Some(verb) => Ok(Addressed::Command {
                verb: verb.to_lowercase(),
                args: words.collect(),
            }),
            None => Ok(Addressed::Empty),
        }
    }
}

/// Split a line into words using POSIX shell quoting rules.
///
/// Single quotes are literal, double quotes honour `\"`, `\\`, `\$` and
/// `` \` ``, a backslash outside quotes escapes the next character.
pub fn split_words(input: &str) -> Result<Vec<String>, CommandError> {
    #[derive(PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.next() {
                    Some(n @ ('"' | '\\' | '$' | '`')) => current.push(n),
                    Some('\n') => {}
                    Some(n) => {
                        current.push('\\');
                        current.push(n);
                    }
                    None => return Err(CommandError::Parse("No escaped character".to_string())),
                },
                _ => current.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_word = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_word = true;
                }
                '\\' => match chars.next() {
                    Some('\n') => {}
                    Some(n) => {
                        current.push(n);
                        in_word = true;
                    }
                    None => return Err(CommandError::Parse("No escaped character".to_string())),
                },
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if quote != Quote::None {
        return Err(CommandError::Parse("No closing quotation".to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
