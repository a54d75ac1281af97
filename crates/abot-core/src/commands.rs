//! Command extraction from free-form message text.
//!
//! Accepted forms, first match wins:
//! - `/command args` or `/command@botname args`
//! - `@botname command args` or `<command word> command args` (any chat)
//! - `command args` (private chats only)

use crate::messaging::types::Update;

/// Resets the bot owner; valid only in private chats with the secure token.
pub const SUPER_COMMAND_OWNER: &str = "owner";

pub const COMMAND_HELP: &str = "help";
pub const COMMAND_PING: &str = "ping";
pub const COMMAND_SILENCE: &str = "silence";
pub const COMMAND_USER: &str = "user";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    /// Never absent; empty when the command has no arguments.
    pub args: Vec<String>,
}

impl ParsedCommand {
    fn from_tokens(name: &str, rest: &[&str]) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            args: rest.iter().map(|s| s.to_string()).collect(),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandParser {
    bot_username: String,
    command_word: String,
}

impl CommandParser {
    pub fn new(bot_username: impl Into<String>, command_word: impl Into<String>) -> Self {
        Self {
            bot_username: bot_username.into(),
            command_word: command_word.into(),
        }
    }

    pub fn parse(&self, update: &Update) -> Option<ParsedCommand> {
        self.parse_text(&update.text, update.is_private)
    }

    pub fn parse_text(&self, text: &str, is_private: bool) -> Option<ParsedCommand> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        let (&first, rest) = fields.split_first()?;

        if let Some(slash) = first.strip_prefix('/') {
            return self.parse_native(slash, rest);
        }

        if self.is_addressed_prefix(first) {
            let (&name, args) = rest.split_first()?;
            return ParsedCommand::from_tokens(name, args);
        }

        if !is_private {
            return None;
        }

        ParsedCommand::from_tokens(first, rest)
    }

    /// `/cmd` or `/cmd@bot`; a mention of a different bot is not for us.
    fn parse_native(&self, token: &str, rest: &[&str]) -> Option<ParsedCommand> {
        let (name, target) = match token.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (token, None),
        };

        if let Some(target) = target {
            if !self.bot_username.is_empty() && !target.eq_ignore_ascii_case(&self.bot_username)
            {
                return None;
            }
        }

        ParsedCommand::from_tokens(name, rest)
    }

    fn is_addressed_prefix(&self, token: &str) -> bool {
        if let Some(mention) = token.strip_prefix('@') {
            if !self.bot_username.is_empty() && mention.eq_ignore_ascii_case(&self.bot_username) {
                return true;
            }
        }
        !self.command_word.is_empty() && token == self.command_word
    }
}
