//! Per-update access decision.
//!
//! Rules in order:
//! 1. updates authored by bots are dropped;
//! 2. the owner-claim super-command in a private chat always passes, so an
//!    empty directory can be bootstrapped;
//! 3. known senders pass and may issue commands;
//! 4. unknown senders in groups pass without command rights when group
//!    message processing is enabled;
//! 5. everything else is dropped.

use tracing::debug;

use crate::{
    commands::{ParsedCommand, SUPER_COMMAND_OWNER},
    messaging::types::Update,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub can_parse_commands: bool,
}

impl AccessDecision {
    pub const DENY: Self = Self {
        allowed: false,
        can_parse_commands: false,
    };
    pub const FULL: Self = Self {
        allowed: true,
        can_parse_commands: true,
    };
    pub const MESSAGES_ONLY: Self = Self {
        allowed: true,
        can_parse_commands: false,
    };
}

/// Inputs the firewall needs besides the update itself.
#[derive(Clone, Copy, Debug)]
pub struct AccessContext<'a> {
    pub sender_known: bool,
    pub process_group_messages: bool,
    /// Command parsed from the update, if any; used to spot the super-command.
    pub command: Option<&'a ParsedCommand>,
}

pub fn decide(update: &Update, ctx: AccessContext<'_>) -> AccessDecision {
    if update.sender_is_bot {
        debug!(sender = update.sender_id.0, "(firewall) update from a bot");
        return AccessDecision::DENY;
    }

    let is_owner_claim = ctx
        .command
        .is_some_and(|c| c.name == SUPER_COMMAND_OWNER);
    if is_owner_claim && update.is_private {
        return AccessDecision::FULL;
    }

    if ctx.sender_known {
        return AccessDecision::FULL;
    }

    if ctx.process_group_messages && !update.is_private {
        return AccessDecision::MESSAGES_ONLY;
    }

    debug!(
        sender = update.sender_id.0,
        "(firewall) sender not in allowed users"
    );
    AccessDecision::DENY
}
