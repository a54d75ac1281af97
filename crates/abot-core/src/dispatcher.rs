//! Routes each inbound update through the access filter, the command parser
//! and the processor chain.
//!
//! Updates are handled strictly one at a time, in arrival order: an edit is
//! always correlated against a reply that was sent before it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    bot::Bot,
    builtins::Builtins,
    commands::{CommandParser, ParsedCommand, SUPER_COMMAND_OWNER},
    firewall::{self, AccessContext},
    messaging::types::Update,
    processor::{DispatchHandler, Processor},
    users::Role,
    Result,
};

pub struct Dispatcher {
    bot: Bot,
    parser: CommandParser,
    /// Registered processors followed by the built-ins.
    chain: Vec<Arc<dyn Processor>>,
    builtins: Arc<Builtins>,
}

impl Dispatcher {
    /// Snapshots the processors registered on `bot` so far.
    pub async fn new(bot: Bot) -> Self {
        let registered = bot.processors().await;
        let builtins = Arc::new(Builtins::new(registered.clone()));

        let mut chain = registered;
        chain.push(builtins.clone());

        let parser = CommandParser::new(
            bot.identity().username.clone(),
            bot.config().await.command_word,
        );

        Self {
            bot,
            parser,
            chain,
            builtins,
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Consume updates until the stream ends or a processor fails.
    ///
    /// Settings are written out before returning either way.
    pub async fn run(&self, mut updates: mpsc::Receiver<Update>) -> Result<()> {
        info!("listening for updates");
        let mut outcome = Ok(());
        while let Some(update) = updates.recv().await {
            if let Err(e) = self.dispatch(&update).await {
                error!(chat_id = update.chat_id.0, "dispatch failed: {e}");
                outcome = Err(e);
                break;
            }
        }

        if let Err(e) = self.bot.save_config_now().await {
            warn!("final settings save failed: {e}");
        }
        outcome
    }

    pub async fn dispatch(&self, update: &Update) -> Result<()> {
        if update.sender_is_bot {
            debug!(sender = update.sender_id.0, "update from a bot ignored");
            return Ok(());
        }

        let cfg = self.bot.config().await;
        let directory = self.bot.directory();
        let command = self.parser.parse(update);
        let known = directory.contains(update.sender_id).await;

        let access = firewall::decide(
            update,
            AccessContext {
                sender_known: known,
                process_group_messages: cfg.process_group_messages,
                command: command.as_ref(),
            },
        );
        if !access.allowed {
            return Ok(());
        }

        // An owner claim carries the secure token; only the built-ins see it.
        let owner_claim =
            !known && command.as_ref().is_some_and(|c| c.name == SUPER_COMMAND_OWNER);
        if !owner_claim {
            for p in &self.chain {
                if p.process_update(&self.bot, update).await? {
                    debug!(processor = p.name(), "update consumed");
                    return Ok(());
                }
            }
        }

        let mut handler = self.build_handler(update).await;

        if access.can_parse_commands {
            if let Some(cmd) = command {
                return self.dispatch_command(update, &mut handler, known, cmd).await;
            }
        }

        if !cfg.process_group_messages || self.builtins.is_silenced().await {
            return Ok(());
        }

        for p in &self.chain {
            if p.process_message(&self.bot, &handler, &update.text).await? {
                debug!(processor = p.name(), "message handled");
                break;
            }
        }
        Ok(())
    }

    async fn dispatch_command(
        &self,
        update: &Update,
        handler: &mut DispatchHandler,
        known: bool,
        cmd: ParsedCommand,
    ) -> Result<()> {
        debug!(
            chat_id = update.chat_id.0,
            user_id = update.sender_id.0,
            command = %cmd.name,
            args = ?cmd.args,
            "command"
        );

        let directory = self.bot.directory();
        let private_chat = update.is_private.then_some(update.chat_id);
        if directory
            .sync_profile(
                update.sender_id,
                update.sender_username.as_deref(),
                private_chat,
            )
            .await
        {
            self.bot.save_config().await;
        }
        if let Some(user) = directory.get(update.sender_id).await {
            handler.role = user.role;
        }

        // Unknown senders only get here with the owner claim; keep them away
        // from registered processors.
        if !known {
            self.builtins
                .process_command(&self.bot, handler, &cmd.name, &cmd.args)
                .await?;
            return Ok(());
        }

        for p in &self.chain {
            if p.process_command(&self.bot, handler, &cmd.name, &cmd.args)
                .await?
            {
                debug!(processor = p.name(), command = %cmd.name, "command handled");
                return Ok(());
            }
        }
        debug!(command = %cmd.name, "command not handled");
        Ok(())
    }

    async fn build_handler(&self, update: &Update) -> DispatchHandler {
        let edit_target = if update.is_edit() {
            let target = self.bot.ledger().lookup_reply_target(update.message_ref()).await;
            if target.is_none() {
                debug!(
                    message_id = update.effective_message_id().0,
                    "edited message without a remembered reply"
                );
            }
            target
        } else {
            None
        };

        let role = self
            .bot
            .directory()
            .get(update.sender_id)
            .await
            .map(|u| u.role)
            .unwrap_or(Role::None);

        DispatchHandler {
            user_id: update.sender_id,
            username: update.sender_username.clone().unwrap_or_default(),
            role,
            chat_id: update.chat_id,
            is_private: update.is_private,
            message_id: update.effective_message_id(),
            edit_target,
            reply_user_id: update.reply_to_sender_id,
            reply_username: update.reply_to_username.clone().unwrap_or_default(),
        }
    }
}
