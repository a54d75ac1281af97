//! Pluggable handlers offered every update, command and message in order.

use async_trait::async_trait;

use crate::{
    bot::Bot,
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::Update,
    users::Role,
    Result,
};

/// Per-update context handed to processors; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchHandler {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,

    pub chat_id: ChatId,
    pub is_private: bool,

    /// The sender's message this handler answers.
    pub message_id: MessageId,
    /// Set when the sender edited a message the bot already replied to: the
    /// response edits that reply instead of sending a new message.
    pub edit_target: Option<MessageRef>,

    /// Author of the message the sender replied to, if any.
    pub reply_user_id: Option<UserId>,
    pub reply_username: String,
}

impl DispatchHandler {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef::new(self.chat_id, self.message_id)
    }
}

/// A link in the dispatch chain.
///
/// Every hook returns `Ok(true)` when it handled its input, which stops the
/// chain; `Ok(false)` yields to the next processor. An `Err` aborts dispatch
/// and stops the update loop, so recoverable failures should be reported to
/// the user and returned as `Ok(true)`.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Name used in logs and the `ping` roll call.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Help lines appended to the `help` command output.
    fn help(&self) -> String {
        String::new()
    }

    fn version(&self) -> String {
        "0.0.1".to_string()
    }

    /// Current configuration block, saved under the processor's scope key.
    fn settings(&self) -> Option<serde_json::Value> {
        None
    }

    /// Called at registration with the block stored under the scope key.
    fn apply_settings(&self, _value: serde_json::Value) -> Result<()> {
        Ok(())
    }

    /// Raw access to every allowed update, before command parsing.
    async fn process_update(&self, _bot: &Bot, _update: &Update) -> Result<bool> {
        Ok(false)
    }

    async fn process_command(
        &self,
        _bot: &Bot,
        _handler: &DispatchHandler,
        _command: &str,
        _args: &[String],
    ) -> Result<bool> {
        Ok(false)
    }

    /// Plain (non-command) text, only when group message processing is on.
    async fn process_message(
        &self,
        _bot: &Bot,
        _handler: &DispatchHandler,
        _text: &str,
    ) -> Result<bool> {
        Ok(false)
    }
}
