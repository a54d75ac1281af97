use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// Immutable snapshot of one inbound chat event.
///
/// Transport adapters build it from either a new or an edited message, never
/// both. For an edit, `edited_message_id` carries the id of the message being
/// edited (Telegram reuses the original id).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Update {
    pub message_id: MessageId,
    pub edited_message_id: Option<MessageId>,
    pub sender_id: UserId,
    pub sender_username: Option<String>,
    pub sender_is_bot: bool,
    pub chat_id: ChatId,
    pub is_private: bool,
    pub text: String,
    pub reply_to_sender_id: Option<UserId>,
    pub reply_to_username: Option<String>,
}

impl Update {
    pub fn is_edit(&self) -> bool {
        self.edited_message_id.is_some()
    }

    /// The message this update is about: the edited one if present.
    pub fn effective_message_id(&self) -> MessageId {
        self.edited_message_id.unwrap_or(self.message_id)
    }

    pub fn message_ref(&self) -> MessageRef {
        MessageRef::new(self.chat_id, self.effective_message_id())
    }
}

/// Text markup the transport should apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextFormat {
    #[default]
    Html,
    MarkdownV2,
}

/// A new message to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub format: TextFormat,
    pub link_preview: bool,
}

/// Replacement text for a message the bot sent earlier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEdit {
    pub target: MessageRef,
    pub text: String,
    pub format: TextFormat,
    pub link_preview: bool,
}

/// How a processor wants its response delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseOptions {
    /// Answer in the sender's private chat even if the command came from a group.
    pub force_private: bool,
    /// Quote the sender's message (only when answering in the same chat).
    pub reply_to_sender_message: bool,
    /// Delete the sender's message after answering.
    pub replace_sender_message: bool,
    pub show_link_preview: bool,
    pub use_html_format: bool,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            force_private: false,
            reply_to_sender_message: true,
            replace_sender_message: false,
            show_link_preview: true,
            use_html_format: true,
        }
    }
}

impl ResponseOptions {
    pub fn format(&self) -> TextFormat {
        if self.use_html_format {
            TextFormat::Html
        } else {
            TextFormat::MarkdownV2
        }
    }
}
