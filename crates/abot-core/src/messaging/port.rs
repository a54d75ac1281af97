use async_trait::async_trait;

use crate::{
    domain::MessageRef,
    messaging::types::{MessageEdit, OutgoingMessage},
    Result,
};

/// Outbound side of the chat transport.
///
/// Implemented by the Telegram adapter; tests use an in-memory fake.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_message(&self, msg: OutgoingMessage) -> Result<MessageRef>;
    async fn edit_message(&self, edit: MessageEdit) -> Result<()>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;
}
