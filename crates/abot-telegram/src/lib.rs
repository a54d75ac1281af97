//! Telegram adapter (teloxide).
//!
//! This crate implements the `abot-core` MessagingPort over Telegram Bot API
//! and feeds the dispatcher from a long-polling loop.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode};

use tokio::time::sleep;

pub mod polling;
pub mod updates;

use abot_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{MessageEdit, OutgoingMessage, TextFormat},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn parse_mode(format: TextFormat) -> ParseMode {
        match format {
            TextFormat::Html => ParseMode::Html,
            TextFormat::MarkdownV2 => ParseMode::MarkdownV2,
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_message(&self, msg: OutgoingMessage) -> Result<MessageRef> {
        let sent = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::tg_chat(msg.chat_id), msg.text.clone())
                    .parse_mode(Self::parse_mode(msg.format))
                    .disable_web_page_preview(!msg.link_preview);
                if let Some(reply_to) = msg.reply_to {
                    req = req.reply_to_message_id(Self::tg_msg_id(reply_to));
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id: msg.chat_id,
            message_id: MessageId(sent.id.0),
        })
    }

    async fn edit_message(&self, edit: MessageEdit) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .edit_message_text(
                    Self::tg_chat(edit.target.chat_id),
                    Self::tg_msg_id(edit.target.message_id),
                    edit.text.clone(),
                )
                .parse_mode(Self::parse_mode(edit.format))
                .disable_web_page_preview(!edit.link_preview)
        })
        .await?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }
}
