//! The bot handle shared by the dispatcher and every processor.
//!
//! Holds the live configuration, the user directory, the sent-message ledger
//! and the outbound port, and knows how to persist itself (debounced).

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    debounce::Debouncer,
    domain::{ChatId, MessageRef, UserId},
    errors::Error,
    ledger::SentMessageLedger,
    messaging::{
        port::MessagingPort,
        types::{MessageEdit, OutgoingMessage, ResponseOptions},
    },
    processor::{DispatchHandler, Processor},
    settings::{scope_key, SettingsDocument, SettingsStore},
    users::UserDirectory,
    Result,
};

/// Quiet period before a scheduled settings write hits the disk.
pub const SAVE_AFTER: Duration = Duration::from_secs(5);

/// Notice left in a group when the real answer went to a private chat.
const PRIVATE_NOTICE: &str = "pvt";

/// Who the bot is on the platform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: UserId,
    pub username: String,
}

/// Scalar settings; users and processor blocks live elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotConfig {
    pub secure_token: String,
    pub recover_old_updates: bool,
    pub command_word: String,
    pub process_group_messages: bool,
    pub silence_timeout_minutes: u64,
    pub owner_id: UserId,
}

#[derive(Clone)]
struct Registration {
    scope: String,
    processor: Arc<dyn Processor>,
}

#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

struct BotInner {
    identity: BotIdentity,
    messenger: Arc<dyn MessagingPort>,
    store: Option<SettingsStore>,

    config: Mutex<BotConfig>,
    directory: UserDirectory,
    ledger: SentMessageLedger,

    processors: Mutex<Vec<Registration>>,
    /// Processor blocks as loaded; unclaimed keys are written back unchanged.
    scopes: Mutex<BTreeMap<String, serde_json::Value>>,

    saver: Debouncer,
}

impl Bot {
    /// `store` is where settings are saved; `None` keeps everything in memory.
    pub fn new(
        identity: BotIdentity,
        messenger: Arc<dyn MessagingPort>,
        doc: SettingsDocument,
        store: Option<SettingsStore>,
    ) -> Self {
        let SettingsDocument {
            secure_token,
            recover_old_updates,
            command_word,
            process_group_messages,
            silence_timeout_minutes,
            owner_id,
            users,
            scopes,
        } = doc;

        Self {
            inner: Arc::new(BotInner {
                identity,
                messenger,
                store,
                config: Mutex::new(BotConfig {
                    secure_token,
                    recover_old_updates,
                    command_word,
                    process_group_messages,
                    silence_timeout_minutes,
                    owner_id,
                }),
                directory: UserDirectory::new(users),
                ledger: SentMessageLedger::default(),
                processors: Mutex::new(Vec::new()),
                scopes: Mutex::new(scopes),
                saver: Debouncer::new(),
            }),
        }
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.inner.identity
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.inner.directory
    }

    pub fn ledger(&self) -> &SentMessageLedger {
        &self.inner.ledger
    }

    pub async fn config(&self) -> BotConfig {
        self.inner.config.lock().await.clone()
    }

    /// Add a processor to the end of the chain and hand it its stored settings.
    ///
    /// Must happen before the dispatcher is built; the dispatcher snapshots the
    /// chain once.
    pub async fn register_processor(
        &self,
        scope: &str,
        processor: Arc<dyn Processor>,
    ) -> Result<()> {
        let key = scope_key(scope);
        if key.is_empty() {
            return Err(Error::Config("processor scope must not be empty".to_string()));
        }

        let stored = self.inner.scopes.lock().await.get(&key).cloned();
        if let Some(value) = stored {
            processor.apply_settings(value).map_err(|e| {
                Error::Config(format!("invalid settings for scope {key}: {e}"))
            })?;
        }

        info!(scope = %key, processor = processor.name(), "processor registered");
        self.inner.processors.lock().await.push(Registration {
            scope: key,
            processor,
        });
        Ok(())
    }

    /// Registered processors in registration order.
    pub async fn processors(&self) -> Vec<Arc<dyn Processor>> {
        self.inner
            .processors
            .lock()
            .await
            .iter()
            .map(|r| r.processor.clone())
            .collect()
    }

    /// Make `user_id` the owner, binding the private chat the claim came from.
    pub async fn claim_owner(&self, user_id: UserId, username: &str, private_chat: ChatId) {
        self.inner
            .directory
            .reset_owner(user_id, username, private_chat)
            .await;
        self.inner.config.lock().await.owner_id = user_id;
        self.save_config().await;
    }

    // ---------- persistence ----------

    /// Schedule a settings write; calls within [`SAVE_AFTER`] collapse into one.
    pub async fn save_config(&self) {
        if self.inner.store.is_none() {
            return;
        }
        let bot = self.clone();
        self.inner
            .saver
            .schedule(SAVE_AFTER, async move {
                if let Err(e) = bot.write_settings().await {
                    warn!("debounced settings save failed: {e}");
                }
            })
            .await;
    }

    /// Write settings immediately, dropping any pending debounced write.
    pub async fn save_config_now(&self) -> Result<()> {
        self.inner.saver.cancel().await;
        self.write_settings().await
    }

    async fn write_settings(&self) -> Result<()> {
        let Some(store) = &self.inner.store else {
            return Ok(());
        };
        let doc = self.snapshot().await;
        store.save(&doc).await
    }

    /// Current state as a settings document.
    pub async fn snapshot(&self) -> SettingsDocument {
        let cfg = self.config().await;
        let users = self.inner.directory.list().await;
        let registrations = self.inner.processors.lock().await.clone();

        let mut scopes = self.inner.scopes.lock().await.clone();
        for r in registrations {
            if let Some(v) = r.processor.settings() {
                scopes.insert(r.scope, v);
            }
        }

        SettingsDocument {
            secure_token: cfg.secure_token,
            recover_old_updates: cfg.recover_old_updates,
            command_word: cfg.command_word,
            process_group_messages: cfg.process_group_messages,
            silence_timeout_minutes: cfg.silence_timeout_minutes,
            owner_id: cfg.owner_id,
            users,
            scopes,
        }
    }

    // ---------- responses ----------

    pub fn new_response_options(&self) -> ResponseOptions {
        ResponseOptions::default()
    }

    /// Answer the message `handler` was built for.
    ///
    /// Delivery failures are logged and swallowed: one undeliverable reply must
    /// not stop the update stream.
    pub async fn send_message_response(
        &self,
        handler: &DispatchHandler,
        text: &str,
        opt: ResponseOptions,
    ) {
        self.deliver(handler, text, opt, true).await;
    }

    /// Answer in the sender's private chat, leaving a short notice in the group.
    pub async fn send_message_response_to_private(
        &self,
        handler: &DispatchHandler,
        text: &str,
        opt: ResponseOptions,
    ) {
        let private = ResponseOptions {
            force_private: true,
            ..opt
        };
        self.deliver(handler, text, private, true).await;

        if !handler.is_private && handler.edit_target.is_none() {
            let notice = ResponseOptions {
                force_private: false,
                reply_to_sender_message: true,
                replace_sender_message: false,
                ..opt
            };
            self.deliver(handler, PRIVATE_NOTICE, notice, false).await;
        }
    }

    pub async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.inner.messenger.delete_message(msg).await
    }

    async fn deliver(
        &self,
        handler: &DispatchHandler,
        text: &str,
        opt: ResponseOptions,
        record: bool,
    ) {
        let chat_id = if opt.force_private && !handler.is_private {
            let bound = self
                .inner
                .directory
                .get(handler.user_id)
                .await
                .and_then(|u| u.private_chat_id);
            match bound {
                Some(chat) => chat,
                None => {
                    warn!(
                        user_id = handler.user_id.0,
                        "cannot send to private chat: none bound for user"
                    );
                    return;
                }
            }
        } else {
            handler.chat_id
        };

        // An edit only makes sense in the chat the earlier reply lives in.
        if let Some(target) = handler.edit_target.filter(|t| t.chat_id == chat_id) {
            let edit = MessageEdit {
                target,
                text: text.to_string(),
                format: opt.format(),
                link_preview: opt.show_link_preview,
            };
            if let Err(e) = self.inner.messenger.edit_message(edit).await {
                warn!(chat_id = chat_id.0, "edit failed: {e}");
            }
            return;
        }

        let reply_to = (opt.reply_to_sender_message
            && chat_id == handler.chat_id
            && !opt.replace_sender_message)
            .then_some(handler.message_id);

        let outgoing = OutgoingMessage {
            chat_id,
            text: text.to_string(),
            reply_to,
            format: opt.format(),
            link_preview: opt.show_link_preview,
        };
        let sent = match self.inner.messenger.send_message(outgoing).await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(chat_id = chat_id.0, "send failed: {e}");
                return;
            }
        };

        if opt.replace_sender_message {
            if let Err(e) = self.inner.messenger.delete_message(handler.message_ref()).await {
                warn!(chat_id = handler.chat_id.0, "delete failed: {e}");
            }
        } else if record {
            debug!(
                inbound = handler.message_id.0,
                outbound = sent.message_id.0,
                "reply recorded"
            );
            self.inner.ledger.record_send(handler.message_ref(), sent).await;
        }
    }
}
