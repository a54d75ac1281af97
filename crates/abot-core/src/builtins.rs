//! Commands the bot answers itself: `help`, `ping`, `silence`, `owner`, `user`.
//!
//! Always the last link of the chain, so registered processors can shadow any
//! of these names.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use crate::{
    bot::Bot,
    commands::{COMMAND_HELP, COMMAND_PING, COMMAND_SILENCE, COMMAND_USER, SUPER_COMMAND_OWNER},
    domain::UserId,
    formatting::{escape_html, format_minutes},
    processor::{DispatchHandler, Processor},
    settings::MAX_SILENCE_TIMEOUT_MINUTES,
    silence::SilenceState,
    users::{AddOutcome, Role, User},
    Result,
};

const USER_HELP: &str = "<code>user</code> command usage:\n\
    \x20 <code>list</code>  Show users list\n\
    \x20 <code>add [id|@username]</code>  Add user to whitelist\n\
    \x20 <code>remove [id|@username]</code>  Remove user from whitelist\n\
    \x20 <code>group [id|@username] &lt;none|admin|owner&gt;</code>  Change user role\n\
    \x20 <code>email [id|@username] &lt;address|-&gt;</code>  Set or clear user email\n\
    \nHint: <code>id</code> could be avoided by replying to a user's message";

const OWN_HELP: &str = "/help  Show this help\n\
    /ping  List active processors\n\
    /silence [off]  Stop answering plain messages for a while\n\
    /user  Manage the whitelist\n";

/// Who a `user` subcommand is about.
enum Target {
    User { id: UserId, username: String },
    /// Nothing named and nothing replied to.
    Missing,
    Invalid(&'static str),
}

pub struct Builtins {
    silence: Mutex<SilenceState>,
    peers: Vec<Arc<dyn Processor>>,
}

impl Builtins {
    /// `peers` are the registered processors, for `help` and `ping`.
    pub fn new(peers: Vec<Arc<dyn Processor>>) -> Self {
        Self {
            silence: Mutex::new(SilenceState::default()),
            peers,
        }
    }

    pub async fn is_silenced(&self) -> bool {
        self.silence.lock().await.is_active(Instant::now())
    }

    async fn help_command(&self, bot: &Bot, handler: &DispatchHandler) {
        let mut text = String::new();
        for p in &self.peers {
            text.push_str(&p.help());
        }
        text.push_str(&self.help());
        bot.send_message_response(handler, &text, bot.new_response_options())
            .await;
    }

    async fn ping_command(&self, bot: &Bot, handler: &DispatchHandler) {
        let line = |name: &str, version: String| {
            format!("<b>{}</b> {}\n", escape_html(name), escape_html(&version))
        };
        let mut text = String::from("pong\n");
        for p in &self.peers {
            text.push_str(&line(p.name(), p.version()));
        }
        text.push_str(&line(self.name(), self.version()));
        bot.send_message_response(handler, &text, bot.new_response_options())
            .await;
    }

    async fn silence_command(&self, bot: &Bot, handler: &DispatchHandler, args: &[String]) {
        let now = Instant::now();
        let text = if args.first().is_some_and(|a| a.eq_ignore_ascii_case("off")) {
            if self.silence.lock().await.lift(now) {
                "I'm listening again".to_string()
            } else {
                "I wasn't silenced".to_string()
            }
        } else {
            let minutes = bot
                .config()
                .await
                .silence_timeout_minutes
                .clamp(1, MAX_SILENCE_TIMEOUT_MINUTES);
            self.silence
                .lock()
                .await
                .silence_for(now, Duration::from_secs(minutes.saturating_mul(60)));
            info!(minutes, "silenced");
            format!("Silenced for {}", format_minutes(minutes))
        };
        bot.send_message_response(handler, &text, bot.new_response_options())
            .await;
    }

    /// Unknown senders get here too; a wrong token or a group chat is ignored
    /// without an answer.
    async fn owner_command(&self, bot: &Bot, handler: &DispatchHandler, args: &[String]) {
        if !handler.is_private {
            debug!(user_id = handler.user_id.0, "owner claim outside a private chat");
            return;
        }
        let token = bot.config().await.secure_token;
        let Some(given) = args.first() else {
            return;
        };
        if token.is_empty() || *given != token {
            debug!(user_id = handler.user_id.0, "owner claim with a wrong token");
            return;
        }

        bot.claim_owner(handler.user_id, &handler.username, handler.chat_id)
            .await;
        bot.send_message_response(
            handler,
            "You are the owner of this bot, now",
            bot.new_response_options(),
        )
        .await;
    }

    async fn user_command(&self, bot: &Bot, handler: &DispatchHandler, args: &[String]) {
        let Some(sub) = args.first() else {
            show_user_help(bot, handler).await;
            return;
        };
        if !handler.role.can_manage_users() {
            bot.send_message_response(handler, "Permission denied", bot.new_response_options())
                .await;
            return;
        }

        let response = match sub.as_str() {
            "add" => self.user_add(bot, handler, args).await,
            "remove" => self.user_remove(bot, handler, args).await,
            "group" => self.user_group(bot, handler, args).await,
            "email" => self.user_email(bot, handler, args).await,
            "list" => Some(render_user_list(bot).await),
            _ => None,
        };

        match response {
            Some(text) => {
                bot.send_message_response(handler, &text, bot.new_response_options())
                    .await
            }
            None => show_user_help(bot, handler).await,
        }
    }

    async fn user_add(
        &self,
        bot: &Bot,
        handler: &DispatchHandler,
        args: &[String],
    ) -> Option<String> {
        let (id, username) = match resolve_target(bot, handler, args.get(1)).await {
            Target::User { id, username } => (id, username),
            Target::Missing => return None,
            Target::Invalid(msg) => return Some(msg.to_string()),
        };
        if id == handler.user_id {
            return Some("You are already in whitelist".to_string());
        }

        let text = match bot.directory().add(User::new(id, username.clone()), true).await {
            AddOutcome::AlreadyPresent => format!("User <b>{id}</b> already in whitelist"),
            AddOutcome::Added | AddOutcome::Replaced => {
                bot.save_config().await;
                format!(
                    "User <b>{id} {}</b> added to whitelist",
                    escape_html(&username)
                )
            }
        };
        Some(text)
    }

    async fn user_remove(
        &self,
        bot: &Bot,
        handler: &DispatchHandler,
        args: &[String],
    ) -> Option<String> {
        let id = match resolve_target(bot, handler, args.get(1)).await {
            Target::User { id, .. } => id,
            Target::Missing => return None,
            Target::Invalid(msg) => return Some(msg.to_string()),
        };
        if id == bot.config().await.owner_id {
            return Some("Cannot remove my owner".to_string());
        }

        if bot.directory().remove(id).await {
            bot.save_config().await;
            Some(format!("User <b>{id}</b> deleted from whitelist"))
        } else {
            Some(format!("User <b>{id}</b> not in whitelist"))
        }
    }

    /// `group [target] <role>`: the role is always the last argument.
    async fn user_group(
        &self,
        bot: &Bot,
        handler: &DispatchHandler,
        args: &[String],
    ) -> Option<String> {
        let (target, value) = split_target_value(args)?;
        let Some(role) = Role::parse(value) else {
            return Some(format!(
                "Unknown role <b>{}</b> (none, admin, owner)",
                escape_html(value)
            ));
        };
        if role == Role::Owner && handler.role != Role::Owner {
            return Some("Only the owner can grant the owner role".to_string());
        }

        let id = match resolve_target(bot, handler, target).await {
            Target::User { id, .. } => id,
            Target::Missing => return None,
            Target::Invalid(msg) => return Some(msg.to_string()),
        };
        if id == bot.config().await.owner_id {
            return Some("Cannot change my owner's role".to_string());
        }

        if bot.directory().set_role(id, role).await {
            bot.save_config().await;
            Some(format!("User <b>{id}</b> is now <b>{}</b>", role.as_str()))
        } else {
            Some(format!("User <b>{id}</b> not in whitelist"))
        }
    }

    /// `email [target] <address|->`: `-` clears the address.
    async fn user_email(
        &self,
        bot: &Bot,
        handler: &DispatchHandler,
        args: &[String],
    ) -> Option<String> {
        let (target, value) = split_target_value(args)?;
        let id = match resolve_target(bot, handler, target).await {
            Target::User { id, .. } => id,
            Target::Missing => return None,
            Target::Invalid(msg) => return Some(msg.to_string()),
        };

        let email = (value != "-").then(|| value.to_string());
        let text = match &email {
            Some(addr) => format!("User <b>{id}</b> email set to {}", escape_html(addr)),
            None => format!("User <b>{id}</b> email cleared"),
        };
        if bot.directory().set_email(id, email).await {
            bot.save_config().await;
            Some(text)
        } else {
            Some(format!("User <b>{id}</b> not in whitelist"))
        }
    }
}

#[async_trait]
impl Processor for Builtins {
    fn name(&self) -> &'static str {
        "abot"
    }

    fn help(&self) -> String {
        OWN_HELP.to_string()
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    async fn process_command(
        &self,
        bot: &Bot,
        handler: &DispatchHandler,
        command: &str,
        args: &[String],
    ) -> Result<bool> {
        match command {
            COMMAND_HELP => self.help_command(bot, handler).await,
            COMMAND_PING => self.ping_command(bot, handler).await,
            COMMAND_SILENCE => self.silence_command(bot, handler, args).await,
            SUPER_COMMAND_OWNER => self.owner_command(bot, handler, args).await,
            COMMAND_USER => self.user_command(bot, handler, args).await,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

async fn show_user_help(bot: &Bot, handler: &DispatchHandler) {
    bot.send_message_response_to_private(handler, USER_HELP, bot.new_response_options())
        .await;
}

/// `[sub, target, value]` or `[sub, value]`.
fn split_target_value(args: &[String]) -> Option<(Option<&String>, &str)> {
    match args {
        [_, target, value, ..] => Some((Some(target), value.as_str())),
        [_, value] => Some((None, value.as_str())),
        _ => None,
    }
}

/// An explicit id or `@username`, else the author of the replied-to message.
async fn resolve_target(bot: &Bot, handler: &DispatchHandler, token: Option<&String>) -> Target {
    let target = match token {
        Some(token) => match token.parse::<i64>() {
            Ok(id) if id > 0 => Target::User {
                id: UserId(id),
                username: String::new(),
            },
            Ok(_) => Target::Invalid("Invalid UserID"),
            Err(_) => match bot.directory().find_by_username(token).await {
                Some(u) => Target::User {
                    id: u.id,
                    username: u.username,
                },
                None => Target::Invalid("Invalid UserID"),
            },
        },
        None => match handler.reply_user_id {
            Some(id) => Target::User {
                id,
                username: handler.reply_username.clone(),
            },
            None => Target::Missing,
        },
    };

    match target {
        Target::User { id, .. } if id == bot.identity().user_id => {
            Target::Invalid("I can't do that to myself")
        }
        other => other,
    }
}

async fn render_user_list(bot: &Bot) -> String {
    let mut text = String::from("Users list:\n\n");
    for u in bot.directory().list().await {
        text.push_str(&u.id.to_string());
        if !u.username.is_empty() {
            text.push_str(&format!("\t<b>{}</b>", escape_html(&u.username)));
        }
        if u.role != Role::None {
            text.push_str(&format!(" [{}]", u.role.as_str()));
        }
        if u.private_chat_id.is_some() {
            text.push_str(" (active)");
        } else {
            text.push_str(" <i>(pending)</i>");
        }
        text.push('\n');
    }
    text
}
