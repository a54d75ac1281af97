use std::{path::Path, sync::Arc};

use anyhow::Context;
use clap::Parser;
use teloxide::prelude::Requester;
use tracing::info;

use abot_core::{
    bot::{Bot, BotIdentity},
    dispatcher::Dispatcher,
    domain::UserId,
    errors::Error,
    logging::{self, Verbosity},
    settings::SettingsStore,
};
use abot_telegram::{polling, TelegramMessenger};

mod cli;
mod hello;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init { config } => init(&config).await,
        Commands::Run {
            config,
            verbose,
            debug,
        } => run(&config, Verbosity::from_flags(verbose, debug)).await,
    }
}

async fn init(config: &Path) -> anyhow::Result<()> {
    logging::init(env!("CARGO_PKG_NAME"), Verbosity::Verbose)?;

    let store = SettingsStore::new(config)?;
    store.create_blank().await?;
    println!("Blank settings written to {}", store.path().display());
    Ok(())
}

async fn run(config: &Path, verbosity: Verbosity) -> anyhow::Result<()> {
    logging::init(env!("CARGO_PKG_NAME"), verbosity)?;

    let store = SettingsStore::new(config)?;
    let doc = store.load().await?;
    if doc.secure_token.is_empty() {
        return Err(Error::Config(format!(
            "secureToken is empty in {}",
            store.path().display()
        ))
        .into());
    }

    info!("init stack (teloxide)");
    let tg = teloxide::Bot::new(doc.secure_token.clone());
    let me = tg.get_me().await.context("(stack) cannot reach Telegram")?;
    let identity = BotIdentity {
        user_id: UserId(me.user.id.0 as i64),
        username: me.username().to_string(),
    };
    info!(username = %identity.username, "bot identity");

    let recover_old_updates = doc.recover_old_updates;
    let messenger = Arc::new(TelegramMessenger::new(tg.clone()));
    let bot = Bot::new(identity, messenger, doc, Some(store));

    bot.register_processor(hello::SCOPE, Arc::new(hello::HelloProcessor::default()))
        .await?;

    let dispatcher = Dispatcher::new(bot).await;
    polling::run_polling(tg, dispatcher, recover_old_updates).await
}
