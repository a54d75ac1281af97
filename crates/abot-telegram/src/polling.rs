//! Long-polling loop feeding the core dispatcher.
//!
//! Updates are forwarded through a channel one by one, in the order Telegram
//! returns them; the dispatcher consumes them sequentially on the other end.

use std::time::Duration;

use teloxide::{prelude::*, types::AllowedUpdate, ApiError, RequestError};
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info, warn};

use abot_core::{dispatcher::Dispatcher, messaging::types::Update};

use crate::updates;

/// Server-side long-poll wait. Kept below teloxide's HTTP client timeout.
const POLL_TIMEOUT_SECS: u32 = 10;
const ERROR_BACKOFF: Duration = Duration::from_secs(3);
const UPDATE_BUFFER: usize = 64;

/// Run the dispatcher against Telegram until a processor fails, the token is
/// rejected, or the process is asked to stop.
pub async fn run_polling(
    bot: Bot,
    dispatcher: Dispatcher,
    recover_old_updates: bool,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
    let poller = tokio::spawn(async move {
        tokio::select! {
            res = poll_updates(bot, recover_old_updates, tx) => res,
            _ = shutdown_signal() => {
                info!("shutdown requested");
                Ok(())
            }
        }
    });

    // The poller owns the sender: when it stops, the dispatcher drains what is
    // queued, saves the settings and returns.
    let dispatched = dispatcher.run(rx).await;
    poller.abort();
    dispatched?;

    match poller.await {
        Ok(res) => res,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn poll_updates(
    bot: Bot,
    recover_old_updates: bool,
    tx: mpsc::Sender<Update>,
) -> anyhow::Result<()> {
    let mut offset = if recover_old_updates {
        0
    } else {
        skip_backlog(&bot).await?
    };

    info!("listening for updates");
    loop {
        let batch = bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::EditedMessage])
            .await;

        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                check_fatal(&e)?;
                backoff(e).await;
                continue;
            }
        };

        for raw in batch {
            offset = raw.id + 1;
            let Some(update) = updates::convert(&raw) else {
                debug!(update_id = raw.id, "update skipped");
                continue;
            };
            if tx.send(update).await.is_err() {
                // Dispatcher is gone; nothing left to feed.
                return Ok(());
            }
        }
    }
}

/// Confirm everything queued while the bot was offline; returns the offset of
/// the first new update.
async fn skip_backlog(bot: &Bot) -> anyhow::Result<i32> {
    loop {
        match bot.get_updates().offset(-1).timeout(0).await {
            Ok(last) => {
                let offset = last.last().map(|u| u.id + 1).unwrap_or(0);
                if offset > 0 {
                    info!("skipping old updates");
                }
                return Ok(offset);
            }
            Err(e) => {
                check_fatal(&e)?;
                backoff(e).await;
            }
        }
    }
}

fn check_fatal(e: &RequestError) -> anyhow::Result<()> {
    match e {
        RequestError::Api(ApiError::NotFound) => {
            anyhow::bail!("telegram rejected the bot token")
        }
        RequestError::Api(ApiError::TerminatedByOtherGetUpdates) => {
            anyhow::bail!("another instance is polling with the same token")
        }
        _ => Ok(()),
    }
}

async fn backoff(e: RequestError) {
    let wait = match &e {
        RequestError::RetryAfter(d) => *d,
        _ => ERROR_BACKOFF,
    };
    warn!("getUpdates failed: {e}; retrying in {}s", wait.as_secs());
    sleep(wait).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = sigterm => {}
    }
}
