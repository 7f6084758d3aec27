//! The bot's event loop.
//!
//! The transport's receive loop runs in a background task and hands messages
//! over an mpsc channel. Messages are dispatched one at a time, each to
//! completion, until a shutdown signal arrives or the connection ends.

use crate::bot::Bot;
use crate::channel::irc::IrcChannel;
use crate::channel::{Channel, IncomingMessage};
use crate::commands;
use crate::config::BotConfig;
use crate::dispatch::CommandTable;
use crate::tracker::pivotal::PivotalFactory;
use color_eyre::eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Connect to IRC and serve commands until shut down.
pub async fn run(config: BotConfig) -> Result<()> {
    let table = commands::build_table(&config.nick)?;
    let factory = PivotalFactory::new(
        config.tracker.base_url.clone(),
        Duration::from_secs(config.tracker.timeout_secs),
    )
    .wrap_err("failed to build tracker client")?;

    let irc = Arc::new(IrcChannel::connect(&config).await?);
    let mut bot = Bot::new(config, Arc::new(factory));

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    serve(&mut bot, &table, irc.clone(), cancel).await;

    if let Err(e) = irc.quit("Goodbye").await {
        tracing::warn!("QUIT failed: {e}");
    }
    tracing::info!("stopped");
    Ok(())
}

/// Dispatch messages from `channel` until `cancel` fires or the channel's
/// receive loop ends.
pub async fn serve(
    bot: &mut Bot,
    table: &CommandTable,
    channel: Arc<dyn Channel>,
    cancel: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel::<IncomingMessage>(64);
    let receiver = channel.clone();
    let receive_cancel = cancel.clone();
    tokio::spawn(async move {
        receiver.run(tx, receive_cancel).await;
    });

    tracing::info!(channel = channel.name(), commands = table.len(), "ready");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("shutting down");
                break;
            }
            message = rx.recv() => {
                match message {
                    Some(message) => table.dispatch(bot, channel.as_ref(), &message).await,
                    None => {
                        tracing::warn!(channel = channel.name(), "receive loop ended, shutting down");
                        break;
                    }
                }
            }
        }
    }
    cancel.cancel();
}

/// Cancel `cancel` on SIGINT or SIGTERM.
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to install SIGTERM handler: {e}");
                    let _ = ctrl_c.await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("shutdown signal received");
        cancel.cancel();
    });
}
