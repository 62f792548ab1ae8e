//! `hbb`: heartbeat bridge between chat channels and the heartbeat task queue.

use std::{future::Future, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hbb_core::{config::Config, queue::TaskQueue};

#[derive(Parser, Debug)]
#[command(name = "hbb", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run every configured channel in one process (default).
    Run,
    /// Run only the Telegram bot.
    Telegram,
    /// Run only the WhatsApp webhook.
    Whatsapp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    hbb_core::logging::init("hbb")?;

    let cfg = Arc::new(Config::load().context("loading configuration")?);
    for warning in cfg.credential_warnings() {
        warn!("{warning}");
    }

    let queue = Arc::new(TaskQueue::new(cfg.heartbeat_path.clone()));
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            run_channels(
                hbb_telegram::router::run_polling(cfg.clone(), queue.clone(), cancel.clone()),
                hbb_whatsapp::run_webhook(cfg.clone(), queue.clone(), cancel.clone()),
                &cancel,
            )
            .await?;
        }
        Command::Telegram => {
            hbb_telegram::router::run_polling(cfg, queue, cancel)
                .await
                .context("telegram channel")?;
        }
        Command::Whatsapp => {
            hbb_whatsapp::run_webhook(cfg, queue, cancel)
                .await
                .context("whatsapp channel")?;
        }
    }

    info!("hbb stopped");
    Ok(())
}

/// Run both channels side by side until both have returned.
async fn run_channels<T, W>(
    telegram: T,
    whatsapp: W,
    cancel: &CancellationToken,
) -> anyhow::Result<()>
where
    T: Future<Output = anyhow::Result<()>>,
    W: Future<Output = anyhow::Result<()>>,
{
    let (telegram, whatsapp) = tokio::join!(
        supervise("telegram", telegram, cancel),
        supervise("whatsapp", whatsapp, cancel),
    );
    telegram?;
    whatsapp?;
    Ok(())
}

/// A failed channel is logged as soon as it returns and stops the whole
/// process, so the other channel never keeps running alone.
async fn supervise<F>(
    name: &'static str,
    channel: F,
    cancel: &CancellationToken,
) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let result = channel.await;
    if let Err(e) = &result {
        error!(channel = name, error = %e, "channel failed, shutting down");
        cancel.cancel();
    }
    result.with_context(|| format!("{name} channel"))
}

async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
                    _ = term.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM; only Ctrl-C will stop the bridge");
                let _ = tokio::signal::ctrl_c().await;
                info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received Ctrl-C, shutting down");
    }

    cancel.cancel();
}
