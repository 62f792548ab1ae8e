use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hbb_core::{
    bridge::{Bridge, BridgeConfig},
    config::Config,
    messaging::port::ChannelPort,
    queue::TaskQueue,
    relay::{RelayConfig, ResponseRelay},
    responder::Responder,
};

use crate::handlers;
use crate::TelegramChannel;

/// Run the Telegram front end (long polling) and its reply relay until `cancel` fires.
///
/// Without a bot token the channel is disabled: a warning is logged and this
/// returns immediately.
pub async fn run_polling(
    cfg: Arc<Config>,
    queue: Arc<TaskQueue>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let Some(token) = cfg.telegram.bot_token.clone() else {
        warn!("Telegram credentials not configured; Telegram channel disabled");
        return Ok(());
    };
    let bot = Bot::new(token);

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "telegram bot started"),
        Err(e) => warn!(error = %e, "telegram getMe failed; continuing"),
    }
    info!(
        heartbeat = %cfg.heartbeat_path.display(),
        owner_configured = cfg.telegram.owner_chat_id.is_some(),
        "telegram bridge configured"
    );

    let channel: Arc<dyn ChannelPort> = Arc::new(TelegramChannel::new(bot.clone()));

    let relay = Arc::new(ResponseRelay::new(
        channel.clone(),
        RelayConfig::new(
            cfg.telegram.responses_path.clone(),
            cfg.telegram.owner_chat_id.clone(),
        ),
    ));
    let relay_cancel = cancel.child_token();
    let relay_task = tokio::spawn({
        let relay_cancel = relay_cancel.clone();
        async move {
            if let Err(e) = relay.run(relay_cancel).await {
                error!(error = %e, "telegram reply relay failed; replies will not be delivered");
            }
        }
    });

    let bridge = Arc::new(Bridge::new(
        channel,
        queue,
        Responder::new(cfg.heartbeat_path.clone(), cfg.assistant_name.clone()),
        BridgeConfig {
            owner: cfg.telegram.owner_chat_id.clone(),
        },
    ));

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![bridge])
        .default_handler(|_| async {})
        .build();

    // Stop polling when the process is asked to shut down.
    let shutdown = dispatcher.shutdown_token();
    let stop = cancel.clone();
    tokio::spawn(async move {
        stop.cancelled().await;
        info!("stopping telegram polling");
        match shutdown.shutdown() {
            Ok(done) => done.await,
            Err(e) => warn!(error = ?e, "telegram dispatcher was not running"),
        }
    });

    info!("telegram bot is listening for messages");
    dispatcher.dispatch().await;

    // Polling can also end on its own; make sure the relay follows.
    relay_cancel.cancel();
    if let Err(e) = relay_task.await {
        error!(error = %e, "telegram reply relay panicked");
    }

    Ok(())
}
