//! Telegram adapter (teloxide).
//!
//! This crate implements the `hbb-core` ChannelPort over the Telegram Bot API
//! and runs the long-polling front end.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use hbb_core::{
    domain::{Address, ChannelKind},
    errors::Error,
    messaging::port::{ChannelCapabilities, ChannelPort},
    Result,
};

#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(to: &Address) -> Result<teloxide::types::ChatId> {
        to.as_str()
            .parse::<i64>()
            .map(teloxide::types::ChatId)
            .map_err(|_| Error::Delivery(format!("invalid telegram chat id: {to}")))
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        let text = e.to_string();
        if is_parse_error(&text) {
            return Error::Format(text);
        }
        Error::Delivery(format!("telegram error: {text}"))
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

/// Telegram reports rejected markup as "Bad Request: can't parse entities: ...".
pub fn is_parse_error(message: &str) -> bool {
    message.to_lowercase().contains("can't parse")
}

#[async_trait]
impl ChannelPort for TelegramChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_markdown: true,
            max_message_len: 4096,
        }
    }

    async fn send_markdown(&self, to: &Address, text: &str) -> Result<()> {
        let chat = Self::tg_chat(to)?;
        // Legacy Markdown: worker replies use `*bold*` / `_italic_` without V2 escaping.
        #[allow(deprecated)]
        let mode = ParseMode::Markdown;
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(chat, text.to_string())
                    .parse_mode(mode)
            })
            .await?;
        tracing::debug!(chat_id = chat.0, message_id = msg.id.0, "telegram message sent");
        Ok(())
    }

    async fn send_plain(&self, to: &Address, text: &str) -> Result<()> {
        let chat = Self::tg_chat(to)?;
        let msg = self
            .with_retry(|| self.bot.send_message(chat, text.to_string()))
            .await?;
        tracing::debug!(chat_id = chat.0, message_id = msg.id.0, "telegram message sent (plain)");
        Ok(())
    }
}
