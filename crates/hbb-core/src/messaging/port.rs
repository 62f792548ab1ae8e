use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    domain::{Address, ChannelKind},
    utils::truncate_text,
    Result,
};

/// Capabilities / feature flags of a channel implementation.
#[derive(Clone, Copy, Debug)]
pub struct ChannelCapabilities {
    /// Whether `send_markdown` renders markup (Telegram) or is plain text anyway.
    pub supports_markdown: bool,
    pub max_message_len: usize,
}

/// Cross-channel send port.
///
/// Adapters translate vendor send calls into this interface; the bridge and the
/// reply relay only ever talk to a channel through it. Inbound messages are
/// pushed into the bridge by the adapters themselves.
#[async_trait]
pub trait ChannelPort: Send + Sync {
    fn kind(&self) -> ChannelKind;

    fn capabilities(&self) -> ChannelCapabilities;

    /// Send with channel markup. Adapters return `Error::Format` when the
    /// vendor rejected the markup so callers can fall back to plain text.
    async fn send_markdown(&self, to: &Address, text: &str) -> Result<()>;

    async fn send_plain(&self, to: &Address, text: &str) -> Result<()>;
}

/// Send `text`, retrying once as plain text if the channel rejected the markup.
///
/// Text longer than the channel limit is cut to fit.
pub async fn deliver(port: &dyn ChannelPort, to: &Address, text: &str) -> Result<()> {
    let caps = port.capabilities();
    let text = &fit_to_limit(text, caps.max_message_len);

    if !caps.supports_markdown {
        return port.send_plain(to, text).await;
    }

    match port.send_markdown(to, text).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_format_error() => {
            debug!(channel = %port.kind(), error = %e, "markup rejected, retrying as plain text");
            port.send_plain(to, text).await.map_err(|retry_err| {
                warn!(channel = %port.kind(), error = %retry_err, "plain-text retry also failed");
                retry_err
            })
        }
        Err(e) => Err(e),
    }
}

fn fit_to_limit(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    truncate_text(text, max_len.saturating_sub(3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{messaging::testing::FakeChannel, Error};

    #[tokio::test]
    async fn markdown_success_needs_no_retry() {
        let ch = FakeChannel::telegram();
        deliver(&ch, &Address::new("1"), "*hi*").await.unwrap();
        assert_eq!(ch.markdown_sends(), vec![("1".to_string(), "*hi*".to_string())]);
        assert!(ch.plain_sends().is_empty());
    }

    #[tokio::test]
    async fn format_error_retries_once_as_plain() {
        let ch = FakeChannel::telegram();
        ch.fail_markdown_with(|| Error::Format("can't parse entities".into()));
        deliver(&ch, &Address::new("1"), "*bad").await.unwrap();
        assert_eq!(ch.plain_sends(), vec![("1".to_string(), "*bad".to_string())]);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let ch = FakeChannel::telegram();
        ch.fail_markdown_with(|| Error::Delivery("chat not found".into()));
        let err = deliver(&ch, &Address::new("1"), "hi").await.unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));
        assert!(ch.plain_sends().is_empty());
    }

    #[tokio::test]
    async fn plain_channels_skip_markdown() {
        let ch = FakeChannel::whatsapp();
        deliver(&ch, &Address::new("whatsapp:+1"), "hi").await.unwrap();
        assert!(ch.markdown_sends().is_empty());
        assert_eq!(ch.plain_sends().len(), 1);
    }

    #[tokio::test]
    async fn long_text_is_cut_to_channel_limit() {
        let ch = FakeChannel::whatsapp();
        let long = "x".repeat(5000);
        deliver(&ch, &Address::new("whatsapp:+1"), &long).await.unwrap();
        let sent = &ch.plain_sends()[0].1;
        assert_eq!(sent.chars().count(), 4096);
        assert!(sent.ends_with("..."));
    }
}
