//! In-memory `ChannelPort` used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{Address, ChannelKind},
    messaging::port::{ChannelCapabilities, ChannelPort},
    Error, Result,
};

type ErrFactory = Box<dyn Fn() -> Error + Send + Sync>;

pub(crate) struct FakeChannel {
    kind: ChannelKind,
    markdown: Mutex<Vec<(String, String)>>,
    plain: Mutex<Vec<(String, String)>>,
    markdown_err: Mutex<Option<ErrFactory>>,
    plain_err: Mutex<Option<ErrFactory>>,
}

impl FakeChannel {
    fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            markdown: Mutex::new(Vec::new()),
            plain: Mutex::new(Vec::new()),
            markdown_err: Mutex::new(None),
            plain_err: Mutex::new(None),
        }
    }

    pub(crate) fn telegram() -> Self {
        Self::new(ChannelKind::Telegram)
    }

    pub(crate) fn whatsapp() -> Self {
        Self::new(ChannelKind::WhatsApp)
    }

    pub(crate) fn fail_markdown_with(&self, f: impl Fn() -> Error + Send + Sync + 'static) {
        *self.markdown_err.lock().unwrap() = Some(Box::new(f));
    }

    pub(crate) fn fail_plain_with(&self, f: impl Fn() -> Error + Send + Sync + 'static) {
        *self.plain_err.lock().unwrap() = Some(Box::new(f));
    }

    pub(crate) fn markdown_sends(&self) -> Vec<(String, String)> {
        self.markdown.lock().unwrap().clone()
    }

    pub(crate) fn plain_sends(&self) -> Vec<(String, String)> {
        self.plain.lock().unwrap().clone()
    }

    /// Every successfully "sent" text regardless of mode, in send order per mode.
    pub(crate) fn all_texts(&self) -> Vec<String> {
        let mut out: Vec<String> = self.markdown_sends().into_iter().map(|(_, t)| t).collect();
        out.extend(self.plain_sends().into_iter().map(|(_, t)| t));
        out
    }
}

#[async_trait]
impl ChannelPort for FakeChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_markdown: matches!(self.kind, ChannelKind::Telegram),
            max_message_len: 4096,
        }
    }

    async fn send_markdown(&self, to: &Address, text: &str) -> Result<()> {
        if let Some(f) = self.markdown_err.lock().unwrap().as_ref() {
            return Err(f());
        }
        self.markdown
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_plain(&self, to: &Address, text: &str) -> Result<()> {
        if let Some(f) = self.plain_err.lock().unwrap().as_ref() {
            return Err(f());
        }
        self.plain
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}
