//! Outbound reply relay.
//!
//! An external worker appends entries to a JSON reply document
//! (`{ "pending": [ { action_id, message, chat_id | to } ] }`). The relay
//! watches that file, delivers every pending entry once and then clears the
//! consumed entries. Failed sends are logged and dropped, not re-queued.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use notify::{EventKind, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    domain::Address,
    errors::Error,
    messaging::port::{deliver, ChannelPort},
    utils::write_atomic,
    Result,
};

/// On-disk shape of the reply document.
///
/// Entries are kept as raw JSON so unknown fields survive a partial clear.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReplyDocument {
    #[serde(default)]
    pub pending: Vec<serde_json::Value>,
}

/// Recipient field: Telegram chat ids are often written as JSON numbers.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AddressField {
    Number(i64),
    Text(String),
}

impl AddressField {
    fn to_address(&self) -> Option<Address> {
        match self {
            AddressField::Number(n) => Some(Address::new(n.to_string())),
            AddressField::Text(s) if !s.trim().is_empty() => Some(Address::new(s.as_str())),
            AddressField::Text(_) => None,
        }
    }
}

/// One reply queued by the external worker.
#[derive(Clone, Debug, Deserialize)]
pub struct PendingReply {
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub chat_id: Option<AddressField>,
    /// Legacy recipient field.
    #[serde(default)]
    pub to: Option<AddressField>,
}

impl PendingReply {
    /// `chat_id`, else `to`, else `fallback`.
    pub fn recipient(&self, fallback: Option<&Address>) -> Option<Address> {
        self.chat_id
            .as_ref()
            .and_then(AddressField::to_address)
            .or_else(|| self.to.as_ref().and_then(AddressField::to_address))
            .or_else(|| fallback.cloned())
    }
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub responses_path: PathBuf,
    /// Used when an entry names no recipient (usually the channel owner).
    pub fallback_recipient: Option<Address>,
    /// Quiet period used to coalesce bursts of change events.
    pub debounce: Duration,
}

impl RelayConfig {
    pub fn new(responses_path: impl Into<PathBuf>, fallback_recipient: Option<Address>) -> Self {
        Self {
            responses_path: responses_path.into(),
            fallback_recipient,
            debounce: Duration::from_millis(100),
        }
    }
}

/// Counters for one flush cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct ResponseRelay {
    port: Arc<dyn ChannelPort>,
    cfg: RelayConfig,
    lock: Mutex<()>,
}

impl ResponseRelay {
    pub fn new(port: Arc<dyn ChannelPort>, cfg: RelayConfig) -> Self {
        Self {
            port,
            cfg,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.cfg.responses_path
    }

    /// Create an empty reply document (and its directory) if none exists yet.
    pub async fn ensure_document(&self) -> Result<()> {
        let path = self.path();
        if tokio::fs::try_exists(path).await? {
            return Ok(());
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        write_document(path, &ReplyDocument::default()).await
    }

    /// Deliver every pending reply once, then clear the consumed entries.
    pub async fn flush(&self) -> Result<FlushReport> {
        let _guard = self.lock.lock().await;
        let mut report = FlushReport::default();

        let Some(doc) = read_document(self.path()).await? else {
            return Ok(report);
        };
        if doc.pending.is_empty() {
            return Ok(report);
        }
        debug!(channel = %self.port.kind(), count = doc.pending.len(), "processing pending replies");

        for raw in &doc.pending {
            let reply = match serde_json::from_value::<PendingReply>(raw.clone()) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "skipping malformed pending reply");
                    report.skipped += 1;
                    continue;
                }
            };
            let action_id = reply.action_id.as_deref().unwrap_or("<none>");

            let Some(message) = reply.message.as_deref().filter(|m| !m.is_empty()) else {
                warn!(action_id, "skipping pending reply without a message");
                report.skipped += 1;
                continue;
            };
            let Some(to) = reply.recipient(self.cfg.fallback_recipient.as_ref()) else {
                warn!(
                    action_id,
                    channel = %self.port.kind(),
                    "cannot send reply: no recipient in entry and no owner address configured"
                );
                report.skipped += 1;
                continue;
            };

            match deliver(self.port.as_ref(), &to, message).await {
                Ok(()) => {
                    debug!(action_id, "reply sent");
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(action_id, error = %e, "reply delivery failed, dropping");
                    report.failed += 1;
                }
            }
        }

        self.clear_consumed(&doc.pending).await?;
        info!(
            channel = %self.port.kind(),
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "cleared pending replies"
        );
        Ok(report)
    }

    /// Watch the reply document until `cancel` fires, flushing on every change.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let path = self.path().to_path_buf();
        let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
            return Err(Error::InvalidPath {
                path,
                reason: "reply document has no file name".to_string(),
            });
        };
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        self.ensure_document().await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if is_relevant_event(&event, &file_name) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => warn!(error = %e, "reply watcher error"),
            },
        )
        .map_err(|e| Error::External(format!("failed to create reply watcher: {e}")))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::External(format!("failed to watch {}: {e}", dir.display())))?;

        info!(channel = %self.port.kind(), path = %path.display(), "watching reply document");

        // Replies written while we were down.
        self.flush_logged().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                ev = rx.recv() => {
                    if ev.is_none() {
                        break;
                    }
                    sleep(self.cfg.debounce).await;
                    while rx.try_recv().is_ok() {}
                    self.flush_logged().await;
                }
            }
        }

        drop(watcher);
        info!(channel = %self.port.kind(), "reply relay stopped");
        Ok(())
    }

    async fn flush_logged(&self) {
        match self.flush().await {
            Ok(_) => {}
            Err(Error::Json(e)) => warn!(error = %e, "malformed reply document, skipping cycle"),
            Err(e) => warn!(error = %e, "error processing replies"),
        }
    }

    /// Remove exactly the consumed entries, keeping anything appended since the read.
    async fn clear_consumed(&self, consumed: &[serde_json::Value]) -> Result<()> {
        let current = match read_document(self.path()).await {
            Ok(Some(doc)) => doc.pending,
            Ok(None) | Err(Error::Json(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        let remaining = retain_unconsumed(current, consumed);
        if !remaining.is_empty() {
            debug!(count = remaining.len(), "keeping replies appended during flush");
        }
        write_document(self.path(), &ReplyDocument { pending: remaining }).await
    }
}

/// `current` minus one occurrence of each entry in `consumed`.
pub fn retain_unconsumed(
    current: Vec<serde_json::Value>,
    consumed: &[serde_json::Value],
) -> Vec<serde_json::Value> {
    let mut used = vec![false; consumed.len()];
    current
        .into_iter()
        .filter(|entry| {
            let hit = consumed
                .iter()
                .enumerate()
                .find(|(i, c)| !used[*i] && *c == entry)
                .map(|(i, _)| i);
            match hit {
                Some(i) => {
                    used[i] = true;
                    false
                }
                None => true,
            }
        })
        .collect()
}

fn is_relevant_event(event: &notify::Event, file_name: &OsString) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    ) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name().map(|n| n == file_name.as_os_str()).unwrap_or(false))
}

async fn read_document(path: &Path) -> Result<Option<ReplyDocument>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Some(ReplyDocument::default()));
    }
    Ok(Some(serde_json::from_str(&content)?))
}

async fn write_document(path: &Path, doc: &ReplyDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(doc)?;
    write_atomic(path, json.as_bytes()).await
}
