//! Heartbeat document task queue.
//!
//! Inbound tasks become markdown action blocks inserted right under the
//! `## Pending Actions` heading. The bridge only ever creates blocks; the
//! external worker owns every later status transition.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    domain::{ActionId, Address, ChannelKind},
    utils::{iso_timestamp_millis, to_base36, truncate_text, write_atomic},
    Result,
};

pub const PENDING_ACTIONS_HEADING: &str = "## Pending Actions";
const TITLE_MAX_CHARS: usize = 50;
const ID_SUFFIX_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionStatus {
    Pending,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Pending => "PENDING",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Medium,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Medium => "MEDIUM",
        }
    }
}

/// One queued task, as rendered into the heartbeat document.
#[derive(Clone, Debug)]
pub struct ActionRecord {
    pub id: ActionId,
    pub channel: ChannelKind,
    pub priority: Priority,
    pub task: String,
    pub reply_to: String,
    pub recipient: Address,
    pub received_at: DateTime<Utc>,
    pub status: ActionStatus,
}

impl ActionRecord {
    pub fn new(
        channel: ChannelKind,
        task: &str,
        reply_to: &str,
        recipient: &Address,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_action_id(channel, now),
            channel,
            priority: Priority::Medium,
            task: task.to_string(),
            reply_to: reply_to.to_string(),
            recipient: recipient.clone(),
            received_at: now,
            status: ActionStatus::Pending,
        }
    }

    /// Markdown block, including its leading blank line.
    pub fn render(&self) -> String {
        format!(
            "\n### [{priority}] {label} Task - {title}\n\
             - **id**: {id}\n\
             - **type**: {kind}\n\
             - **task**: {task}\n\
             - **reply_to**: {reply_to}\n\
             - **{field}**: {recipient}\n\
             - **received_at**: {received_at}\n\
             - **status**: {status}\n",
            priority = self.priority.as_str(),
            label = self.channel.label(),
            title = truncate_text(&single_line(&self.task), TITLE_MAX_CHARS),
            id = self.id,
            kind = self.channel.action_type(),
            task = indent_continuation(&self.task),
            reply_to = self.reply_to,
            field = self.channel.recipient_field(),
            recipient = self.recipient,
            received_at = iso_timestamp_millis(self.received_at),
            status = self.status.as_str(),
        )
    }
}

/// Join a multi-line task into one heading-safe line.
fn single_line(task: &str) -> String {
    task.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Indent continuation lines so they stay inside the list item and can never
/// start a heading of their own.
fn indent_continuation(task: &str) -> String {
    task.lines().collect::<Vec<_>>().join("\n  ")
}

/// `<prefix>-<base36 ms timestamp>-<4 base36 random chars>`.
///
/// Uniqueness is probabilistic; existing records are not consulted.
pub fn generate_action_id(channel: ChannelKind, now: DateTime<Utc>) -> ActionId {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let mut rng = rand::thread_rng();
    let suffix = (0..ID_SUFFIX_LEN)
        .map(|_| to_base36(rng.gen_range(0..36)))
        .collect::<String>();
    ActionId(format!(
        "{}-{}-{suffix}",
        channel.id_prefix(),
        to_base36(millis)
    ))
}

/// Byte offset just past the first `## Pending Actions` heading line.
pub fn pending_section_start(doc: &str) -> Option<usize> {
    let needle = format!("{PENDING_ACTIONS_HEADING}\n");
    doc.match_indices(&needle)
        .find(|(idx, _)| *idx == 0 || doc[..*idx].ends_with('\n'))
        .map(|(idx, m)| idx + m.len())
}

/// Insert `block` right after the pending heading, or append it when the
/// heading is missing.
pub fn insert_action_block(doc: &str, block: &str) -> String {
    match pending_section_start(doc) {
        Some(pos) => {
            let mut out = String::with_capacity(doc.len() + block.len());
            out.push_str(&doc[..pos]);
            out.push_str(block);
            out.push_str(&doc[pos..]);
            out
        }
        None => format!("{doc}\n{block}"),
    }
}

/// Writer for the shared heartbeat document.
///
/// All mutations in this process go through one lock, and the document is
/// replaced atomically.
#[derive(Debug)]
pub struct TaskQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn add_action(
        &self,
        channel: ChannelKind,
        task: &str,
        reply_to: &str,
        recipient: &Address,
    ) -> Result<ActionId> {
        let _guard = self.lock.lock().await;

        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "failed to read heartbeat document");
            e
        })?;

        let record = ActionRecord::new(channel, task, reply_to, recipient, Utc::now());
        let updated = insert_action_block(&content, &record.render());

        write_atomic(&self.path, updated.as_bytes()).await?;
        info!(action_id = %record.id, %channel, "added action to heartbeat document");
        Ok(record.id)
    }
}
