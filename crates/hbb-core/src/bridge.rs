//! Channel-agnostic inbound pipeline: authorize → parse → reply or queue.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    command::{parse_command, Command},
    domain::{ActionId, Address, ChannelKind, InboundMessage},
    messaging::port::{deliver, ChannelPort},
    queue::TaskQueue,
    responder::Responder,
    security::is_authorized,
    utils::redact_pii,
};

pub const UNAUTHORIZED_REPLY: &str = "Unauthorized. This bot only responds to its owner.";

#[derive(Clone, Debug, Default)]
pub struct BridgeConfig {
    /// Only this sender may use the bridge; `None` accepts anyone.
    pub owner: Option<Address>,
}

/// What the bridge did with one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Unauthorized,
    /// No text (media, stickers) or an empty task.
    Ignored,
    Replied(Command),
    Queued(ActionId),
    /// The queue write failed; the sender got an apology with the error text.
    QueueFailed(String),
}

pub struct Bridge {
    port: Arc<dyn ChannelPort>,
    queue: Arc<TaskQueue>,
    responder: Responder,
    cfg: BridgeConfig,
}

impl Bridge {
    pub fn new(
        port: Arc<dyn ChannelPort>,
        queue: Arc<TaskQueue>,
        responder: Responder,
        cfg: BridgeConfig,
    ) -> Self {
        Self {
            port,
            queue,
            responder,
            cfg,
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.port.kind()
    }

    pub async fn handle_inbound(&self, msg: InboundMessage) -> Outcome {
        let channel = self.channel();
        info!(%channel, sender = %redact_pii(msg.sender.as_str()), "received message");

        if !is_authorized(&msg.sender, self.cfg.owner.as_ref()) {
            warn!(%channel, sender = %redact_pii(msg.sender.as_str()), "unauthorized sender");
            self.reply(&msg.sender, UNAUTHORIZED_REPLY).await;
            return Outcome::Unauthorized;
        }

        let Some(text) = msg.text.as_deref() else {
            info!(%channel, "message has no text, ignoring");
            return Outcome::Ignored;
        };
        info!(%channel, text = %redact_pii(text), "message text");

        let command = parse_command(text, channel);
        if let Some(reply) = self.responder.immediate_response(&command).await {
            self.reply(&msg.sender, &reply).await;
            return Outcome::Replied(command);
        }

        let Command::Task(task) = command else {
            return Outcome::Ignored;
        };
        if task.is_empty() {
            return Outcome::Ignored;
        }

        match self
            .queue
            .add_action(channel, &task, &msg.message_id, &msg.sender)
            .await
        {
            Ok(id) => {
                let ack = format!("Got it! Task added as `{id}`. I'll work on it soon!");
                self.reply(&msg.sender, &ack).await;
                Outcome::Queued(id)
            }
            Err(e) => {
                warn!(%channel, error = %e, "failed to queue task");
                let err = e.to_string();
                let apology = format!("Oops! Had trouble adding that task: {err}");
                self.reply(&msg.sender, &apology).await;
                Outcome::QueueFailed(err)
            }
        }
    }

    async fn reply(&self, to: &Address, text: &str) {
        if let Err(e) = deliver(self.port.as_ref(), to, text).await {
            warn!(channel = %self.channel(), error = %e, "failed to send reply");
        }
    }
}
