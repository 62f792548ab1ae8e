//! Telegram update handlers.
//!
//! Each handler only translates the teloxide update into an `InboundMessage`;
//! authorization, parsing and queueing live in `hbb_core::bridge`.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use hbb_core::{
    bridge::{Bridge, Outcome},
    domain::{Address, InboundMessage},
};

pub async fn handle_message(msg: Message, bridge: Arc<Bridge>) -> ResponseResult<()> {
    let inbound = to_inbound(&msg);
    let outcome = bridge.handle_inbound(inbound).await;
    if let Outcome::QueueFailed(err) = &outcome {
        tracing::error!(chat_id = msg.chat.id.0, error = %err, "task not queued");
    }
    Ok(())
}

/// Authorization is by chat id, so the chat (not the user) is the sender.
pub fn to_inbound(msg: &Message) -> InboundMessage {
    InboundMessage {
        sender: Address::new(msg.chat.id.0.to_string()),
        message_id: msg.id.0.to_string(),
        text: msg.text().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn chat_id_and_message_id_become_sender_and_reply_to() {
        let msg = message(serde_json::json!({
            "message_id": 77,
            "date": 1_700_000_000,
            "chat": {"id": 4242, "type": "private", "first_name": "Owner"},
            "from": {"id": 4242, "is_bot": false, "first_name": "Owner"},
            "text": "/task buy milk"
        }));
        let inbound = to_inbound(&msg);
        assert_eq!(inbound.sender.as_str(), "4242");
        assert_eq!(inbound.message_id, "77");
        assert_eq!(inbound.text.as_deref(), Some("/task buy milk"));
    }

    #[test]
    fn non_text_messages_carry_no_text() {
        let msg = message(serde_json::json!({
            "message_id": 78,
            "date": 1_700_000_000,
            "chat": {"id": 4242, "type": "private", "first_name": "Owner"},
            "from": {"id": 4242, "is_bot": false, "first_name": "Owner"},
            "location": {"longitude": 13.4, "latitude": 52.5}
        }));
        assert!(to_inbound(&msg).text.is_none());
    }
}
