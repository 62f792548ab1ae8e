use std::fmt;

/// Messaging channel a message came in on (and replies go out on).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Telegram,
    WhatsApp,
}

impl ChannelKind {
    /// Prefix of generated action ids (`tg-...`, `wa-...`).
    pub fn id_prefix(self) -> &'static str {
        match self {
            ChannelKind::Telegram => "tg",
            ChannelKind::WhatsApp => "wa",
        }
    }

    /// Value of the `type` field in rendered action blocks.
    pub fn action_type(self) -> &'static str {
        match self {
            ChannelKind::Telegram => "telegram-reply",
            ChannelKind::WhatsApp => "whatsapp-reply",
        }
    }

    /// Name of the recipient field in rendered action blocks.
    pub fn recipient_field(self) -> &'static str {
        match self {
            ChannelKind::Telegram => "chat_id",
            ChannelKind::WhatsApp => "from",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChannelKind::Telegram => "Telegram",
            ChannelKind::WhatsApp => "WhatsApp",
        }
    }

    /// Telegram clients send `/start` when a chat is opened; treat it as `/help`.
    pub fn start_is_help(self) -> bool {
        matches!(self, ChannelKind::Telegram)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelKind::Telegram => "telegram",
            ChannelKind::WhatsApp => "whatsapp",
        })
    }
}

/// Channel-specific recipient address (Telegram chat id, WhatsApp `From`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(pub String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address with vendor scheme prefixes (`whatsapp:`) removed, for comparisons.
    pub fn normalized(&self) -> &str {
        self.0.strip_prefix("whatsapp:").unwrap_or(&self.0).trim()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a queued action record (`tg-lx2k3m4n-a1b2`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(pub String);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channel-agnostic inbound text message, as produced by an adapter.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub sender: Address,
    /// Vendor message id (Telegram message id, Twilio `MessageSid`).
    pub message_id: String,
    pub text: Option<String>,
}
