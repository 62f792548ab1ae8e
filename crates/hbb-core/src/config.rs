use std::{env, path::PathBuf};

use tracing::debug;

use crate::{domain::Address, errors::Error, Result};

const PLACEHOLDER_BOT_TOKEN: &str = "1234567890:ABCdefGHIjklMNOpqrsTUVwxyz";
const PLACEHOLDER_CHAT_ID: &str = "123456789";

/// Typed configuration for the bridge, loaded from the environment.
///
/// Missing credentials disable a channel instead of failing the load; see
/// [`Config::credential_warnings`].
#[derive(Clone, Debug)]
pub struct Config {
    pub heartbeat_path: PathBuf,
    pub assistant_name: String,
    pub telegram: TelegramConfig,
    pub whatsapp: WhatsAppConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Owner chat id: the only accepted sender and the fallback reply recipient.
    pub owner_chat_id: Option<Address>,
    pub responses_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Sender address for outbound messages (`whatsapp:+1...`).
    pub from_number: Option<String>,
    pub owner_number: Option<Address>,
    pub responses_path: PathBuf,
    pub port: u16,
    /// Public webhook URL the vendor signs; derived from `Host` when unset.
    pub public_url: Option<String>,
    pub validate_signature: bool,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some()
    }
}

impl WhatsAppConfig {
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }
}

impl Config {
    /// Load `.env` (if present) and then read the environment.
    pub fn load() -> Result<Self> {
        load_dotenv();
        Self::from_env()
    }

    /// Read the environment only.
    pub fn from_env() -> Result<Self> {
        let heartbeat_path = env_path("HEARTBEAT_PATH").unwrap_or_else(|| "heartbeat.md".into());
        let assistant_name = env_non_empty("ASSISTANT_NAME").unwrap_or_else(|| "Orko".to_string());

        let telegram = TelegramConfig {
            bot_token: env_non_empty("TELEGRAM_BOT_TOKEN"),
            owner_chat_id: env_non_empty("MY_TELEGRAM_CHAT_ID").map(Address::new),
            responses_path: env_path("TELEGRAM_RESPONSES_PATH")
                .unwrap_or_else(|| "telegram-responses.json".into()),
        };

        let port = match env_non_empty("WHATSAPP_PORT").or_else(|| env_non_empty("PORT")) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("invalid webhook port {raw:?}: {e}")))?,
            None => 3000,
        };

        let whatsapp = WhatsAppConfig {
            account_sid: env_non_empty("TWILIO_ACCOUNT_SID"),
            auth_token: env_non_empty("TWILIO_AUTH_TOKEN"),
            from_number: env_non_empty("TWILIO_WHATSAPP_NUMBER").map(|n| whatsapp_address(&n)),
            owner_number: env_non_empty("MY_WHATSAPP_NUMBER").map(Address::new),
            responses_path: env_path("WHATSAPP_RESPONSES_PATH")
                .unwrap_or_else(|| "whatsapp-responses.json".into()),
            port,
            public_url: env_non_empty("WHATSAPP_WEBHOOK_URL"),
            validate_signature: env_bool("WHATSAPP_VALIDATE_SIGNATURE").unwrap_or(true),
        };

        Ok(Self {
            heartbeat_path,
            assistant_name,
            telegram,
            whatsapp,
        })
    }

    /// Missing or placeholder credentials. Logged at startup, never fatal.
    pub fn credential_warnings(&self) -> Vec<String> {
        let mut out = Vec::new();

        match self.telegram.bot_token.as_deref() {
            None => out.push("TELEGRAM_BOT_TOKEN not set; Telegram channel disabled".to_string()),
            Some(token) => {
                if token == PLACEHOLDER_BOT_TOKEN || token.contains("1234567890") {
                    out.push(
                        "TELEGRAM_BOT_TOKEN appears to be a placeholder value from .env.example"
                            .to_string(),
                    );
                }
                if !token.contains(':') {
                    out.push(
                        "TELEGRAM_BOT_TOKEN format looks invalid (should contain \":\")"
                            .to_string(),
                    );
                }
            }
        }
        if self.telegram.owner_chat_id.as_ref().map(Address::as_str) == Some(PLACEHOLDER_CHAT_ID) {
            out.push("MY_TELEGRAM_CHAT_ID appears to be a placeholder value".to_string());
        }

        let wa = &self.whatsapp;
        if !wa.is_configured() {
            out.push(
                "TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN / TWILIO_WHATSAPP_NUMBER not all set; WhatsApp channel disabled"
                    .to_string(),
            );
        }
        if let Some(sid) = wa.account_sid.as_deref() {
            if !sid.starts_with("AC") {
                out.push("TWILIO_ACCOUNT_SID format looks invalid (should start with \"AC\")".to_string());
            }
        }
        if !wa.validate_signature {
            out.push("webhook signature validation is disabled".to_string());
        }

        out
    }
}

/// Twilio addresses WhatsApp numbers as `whatsapp:+E164`.
pub fn whatsapp_address(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("whatsapp:") {
        raw.to_string()
    } else {
        format!("whatsapp:{raw}")
    }
}

/// Load `HBB_ENV_FILE` or `./.env`; existing variables are never overridden.
fn load_dotenv() {
    let result = match env::var_os("HBB_ENV_FILE") {
        Some(path) => dotenvy::from_path(PathBuf::from(path)).map(|_| ()),
        None => dotenvy::dotenv().map(|_| ()),
    };
    if let Err(e) = result {
        debug!(error = %e, "no .env loaded");
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_non_empty(key: &str) -> Option<String> {
    env_str(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_non_empty(key).map(|s| {
        matches!(
            s.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_non_empty(key).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            heartbeat_path: "heartbeat.md".into(),
            assistant_name: "Orko".to_string(),
            telegram: TelegramConfig {
                bot_token: Some("987654:real-token".to_string()),
                owner_chat_id: Some(Address::new("42")),
                responses_path: "tg.json".into(),
            },
            whatsapp: WhatsAppConfig {
                account_sid: Some("AC123".to_string()),
                auth_token: Some("secret".to_string()),
                from_number: Some("whatsapp:+15550000000".to_string()),
                owner_number: None,
                responses_path: "wa.json".into(),
                port: 3000,
                public_url: None,
                validate_signature: true,
            },
        }
    }

    #[test]
    fn clean_config_has_no_warnings() {
        assert!(base().credential_warnings().is_empty());
    }

    #[test]
    fn placeholder_and_malformed_credentials_warn() {
        let mut cfg = base();
        cfg.telegram.bot_token = Some(PLACEHOLDER_BOT_TOKEN.to_string());
        cfg.telegram.owner_chat_id = Some(Address::new(PLACEHOLDER_CHAT_ID));
        cfg.whatsapp.account_sid = Some("XX1".to_string());
        let w = cfg.credential_warnings();
        assert!(w.iter().any(|s| s.contains("placeholder value from .env.example")));
        assert!(w.iter().any(|s| s.contains("MY_TELEGRAM_CHAT_ID")));
        assert!(w.iter().any(|s| s.contains("should start with \"AC\"")));

        cfg.telegram.bot_token = Some("nocolon".to_string());
        assert!(cfg
            .credential_warnings()
            .iter()
            .any(|s| s.contains("should contain")));
    }

    #[test]
    fn missing_credentials_disable_channels() {
        let mut cfg = base();
        cfg.telegram.bot_token = None;
        cfg.whatsapp.from_number = None;
        assert!(!cfg.telegram.is_configured());
        assert!(!cfg.whatsapp.is_configured());
        let w = cfg.credential_warnings();
        assert!(w.iter().any(|s| s.contains("Telegram channel disabled")));
        assert!(w.iter().any(|s| s.contains("WhatsApp channel disabled")));
    }

    #[test]
    fn whatsapp_address_adds_scheme_once() {
        assert_eq!(whatsapp_address("+1555"), "whatsapp:+1555");
        assert_eq!(whatsapp_address("whatsapp:+1555"), "whatsapp:+1555");
    }
}
