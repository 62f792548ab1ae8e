use std::path::PathBuf;

/// Core error type for the bridge.
///
/// Adapter crates map vendor errors into this type so the bridge can decide
/// what to surface to the sender (apology reply) and what only to log.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// The channel rejected the message markup (e.g. Telegram "can't parse entities").
    #[error("formatting error: {0}")]
    Format(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Whether a plain-text resend could succeed where the formatted send failed.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
