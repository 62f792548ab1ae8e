//! Cross-channel messaging abstractions (Telegram and WhatsApp today).

pub mod port;

#[cfg(test)]
pub(crate) mod testing;
