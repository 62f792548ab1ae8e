//! Core of the heartbeat bridge.
//!
//! Inbound chat messages become tasks in a shared markdown "heartbeat"
//! document; replies written by an external worker to a JSON document are
//! relayed back to the sender. Telegram / WhatsApp live behind the
//! `ChannelPort` trait implemented in adapter crates.

pub mod bridge;
pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod queue;
pub mod relay;
pub mod responder;
pub mod security;
pub mod utils;

pub use errors::{Error, Result};
