//! Inbound text → command classification.

use crate::domain::ChannelKind;

/// A parsed inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Queue a task; carries the trimmed task text (may be empty).
    Task(String),
    Status,
    List,
    Help,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Task(_) => "task",
            Command::Status => "status",
            Command::List => "list",
            Command::Help => "help",
        }
    }

    pub fn args(&self) -> Option<&str> {
        match self {
            Command::Task(args) => Some(args),
            _ => None,
        }
    }
}

/// Classify raw message text. Total: anything unrecognized is a task.
pub fn parse_command(text: &str, channel: ChannelKind) -> Command {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("/task ") {
        return Command::Task(rest.trim().to_string());
    }

    match trimmed {
        "/status" => Command::Status,
        "/list" => Command::List,
        "/help" => Command::Help,
        "/start" if channel.start_is_help() => Command::Help,
        _ => Command::Task(trimmed.to_string()),
    }
}
