//! Canned replies for commands that never touch the queue.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::{command::Command, queue::pending_section_start};

const LIST_PREVIEW: usize = 5;

fn frontmatter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"---\n((?s:.*?))\n---").expect("static regex"))
}

fn last_wake_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"last_wake:\s*(.+)").expect("static regex"))
}

fn status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"status:\s*(.+)").expect("static regex"))
}

fn action_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^### \[.*?\] .+").expect("static regex"))
}

/// Renders immediate replies for `help`, `status` and `list`.
#[derive(Clone, Debug)]
pub struct Responder {
    heartbeat_path: PathBuf,
    assistant_name: String,
}

impl Responder {
    pub fn new(heartbeat_path: impl Into<PathBuf>, assistant_name: impl Into<String>) -> Self {
        Self {
            heartbeat_path: heartbeat_path.into(),
            assistant_name: assistant_name.into(),
        }
    }

    /// `None` for tasks: those always go to the queue.
    pub async fn immediate_response(&self, command: &Command) -> Option<String> {
        match command {
            Command::Task(_) => None,
            Command::Help => Some(self.help_text()),
            Command::Status => Some(match self.read_document().await {
                Ok(doc) => render_status(&self.assistant_name, &doc),
                Err(e) => {
                    debug!(error = %e, "status: heartbeat document unreadable");
                    "Error reading status".to_string()
                }
            }),
            Command::List => Some(match self.read_document().await {
                Ok(doc) => render_pending_list(&doc),
                Err(e) => {
                    debug!(error = %e, "list: heartbeat document unreadable");
                    "Error reading actions".to_string()
                }
            }),
        }
    }

    pub fn help_text(&self) -> String {
        let name = &self.assistant_name;
        format!(
            "*{name} Commands*\n\n\
             /task <description> - Add a new task for {name}\n\
             /status - Check {name}'s current status\n\
             /list - List pending actions\n\
             /help - Show this help message\n\n\
             Or just send any message and I'll treat it as a task!"
        )
    }

    async fn read_document(&self) -> std::io::Result<String> {
        tokio::fs::read_to_string(&self.heartbeat_path).await
    }
}

/// Status summary from the document's front matter.
pub fn render_status(assistant_name: &str, doc: &str) -> String {
    let Some(front) = frontmatter_re()
        .captures(doc)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
    else {
        return "Unable to read status".to_string();
    };

    let capture = |re: &Regex| {
        re.captures(front)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim_end().to_string())
    };
    let last_wake = capture(last_wake_re()).unwrap_or_else(|| "Never".to_string());
    let status = capture(status_re()).unwrap_or_else(|| "Unknown".to_string());

    format!("*{assistant_name} Status*\nLast wake: {last_wake}\nStatus: {status}")
}

/// Headings of the pending section, up to the next `##` heading.
pub fn pending_action_titles(doc: &str) -> Vec<String> {
    let Some(start) = pending_section_start(doc) else {
        return Vec::new();
    };
    let rest = &doc[start..];
    let section = match rest.find("\n## ") {
        Some(end) => &rest[..end],
        None => rest,
    };
    action_heading_re()
        .find_iter(section)
        .map(|m| m.as_str().trim_end().to_string())
        .collect()
}

pub fn render_pending_list(doc: &str) -> String {
    let titles = pending_action_titles(doc);
    if titles.is_empty() {
        return "No pending actions".to_string();
    }

    let mut out = format!("*Pending Actions ({})*", titles.len());
    for title in titles.iter().take(LIST_PREVIEW) {
        out.push('\n');
        out.push_str(title);
    }
    if titles.len() > LIST_PREVIEW {
        out.push_str(&format!("\n...and {} more", titles.len() - LIST_PREVIEW));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Address, ChannelKind},
        queue::{insert_action_block, ActionRecord},
        utils::tmp_path,
    };

    fn doc_with_actions(n: usize) -> String {
        let mut doc = "---\nlast_wake: 2026-10-17T08:00:00Z\nstatus: sleeping\n---\n\n## Pending Actions\n".to_string();
        for i in 0..n {
            doc.push_str(&format!("\n### [MEDIUM] Task {i}\n- **id**: x{i}\n"));
        }
        doc.push_str("\n## Completed Actions\n\n### [LOW] Old thing\n");
        doc
    }

    #[test]
    fn status_reads_frontmatter_fields() {
        let out = render_status("Orko", &doc_with_actions(0));
        assert_eq!(
            out,
            "*Orko Status*\nLast wake: 2026-10-17T08:00:00Z\nStatus: sleeping"
        );
    }

    #[test]
    fn status_defaults_and_missing_frontmatter() {
        let out = render_status("Orko", "---\nother: 1\n---\nbody");
        assert!(out.contains("Last wake: Never"));
        assert!(out.contains("Status: Unknown"));

        assert_eq!(render_status("Orko", "# no front matter"), "Unable to read status");
    }

    #[test]
    fn list_truncates_to_five_with_suffix() {
        let out = render_pending_list(&doc_with_actions(7));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "*Pending Actions (7)*");
        assert_eq!(lines.len(), 1 + 5 + 1);
        assert!(lines[1..6].iter().all(|l| l.starts_with("### [MEDIUM] Task ")));
        assert_eq!(lines[6], "...and 2 more");
    }

    #[test]
    fn list_stops_at_next_section() {
        let titles = pending_action_titles(&doc_with_actions(2));
        assert_eq!(titles, vec!["### [MEDIUM] Task 0", "### [MEDIUM] Task 1"]);
        assert!(!render_pending_list(&doc_with_actions(3)).contains("Old thing"));
    }

    #[test]
    fn multi_line_task_keeps_older_actions_listed() {
        let now = chrono::Utc::now();
        let owner = Address::new("1");
        let mut doc = doc_with_actions(0);
        for task in ["first", "note\n## Notes\n### [LOW] not an action\nmore"] {
            let rec = ActionRecord::new(ChannelKind::Telegram, task, "1", &owner, now);
            doc = insert_action_block(&doc, &rec.render());
        }

        let out = render_pending_list(&doc);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "*Pending Actions (2)*");
        assert!(lines[1].starts_with("### [MEDIUM] Telegram Task - note ## Notes"));
        assert_eq!(lines[2], "### [MEDIUM] Telegram Task - first");
    }

    #[test]
    fn list_without_actions_or_heading() {
        assert_eq!(render_pending_list(&doc_with_actions(0)), "No pending actions");
        assert_eq!(render_pending_list("# nothing here\n"), "No pending actions");
    }

    #[tokio::test]
    async fn immediate_responses_by_command() {
        let path = tmp_path("hbb-responder", "md");
        std::fs::write(&path, doc_with_actions(1)).unwrap();
        let r = Responder::new(&path, "Orko");

        assert!(r.immediate_response(&Command::Task("x".into())).await.is_none());
        let help = r.immediate_response(&Command::Help).await.unwrap();
        assert_eq!(help.lines().next(), Some("*Orko Commands*"));
        assert!(help.contains("/task <description> - Add a new task for Orko"));
        assert!(r
            .immediate_response(&Command::Status)
            .await
            .unwrap()
            .contains("Status: sleeping"));
        assert!(r
            .immediate_response(&Command::List)
            .await
            .unwrap()
            .contains("Task 0"));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn unreadable_document_reports_errors() {
        let r = Responder::new(tmp_path("hbb-responder-missing", "md"), "Orko");
        assert_eq!(
            r.immediate_response(&Command::Status).await.unwrap(),
            "Error reading status"
        );
        assert_eq!(
            r.immediate_response(&Command::List).await.unwrap(),
            "Error reading actions"
        );
    }
}
