use std::{path::Path, sync::OnceLock};

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::{errors::Error, Result};

// ============== Timestamp Helpers ==============

/// ISO-8601 UTC timestamp with millisecond precision (`2026-01-02T03:04:05.678Z`).
pub fn iso_timestamp_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============== Encoding ==============

/// Lowercase base-36 rendering of an unsigned integer.
pub fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// ============== Text Helpers ==============

/// Keep the first `max_chars` characters, appending `...` when anything was cut.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}

// ============== PII Redaction ==============

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\d{10,15}").expect("static regex"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("static regex")
    })
}

/// Mask phone numbers and e-mail addresses before text reaches the logs.
pub fn redact_pii(text: &str) -> String {
    let redacted = phone_re().replace_all(text, "[PHONE]");
    email_re().replace_all(&redacted, "[EMAIL]").into_owned()
}

// ============== File Helpers ==============

/// Replace `path` with `contents` via a sibling temp file + rename, so readers
/// never observe a half-written document.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "no file name".to_string(),
        });
    };
    let tmp = path.with_file_name(format!(".{name}.tmp-{}", std::process::id()));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn tmp_path(prefix: &str, ext: &str) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let pid = std::process::id();
    let seq = SEQ.fetch_add(1, Ordering::SeqCst);
    std::path::PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}-{seq}.{ext}"))
}
