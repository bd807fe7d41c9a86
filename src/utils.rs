//! Text formatting, message splitting, temp-file handling, and Telegram retry helpers.
//!
//! Regex patterns use the `lazy-regex` crate so they are validated at compile
//! time and initialized lazily on first use.

use anyhow::Result;
use lazy_regex::lazy_regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

/// Fenced code block with optional language: ```lang\ncode```
static RE_CODE_FENCE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"```(\w+)?\n?([\s\S]*?)```");

/// Bullet marker at start of line
static RE_BULLET: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?m)^\* ");

/// Bold: **text**
static RE_BOLD: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\*\*(.*?)\*\*");

/// Italic: *text*
static RE_ITALIC: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\*(.*?)\*");

/// Inline code: `code`
static RE_INLINE_CODE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"`([^`\n]+?)`");

/// 3+ consecutive newlines
static RE_MULTI_NEWLINE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\n{3,}");

/// Formats markdown-like model output into Telegram-compatible HTML.
///
/// The text is HTML-escaped first, then markdown markers are rewritten:
/// - ` ```lang\ncode``` ` -> `<pre><code class="lang">code</code></pre>`
/// - `* ` at line start -> `• `
/// - `**text**` -> `<b>text</b>`, `*text*` -> `<i>text</i>`
/// - `` `code` `` -> `<code>code</code>`
/// - 3+ newlines collapse into two.
#[must_use]
pub fn format_text(text: &str) -> String {
    let mut out = html_escape::encode_text(text).to_string();

    out = RE_CODE_FENCE
        .replace_all(&out, |caps: &regex::Captures| {
            let lang = caps.get(1).map_or("", |m| m.as_str());
            let code = caps.get(2).map_or("", |m| m.as_str()).trim();
            format!("<pre><code class=\"{lang}\">{code}</code></pre>")
        })
        .to_string();

    out = RE_BULLET.replace_all(&out, "• ").to_string();
    out = RE_BOLD.replace_all(&out, "<b>$1</b>").to_string();
    out = RE_ITALIC.replace_all(&out, "<i>$1</i>").to_string();
    out = RE_INLINE_CODE.replace_all(&out, "<code>$1</code>").to_string();
    out = RE_MULTI_NEWLINE.replace_all(&out, "\n\n").to_string();

    out.trim().to_string()
}

const CODE_FENCE: &str = "```";

/// Splits a long message into parts that fit within Telegram's message limit.
///
/// Splitting is line-oriented and keeps fenced code blocks intact across
/// boundaries by closing the fence at the end of one part and reopening it at
/// the start of the next. A single line longer than the limit is split by
/// grapheme clusters so multi-byte characters are never cut in half.
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }
    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_code = false;

    let flush = |parts: &mut Vec<String>, current: &mut String, in_code: bool| {
        if in_code {
            current.push_str(CODE_FENCE);
        }
        parts.push(current.trim_end().to_string());
        current.clear();
        if in_code {
            current.push_str(CODE_FENCE);
            current.push('\n');
        }
    };

    for line in message.lines() {
        // Leave room for a closing fence when inside a code block
        let room = if in_code {
            max_length.saturating_sub(CODE_FENCE.len() + 1)
        } else {
            max_length
        };

        if line.len() > room {
            if !current.is_empty() {
                flush(&mut parts, &mut current, in_code);
            }
            for grapheme in line.graphemes(true) {
                if current.len() + grapheme.len() > room {
                    flush(&mut parts, &mut current, in_code);
                }
                current.push_str(grapheme);
            }
            current.push('\n');
            continue;
        }

        if line.starts_with(CODE_FENCE) {
            in_code = !in_code;
        }

        if current.len() + line.len() + 1 > room && !current.is_empty() {
            // The fence state to close with is the one before this line toggled it
            let closing_state = if line.starts_with(CODE_FENCE) {
                !in_code
            } else {
                in_code
            };
            flush(&mut parts, &mut current, closing_state);
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.trim().is_empty() {
        if in_code {
            current.push_str(CODE_FENCE);
        }
        parts.push(current.trim_end().to_string());
    }

    parts
}

/// Safely truncates a string to a maximum character length (not bytes).
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Owned temporary file path, removed when the guard is dropped.
///
/// Removal failures are logged and swallowed so cleanup never outranks the
/// result of the request that created the file.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Allocate a unique path in the system temp directory with the given extension.
    #[must_use]
    pub fn with_extension(extension: &str) -> Self {
        let name = format!("{}.{extension}", Uuid::new_v4().as_simple());
        Self {
            path: std::env::temp_dir().join(name),
        }
    }

    /// The file path; the file itself may not exist yet.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
}

/// Retry a Telegram API operation with exponential backoff and jitter.
///
/// Meant for transient network failures around file downloads and
/// send/edit/delete calls: 500ms initial delay, 4s cap, 3 attempts.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
