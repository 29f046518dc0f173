//! Reply clean-up between the model and the user.

use regex::Regex;
use std::sync::OnceLock;

use crate::text::truncate_with_ellipsis;

/// Phrases that only appear when the model parrots its own instructions.
const INTERNAL_ECHO_PHRASES: [&str; 4] = [
    "提供された発話から",
    "ユーザー本人に関する事実",
    "要約して、過去要約に統合",
    "過去の要約:",
];

struct Patterns {
    code_fence: Regex,
    tag_marker: Regex,
    tool_echo: Regex,
    blank_runs: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                code_fence: Regex::new(r"(?s)```.*?```").ok()?,
                tag_marker: Regex::new(r"<\|[^>]*\|>").ok()?,
                tool_echo: Regex::new(
                    r"(?:^|\s)(?:commentary\s+to=|to=|recipient_name|repo_browser|functions\.)",
                )
                .ok()?,
                blank_runs: Regex::new(r"\n{3,}").ok()?,
            })
        })
        .as_ref()
}

/// Strip terminal escapes, code fences, `<|...|>` markers and tool-call echo lines.
pub fn sanitize_reply(raw: &str) -> String {
    let ansi_free = strip_ansi_escapes::strip(raw.as_bytes());
    let text = String::from_utf8_lossy(&ansi_free).replace("\r\n", "\n");
    let Some(p) = patterns() else {
        return text.trim().to_string();
    };
    let text = p.code_fence.replace_all(&text, "");
    let text = p.tag_marker.replace_all(&text, "");
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !p.tool_echo.is_match(line))
        .map(str::trim_end)
        .collect();
    let joined = kept.join("\n");
    p.blank_runs.replace_all(&joined, "\n\n").trim().to_string()
}

pub fn looks_internal_instruction(text: &str) -> bool {
    INTERNAL_ECHO_PHRASES
        .iter()
        .any(|phrase| text.contains(phrase))
}

/// What the session does with a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedReply {
    /// Persist and show.
    Keep(String),
    /// Show the fallback text only; nothing is persisted.
    Suppressed(String),
}

impl PreparedReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Keep(text) | Self::Suppressed(text) => text,
        }
    }
}

/// sanitize, clip to `max_chars`, substitute `unknown_reply` when empty, and
/// suppress leaked instructions.
pub fn prepare_reply(raw: &str, max_chars: usize, unknown_reply: &str) -> PreparedReply {
    let cleaned = sanitize_reply(raw);
    if cleaned.is_empty() {
        return PreparedReply::Keep(unknown_reply.to_string());
    }
    if looks_internal_instruction(&cleaned) {
        return PreparedReply::Suppressed(unknown_reply.to_string());
    }
    PreparedReply::Keep(truncate_with_ellipsis(&cleaned, max_chars))
}
