//! Request assembly for one turn.

use chrono::{DateTime, TimeZone};

use crate::config::{ContextOptions, CoreConfig};
use crate::llm::ChatMessage;
use crate::memory::{ConversationTurn, Role};

/// `[コンテキスト] 現在時刻: ... / 現在地: ...`, or `None` when nothing applies.
pub fn context_prefix<Tz: TimeZone>(options: &ContextOptions, now: &DateTime<Tz>) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    let mut parts = Vec::new();
    if options.include_time {
        parts.push(format!("現在時刻: {}", now.format("%Y-%m-%d %H:%M")));
    }
    if let Some(location) = options.location_text.as_deref() {
        parts.push(format!("現在地: {location}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("[コンテキスト] {}", parts.join(" / ")))
    }
}

fn turn_message(turn: &ConversationTurn) -> ChatMessage {
    match turn.role {
        Role::User => ChatMessage::user(turn.content.clone()),
        Role::Assistant => ChatMessage::assistant(turn.content.clone()),
        Role::System => ChatMessage::system(turn.content.clone()),
    }
}

/// System prompt, length rule, summary, prior turns, then the new utterance.
///
/// `history` must not already contain `user_text`.
pub fn build_messages(
    config: &CoreConfig,
    summary: &str,
    history: &[ConversationTurn],
    user_text: &str,
    prefix: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 4);
    if !config.system_prompt.trim().is_empty() {
        messages.push(ChatMessage::system(config.system_prompt.clone()));
    }
    if !config.length_instruction.trim().is_empty() {
        messages.push(ChatMessage::system(config.length_instruction.clone()));
    }
    if !summary.trim().is_empty() {
        messages.push(ChatMessage::system(format!(
            "これまでの会話の要約:\n{}",
            summary.trim()
        )));
    }
    let start = history.len().saturating_sub(config.context_turns);
    messages.extend(history[start..].iter().map(turn_message));
    let content = match prefix {
        Some(prefix) => format!("{prefix}\n{user_text}"),
        None => user_text.to_string(),
    };
    messages.push(ChatMessage::user(content));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn prefix_joins_time_and_location() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).single().expect("time");
        let options = ContextOptions {
            include_time: true,
            location_text: Some("東京".to_string()),
        };
        assert_eq!(
            context_prefix(&options, &now).as_deref(),
            Some("[コンテキスト] 現在時刻: 2024-05-01 09:30 / 現在地: 東京")
        );
        assert_eq!(context_prefix(&ContextOptions::default(), &now), None);
    }

    #[test]
    fn messages_are_ordered_and_history_is_capped() {
        let config = CoreConfig {
            context_turns: 2,
            ..CoreConfig::default()
        };
        let history = [
            turn(Role::User, "old"),
            turn(Role::User, "q1"),
            turn(Role::Assistant, "a1"),
        ];
        let messages = build_messages(&config, "sum", &history, "hi", Some("[コンテキスト] x"));
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "system", "system", "user", "assistant", "user"]);
        assert!(messages[2].content.ends_with("sum"));
        assert_eq!(messages[3].content, "q1");
        assert_eq!(messages[5].content, "[コンテキスト] x\nhi");
    }

    #[test]
    fn empty_summary_is_skipped() {
        let config = CoreConfig::default();
        let messages = build_messages(&config, "  ", &[], "hi", None);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content, "hi");
    }
}
