//! Rolling conversation summary, refreshed after each completed turn.

use crate::config::CoreConfig;
use crate::llm::{ChatMessage, ModelClient};
use crate::log_debug;
use crate::memory::{ConversationTurn, MemoryStore, Role};

/// How many trailing turns the offline fallback appends.
const FALLBACK_TURNS: usize = 2;

pub(crate) fn role_label<'a>(config: &'a CoreConfig, role: Role) -> &'a str {
    match role {
        Role::User => &config.user_label,
        Role::Assistant => &config.mascot_name,
        Role::System => "system",
    }
}

/// Plain-text continuation used when the model is off.
pub fn fallback_summary(config: &CoreConfig, turns: &[ConversationTurn], previous: &str) -> String {
    let start = turns.len().saturating_sub(FALLBACK_TURNS);
    let rendered: String = turns[start..]
        .iter()
        .map(|turn| format!("・{}: {}\n", role_label(config, turn.role), turn.content))
        .collect();
    if rendered.is_empty() {
        return previous.trim().to_string();
    }
    format!("{}\n{}", previous.trim(), rendered)
        .trim()
        .to_string()
}

fn summary_request(
    config: &CoreConfig,
    turns: &[ConversationTurn],
    previous: &str,
) -> Vec<ChatMessage> {
    let start = turns.len().saturating_sub(config.context_turns);
    let convo = turns[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n");
    let mut body = String::new();
    if !previous.trim().is_empty() {
        body.push_str("過去の要約:\n");
        body.push_str(previous.trim());
        body.push_str("\n\n");
    }
    body.push_str("会話:\n");
    body.push_str(&convo);
    vec![
        ChatMessage::system(config.summary_instruction.clone()),
        ChatMessage::user(body),
    ]
}

/// New summary text, or `None` to leave the stored summary unchanged.
///
/// Length is not enforced here; [`MemoryStore::set_summary`] clips it.
pub fn summarize(
    client: Option<&dyn ModelClient>,
    config: &CoreConfig,
    turns: &[ConversationTurn],
    previous: &str,
) -> Option<String> {
    let client = match client {
        Some(client) if config.model_enabled => client,
        _ => return Some(fallback_summary(config, turns, previous)),
    };
    if turns.is_empty() {
        return None;
    }
    match client.chat(&summary_request(config, turns, previous)) {
        Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Ok(_) => {
            log_debug("summarizer: empty model reply; keeping previous summary");
            None
        }
        Err(err) => {
            log_debug(&format!("summarizer: {err:#}; keeping previous summary"));
            None
        }
    }
}

/// Read the latest turns and summary, then store the refreshed summary.
pub fn refresh_summary(store: &MemoryStore, client: Option<&dyn ModelClient>, config: &CoreConfig) {
    let turns = store.recent_turns(config.context_turns.max(FALLBACK_TURNS));
    let previous = store.get_summary();
    if let Some(summary) = summarize(client, config, &turns, &previous) {
        store.set_summary(&summary);
        tracing::debug!(chars = summary.chars().count(), "summary refreshed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryLimits;
    use crate::llm::scripted::{ScriptedModelClient, ScriptedStep};

    fn turn(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.to_string(),
            timestamp: 0,
        }
    }

    fn enabled_config() -> CoreConfig {
        CoreConfig {
            model_enabled: true,
            context_turns: 2,
            ..CoreConfig::default()
        }
    }

    #[test]
    fn disabled_model_appends_latest_exchange() {
        let config = CoreConfig::default();
        let turns = [
            turn(Role::User, "old"),
            turn(Role::User, "hi"),
            turn(Role::Assistant, "hello"),
        ];
        let summary = summarize(None, &config, &turns, "prev").expect("fallback");
        assert_eq!(summary, "prev\n・ユーザー: hi\n・エド: hello");
    }

    #[test]
    fn fallback_with_no_previous_summary_is_trimmed() {
        let config = CoreConfig::default();
        let summary = fallback_summary(&config, &[turn(Role::User, "hi")], "");
        assert_eq!(summary, "・ユーザー: hi");
    }

    #[test]
    fn enabled_model_reply_becomes_summary() {
        let client = ScriptedModelClient::new(vec![ScriptedStep::reply("  short recap  ")]);
        let config = enabled_config();
        let turns = [
            turn(Role::User, "a"),
            turn(Role::User, "b"),
            turn(Role::Assistant, "c"),
        ];
        let summary = summarize(Some(&client), &config, &turns, "earlier");
        assert_eq!(summary.as_deref(), Some("short recap"));

        let request = &client.requests()[0];
        assert_eq!(request[0].content, config.summary_instruction);
        assert!(request[1].content.contains("earlier"));
        assert!(request[1].content.contains("user: b\nassistant: c"));
        assert!(!request[1].content.contains("user: a"));
    }

    #[test]
    fn model_failure_leaves_summary_unchanged() {
        let store = MemoryStore::in_memory(MemoryLimits::default());
        store.set_summary("keep me");
        store.append_turn(Role::User, "hi");
        let client = ScriptedModelClient::new(vec![ScriptedStep::fail("down")]);
        refresh_summary(&store, Some(&client), &enabled_config());
        assert_eq!(store.get_summary(), "keep me");
    }

    #[test]
    fn refresh_is_bounded_by_store() {
        let store = MemoryStore::in_memory(MemoryLimits {
            max_summary_chars: 10,
            ..MemoryLimits::default()
        });
        let client = ScriptedModelClient::new(vec![ScriptedStep::reply(&"long ".repeat(20))]);
        store.append_turn(Role::User, "hi");
        refresh_summary(&store, Some(&client), &enabled_config());
        assert_eq!(store.get_summary().chars().count(), 10);
    }
}
