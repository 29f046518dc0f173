//! Immutable configuration snapshot read by the conversation core.
//!
//! Built once from [`Settings`] and shared as `Arc<CoreConfig>`. A reload builds
//! a fresh snapshot; nothing in the core mutates one in place.

use std::time::Duration;

use super::Settings;

/// Lower bound for the escalation interval.
pub const MIN_ANSWER_TIMEOUT_MS: u64 = 1000;
const SUMMARY_BUDGET_MIN: usize = 120;
const SUMMARY_BUDGET_MAX: usize = 4000;

/// Size bounds enforced by the memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub max_history: usize,
    pub max_facts: usize,
    pub max_summary_chars: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_history: 20,
            max_facts: 50,
            max_summary_chars: 800,
        }
    }
}

/// Fixed user-facing strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessages {
    pub pending: String,
    pub disabled: String,
    pub unavailable: String,
    pub unknown_reply: String,
}

/// Optional contextual text prefixed onto what the model sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOptions {
    pub include_time: bool,
    pub location_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyLanguage {
    Japanese,
    English,
}

impl ReplyLanguage {
    /// Parse `ja`/`en` style codes; anything else disables enforcement.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ja" | "jp" | "japanese" => Some(Self::Japanese),
            "en" | "english" => Some(Self::English),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    pub limits: MemoryLimits,
    pub answer_max_chars: usize,
    pub answer_timeout: Duration,
    pub answer_max_wait: Duration,
    pub context_turns: usize,
    pub model_enabled: bool,
    pub summarize_enabled: bool,
    pub learning_enabled: bool,
    pub deny_list: Vec<String>,
    /// `{term}` is replaced with the matched deny-list entry.
    pub rejection_template: String,
    pub messages: UserMessages,
    pub context: ContextOptions,
    pub system_prompt: String,
    pub length_instruction: String,
    pub summary_instruction: String,
    pub reply_language: Option<ReplyLanguage>,
    pub mascot_name: String,
    pub user_label: String,
    pub chat_mode: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CoreConfig {
    /// Build a snapshot from the layered settings, applying validation clamps.
    pub fn from_settings(settings: &Settings) -> Self {
        let limits = MemoryLimits {
            max_history: settings.memory.max_history,
            max_facts: settings.learning.max_facts,
            max_summary_chars: settings.learning.max_summary_chars,
        };
        let answer_max_chars = settings.net.answer_max_chars.max(1);
        let timeout_ms = settings.net.answer_timeout_ms.max(MIN_ANSWER_TIMEOUT_MS);
        let summary_budget = limits
            .max_summary_chars
            .clamp(SUMMARY_BUDGET_MIN, SUMMARY_BUDGET_MAX);
        let location_text = if settings.context.include_location {
            Some(settings.context.location_text.trim().to_string()).filter(|s| !s.is_empty())
        } else {
            None
        };
        Self {
            limits,
            answer_max_chars,
            answer_timeout: Duration::from_millis(timeout_ms),
            answer_max_wait: Duration::from_millis(settings.net.answer_max_wait_ms),
            context_turns: settings.llm.context_turns,
            model_enabled: settings.llm.enabled,
            summarize_enabled: settings.learning.summarize_enabled,
            learning_enabled: settings.learning.enabled,
            deny_list: settings.safety.banned_keywords.clone(),
            rejection_template: settings.safety.reason_template.clone(),
            messages: UserMessages {
                pending: settings.talk.pending_text.clone(),
                disabled: settings.talk.disabled_message.clone(),
                unavailable: settings.talk.unavailable_message.clone(),
                unknown_reply: settings.talk.unknown_reply.clone(),
            },
            context: ContextOptions {
                include_time: settings.context.include_time,
                location_text,
            },
            system_prompt: settings.llm.system_prompt.clone(),
            length_instruction: settings
                .llm
                .length_instruction
                .replace("{max_chars}", &answer_max_chars.to_string()),
            summary_instruction: settings
                .llm
                .summary_instruction
                .replace("{max_chars}", &summary_budget.to_string()),
            reply_language: ReplyLanguage::from_code(&settings.llm.reply_language),
            mascot_name: settings.talk.mascot_name.clone(),
            user_label: settings.talk.user_label.clone(),
            chat_mode: settings.talk.chat_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_settings_defaults() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.limits, MemoryLimits::default());
        assert_eq!(cfg.answer_max_chars, 220);
        assert_eq!(cfg.answer_timeout, Duration::from_millis(45_000));
        assert_eq!(cfg.answer_max_wait, Duration::from_millis(180_000));
        assert!(!cfg.model_enabled);
        assert_eq!(cfg.reply_language, Some(ReplyLanguage::Japanese));
        assert!(cfg.length_instruction.contains("220"));
        assert!(cfg.summary_instruction.contains("800"));
    }

    #[test]
    fn timeout_is_clamped_to_floor() {
        let mut settings = Settings::default();
        settings.net.answer_timeout_ms = 10;
        let cfg = CoreConfig::from_settings(&settings);
        assert_eq!(
            cfg.answer_timeout,
            Duration::from_millis(MIN_ANSWER_TIMEOUT_MS)
        );
    }

    #[test]
    fn summary_instruction_budget_is_clamped_but_limit_is_not() {
        let mut settings = Settings::default();
        settings.learning.max_summary_chars = 10;
        let cfg = CoreConfig::from_settings(&settings);
        assert_eq!(cfg.limits.max_summary_chars, 10);
        assert!(cfg.summary_instruction.contains("120"));

        settings.learning.max_summary_chars = 99_999;
        let cfg = CoreConfig::from_settings(&settings);
        assert!(cfg.summary_instruction.contains("4000"));
    }

    #[test]
    fn location_requires_flag_and_text() {
        let mut settings = Settings::default();
        settings.context.location_text = "  Tokyo ".to_string();
        assert_eq!(
            CoreConfig::from_settings(&settings).context.location_text,
            Some("Tokyo".to_string())
        );
        settings.context.include_location = false;
        assert_eq!(
            CoreConfig::from_settings(&settings).context.location_text,
            None
        );
    }

    #[test]
    fn reply_language_codes() {
        assert_eq!(ReplyLanguage::from_code("EN"), Some(ReplyLanguage::English));
        assert_eq!(ReplyLanguage::from_code(""), None);
        assert_eq!(ReplyLanguage::from_code("fr"), None);
    }
}
