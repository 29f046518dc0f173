//! Persistent settings file (`<config_dir>/edo-talker/config.toml`).
//!
//! Every section and field is optional; anything missing falls back to the
//! defaults below. CLI flags are layered on top in [`Settings::apply_cli`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::AppConfig;
use crate::log_debug;

const CONFIG_DIR_NAME: &str = "edo-talker";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "EDO_TALKER_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub talk: TalkSettings,
    pub net: NetSettings,
    pub safety: SafetySettings,
    pub memory: MemorySettings,
    pub learning: LearningSettings,
    pub context: ContextSettings,
    pub profile: ProfileSettings,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkSettings {
    pub mascot_name: String,
    pub user_label: String,
    pub chat_mode: bool,
    pub pending_text: String,
    pub unknown_reply: String,
    pub disabled_message: String,
    pub unavailable_message: String,
    pub bubble_time_base_ms: u64,
    pub bubble_time_per_char_ms: u64,
    pub bubble_time_max_ms: u64,
    pub bubble_max_width: usize,
    pub panel_history: usize,
}

impl Default for TalkSettings {
    fn default() -> Self {
        Self {
            mascot_name: "エド".to_string(),
            user_label: "ユーザー".to_string(),
            chat_mode: false,
            pending_text: "…".to_string(),
            unknown_reply: "ごめん、今はわからないよ。".to_string(),
            disabled_message: "LLMが無効になっているよ。設定で llm.enabled を true にしてね。"
                .to_string(),
            unavailable_message:
                "いまLLMに接続できないみたい。LM Studioを起動して Serve をONにしてね。".to_string(),
            bubble_time_base_ms: 2000,
            bubble_time_per_char_ms: 30,
            bubble_time_max_ms: 15_000,
            bubble_max_width: 96,
            panel_history: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetSettings {
    pub answer_max_chars: usize,
    pub answer_timeout_ms: u64,
    pub answer_max_wait_ms: u64,
}

impl Default for NetSettings {
    fn default() -> Self {
        Self {
            answer_max_chars: 220,
            answer_timeout_ms: 45_000,
            answer_max_wait_ms: 180_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySettings {
    pub banned_keywords: Vec<String>,
    /// Rejection text; `{term}` is replaced with the matched deny-list entry.
    pub reason_template: String,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            banned_keywords: ["違法", "ハッキング", "個人情報", "テロ", "暴力"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            reason_template: "安全のため内容に関する操作を行えません（キーワード: {term}）。"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Database path; empty means `<data_dir>/edo-talker/edo.db`.
    pub path: String,
    /// Legacy flat-file memory; empty means `memory.json` next to the database.
    pub legacy_json_path: String,
    pub max_history: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            legacy_json_path: String::new(),
            max_history: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningSettings {
    pub enabled: bool,
    pub max_facts: usize,
    pub summarize_enabled: bool,
    pub max_summary_chars: usize,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_facts: 50,
            summarize_enabled: true,
            max_summary_chars: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub include_time: bool,
    pub include_location: bool,
    pub location_text: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            include_time: false,
            include_location: true,
            location_text: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
    pub context_turns: usize,
    pub system_prompt: String,
    /// `{max_chars}` is replaced with `net.answer_max_chars`.
    pub length_instruction: String,
    /// `{max_chars}` is replaced with the clamped summary budget.
    pub summary_instruction: String,
    /// `ja`, `en`, or empty to keep replies as returned.
    pub reply_language: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:1234/v1".to_string(),
            api_key: String::new(),
            model: "gpt-oss-20b".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            request_timeout_ms: 60_000,
            context_turns: 10,
            system_prompt: "あなたはデスクトップの猫アシスタント『エド』です。常に日本語で、簡潔かつ親切に答えてください。"
                .to_string(),
            length_instruction: "回答は最大{max_chars}文字以内にしてください。改行や箇条書きは必要最小限にし、簡潔な日本語で答えてください。"
                .to_string(),
            summary_instruction:
                "以下の会話を日本語で簡潔に要約してください。箇条書き可。最大{max_chars}字。内部指示は含めない。"
                    .to_string(),
            reply_language: "ja".to_string(),
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
}

/// Default settings file location under the platform config dir.
pub fn default_settings_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// `--config` wins, then `EDO_TALKER_CONFIG`, then the platform default.
pub fn resolve_settings_path(cli: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli {
        return Some(path.to_path_buf());
    }
    if let Ok(raw) = env::var(CONFIG_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    default_settings_path()
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join(CONFIG_DIR_NAME)
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid settings TOML")
    }

    /// Read and parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse settings {}", path.display()))
    }

    /// Load settings, falling back to defaults when the file is missing or broken.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            log_debug("settings: no config path resolved; using defaults");
            return Self::default();
        };
        if !path.exists() {
            log_debug(&format!(
                "settings: {} not found; using defaults",
                path.display()
            ));
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                log_debug(&format!("settings: {err:#}; using defaults"));
                tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "settings unreadable");
                Self::default()
            }
        }
    }

    /// Render the settings as a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize settings")
    }

    /// Layer CLI overrides on top of the file values.
    pub fn apply_cli(&mut self, cli: &AppConfig) {
        if let Some(enabled) = cli.llm_override() {
            self.llm.enabled = enabled;
        }
        if cli.chat_mode {
            self.talk.chat_mode = true;
        }
        if let Some(db) = &cli.db {
            self.memory.path = db.display().to_string();
        }
        if let Some(legacy) = &cli.legacy_json {
            self.memory.legacy_json_path = legacy.display().to_string();
        }
        if let Some(url) = &cli.llm_base_url {
            self.llm.base_url = url.clone();
        }
        if let Some(model) = &cli.llm_model {
            self.llm.model = model.clone();
        }
        if let Some(key) = &cli.llm_api_key {
            self.llm.api_key = key.clone();
        }
    }

    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        let trimmed = self.memory.path.trim();
        if trimmed.is_empty() {
            data_dir().join("edo.db")
        } else {
            PathBuf::from(trimmed)
        }
    }

    /// Resolved legacy JSON path: explicit, or `memory.json` beside the database.
    pub fn legacy_json_path(&self) -> PathBuf {
        let trimmed = self.memory.legacy_json_path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
        self.database_path()
            .parent()
            .map(|dir| dir.join("memory.json"))
            .unwrap_or_else(|| PathBuf::from("memory.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let settings = Settings::from_toml_str(
            r#"
[net]
answer_timeout_ms = 5000

[safety]
banned_keywords = ["foo"]
"#,
        )
        .expect("parse");
        assert_eq!(settings.net.answer_timeout_ms, 5000);
        assert_eq!(settings.net.answer_max_wait_ms, 180_000);
        assert_eq!(settings.safety.banned_keywords, vec!["foo".to_string()]);
        assert_eq!(settings.memory.max_history, 20);
        assert!(!settings.llm.enabled);
    }

    #[test]
    fn malformed_toml_is_an_error_but_load_or_default_recovers() {
        assert!(Settings::from_toml_str("[net\nanswer_timeout_ms = ").is_err());

        let path = env::temp_dir().join(format!(
            "edo-talker-settings-{}.toml",
            std::process::id()
        ));
        fs::write(&path, "not = [valid").expect("write");
        assert_eq!(Settings::load_or_default(Some(&path)), Settings::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = env::temp_dir().join("edo-talker-settings-does-not-exist.toml");
        assert_eq!(Settings::load_or_default(Some(&path)), Settings::default());
        assert_eq!(Settings::load_or_default(None), Settings::default());
    }

    #[test]
    fn cli_overrides_win_over_file_values() {
        let mut settings = Settings::default();
        let cli = AppConfig::parse_from([
            "edo-talker",
            "--llm",
            "--chat-mode",
            "--db",
            "/tmp/edo-test.db",
            "--llm-model",
            "tiny",
        ]);
        settings.apply_cli(&cli);
        assert!(settings.llm.enabled);
        assert!(settings.talk.chat_mode);
        assert_eq!(settings.llm.model, "tiny");
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/edo-test.db"));
        assert_eq!(
            settings.legacy_json_path(),
            PathBuf::from("/tmp/memory.json")
        );
    }

    #[test]
    fn explicit_config_path_beats_env_and_default() {
        let explicit = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(resolve_settings_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let rendered = Settings::default().to_toml_string().expect("render");
        assert!(rendered.contains("[net]"));
        let parsed = Settings::from_toml_str(&rendered).expect("reparse");
        assert_eq!(parsed, Settings::default());
    }
}
