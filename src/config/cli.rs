//! Shared CLI flags so every binary resolves paths, logging, and model overrides the same way.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, Default)]
#[command(about = "Edo companion talker", author, version)]
pub struct AppConfig {
    /// Settings file (TOML); defaults to $EDO_TALKER_CONFIG or the user config dir
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Conversation database path (overrides memory.path)
    #[arg(long = "db")]
    pub db: Option<PathBuf>,

    /// Legacy JSON memory file imported once into an empty database
    #[arg(long = "legacy-json")]
    pub legacy_json: Option<PathBuf>,

    /// Show replies in the persistent chat panel instead of the popup bubble
    #[arg(long = "chat-mode", default_value_t = false)]
    pub chat_mode: bool,

    /// Force the model integration on, ignoring llm.enabled
    #[arg(long = "llm", action = ArgAction::SetTrue, conflicts_with = "no_llm")]
    pub llm: bool,

    /// Force the model integration off, ignoring llm.enabled
    #[arg(long = "no-llm", action = ArgAction::SetTrue)]
    pub no_llm: bool,

    /// OpenAI-compatible endpoint base URL (e.g. http://localhost:1234/v1)
    #[arg(long = "llm-base-url", env = "EDO_TALKER_LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Model name sent with every request
    #[arg(long = "llm-model", env = "EDO_TALKER_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Bearer token for the model endpoint
    #[arg(long = "llm-api-key", env = "EDO_TALKER_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Enable the debug log and JSON trace output
    #[arg(long = "logs", default_value_t = false)]
    pub logs: bool,

    /// Allow utterances and replies to appear in the debug log
    #[arg(long = "log-content", default_value_t = false)]
    pub log_content: bool,

    /// Disable all logging, even when --logs is set
    #[arg(long = "no-logs", default_value_t = false)]
    pub no_logs: bool,
}

impl AppConfig {
    /// Model enable override from flags; `None` defers to the settings file.
    pub fn llm_override(&self) -> Option<bool> {
        match (self.llm, self.no_llm) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
