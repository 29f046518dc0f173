//! Configuration assembly: CLI flags, the TOML settings file, and the immutable
//! snapshot the conversation core reads.

mod cli;
mod settings;
mod snapshot;

pub use cli::AppConfig;
pub use settings::{
    default_settings_path, resolve_settings_path, ContextSettings, LearningSettings, LlmSettings,
    MemorySettings, NetSettings, ProfileSettings, SafetySettings, Settings, TalkSettings,
};
pub use snapshot::{
    ContextOptions, CoreConfig, MemoryLimits, ReplyLanguage, UserMessages, MIN_ANSWER_TIMEOUT_MS,
};
