//! Model client adapter: an ordered list of role/content messages in, reply text out.
//!
//! Implementations own their per-call network timeout and never retry; the
//! session decides how long it is willing to wait.

mod openai_compat;
pub mod scripted;
mod translate;

use serde::{Deserialize, Serialize};

pub use openai_compat::{OpenAiCompatClient, OpenAiCompatOptions};
pub use translate::{needs_translation, translate_if_needed};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Blocking chat completion. An `Err` or an empty reply both mean "unavailable".
pub trait ModelClient: Send + Sync {
    fn chat(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}
