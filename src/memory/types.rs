use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::MemoryLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Unix seconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub text: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact {
    pub text: String,
    pub count: i64,
    /// Fractional unix seconds.
    pub first_seen: f64,
    pub last_seen: f64,
}

/// Raw external sensor telemetry; never part of [`MemorySnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub source: String,
    pub device_id: String,
    pub device_name: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub illuminance: Option<f64>,
    pub motion: Option<bool>,
    pub event_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitsView {
    pub max_history: usize,
    pub max_facts: usize,
    pub max_summary_chars: usize,
}

impl From<MemoryLimits> for LimitsView {
    fn from(limits: MemoryLimits) -> Self {
        Self {
            max_history: limits.max_history,
            max_facts: limits.max_facts,
            max_summary_chars: limits.max_summary_chars,
        }
    }
}

/// Diagnostic view of the bounded collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub conversation: Vec<ConversationTurn>,
    pub queries: Vec<Query>,
    pub summary: String,
    pub facts: Vec<Fact>,
    pub profile: ProfileView,
    pub counters: BTreeMap<String, i64>,
    pub limits: LimitsView,
}
