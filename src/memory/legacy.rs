//! One-time import of the flat JSON memory file used before the database existed.
//!
//! Parsing is lenient: malformed entries are skipped, not rejected.

use rusqlite::{params, Transaction};
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::types::Role;
use crate::log_debug;

#[derive(Debug, Default, PartialEq)]
pub(super) struct LegacyMemory {
    pub conversation: Vec<(Role, String)>,
    pub queries: Vec<String>,
    pub summary: Option<String>,
    pub name: Option<String>,
    pub facts: Vec<LegacyFact>,
}

#[derive(Debug, PartialEq)]
pub(super) struct LegacyFact {
    pub text: String,
    pub count: i64,
    pub first_seen: f64,
    pub last_seen: f64,
}

fn trimmed_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn array<'a>(root: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    root.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

pub(super) fn parse_legacy(contents: &str) -> Option<LegacyMemory> {
    let root: Value = serde_json::from_str(contents).ok()?;
    if !root.is_object() {
        return None;
    }
    let conversation = array(&root, "conversation")
        .filter_map(|turn| {
            let role = turn.get("role").and_then(Value::as_str).and_then(Role::parse)?;
            let content = trimmed_str(turn.get("content"))?;
            Some((role, content))
        })
        .collect();
    let queries = array(&root, "queries")
        .filter_map(|q| trimmed_str(Some(q)))
        .collect();
    let facts = array(&root, "facts")
        .filter_map(|fact| {
            let text = trimmed_str(fact.get("text"))?;
            Some(LegacyFact {
                text,
                count: fact.get("count").and_then(Value::as_i64).unwrap_or(1).max(1),
                first_seen: fact.get("first_seen").and_then(Value::as_f64).unwrap_or(0.0),
                last_seen: fact.get("last_seen").and_then(Value::as_f64).unwrap_or(0.0),
            })
        })
        .collect();
    Some(LegacyMemory {
        conversation,
        queries,
        summary: trimmed_str(root.get("summary")),
        name: trimmed_str(root.get("profile").and_then(|p| p.get("name"))),
        facts,
    })
}

pub(super) fn read_legacy(path: &Path) -> Option<LegacyMemory> {
    let contents = fs::read_to_string(path).ok()?;
    let parsed = parse_legacy(&contents);
    if parsed.is_none() {
        log_debug(&format!("memory: legacy file {} is not valid JSON", path.display()));
    }
    parsed
}

/// Insert everything; bounds are enforced by the caller afterwards.
pub(super) fn import(tx: &Transaction<'_>, legacy: &LegacyMemory) -> rusqlite::Result<()> {
    for (role, content) in &legacy.conversation {
        tx.execute(
            "INSERT INTO conversation(role, content) VALUES (?1, ?2)",
            params![role.as_str(), content],
        )?;
    }
    for text in &legacy.queries {
        tx.execute("INSERT INTO queries(text) VALUES (?1)", params![text])?;
    }
    if let Some(summary) = &legacy.summary {
        tx.execute(
            "INSERT OR REPLACE INTO summary(id, text) VALUES (1, ?1)",
            params![summary],
        )?;
    }
    if let Some(name) = &legacy.name {
        tx.execute(
            "INSERT OR REPLACE INTO profile(id, name) VALUES (1, ?1)",
            params![name],
        )?;
    }
    for fact in &legacy.facts {
        tx.execute(
            "INSERT OR IGNORE INTO facts(text, count, first_seen, last_seen) VALUES (?1, ?2, ?3, ?4)",
            params![fact.text, fact.count, fact.first_seen, fact.last_seen],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_file() {
        let parsed = parse_legacy(
            r#"{
                "conversation": [{"role": "user", "content": "hi"}, {"role": "assistant", "content": "yo"}],
                "queries": ["hi", "  "],
                "summary": "s",
                "profile": {"name": " Aki "},
                "facts": [{"text": "likes tea", "count": 3, "first_seen": 1.0, "last_seen": 2.0}]
            }"#,
        )
        .expect("parse");
        assert_eq!(parsed.conversation.len(), 2);
        assert_eq!(parsed.queries, vec!["hi".to_string()]);
        assert_eq!(parsed.summary.as_deref(), Some("s"));
        assert_eq!(parsed.name.as_deref(), Some("Aki"));
        assert_eq!(parsed.facts[0].count, 3);
    }

    #[test]
    fn skips_malformed_entries() {
        let parsed = parse_legacy(
            r#"{"conversation": [{"role": "robot", "content": "x"}, {"role": "user"}, 5],
                "facts": [{"count": 2}, {"text": "ok", "count": -4}],
                "profile": []}"#,
        )
        .expect("parse");
        assert!(parsed.conversation.is_empty());
        assert_eq!(parsed.facts.len(), 1);
        assert_eq!(parsed.facts[0].count, 1);
        assert_eq!(parsed.name, None);
    }

    #[test]
    fn rejects_non_object_roots() {
        assert_eq!(parse_legacy("[1,2]"), None);
        assert_eq!(parse_legacy("{broken"), None);
    }
}
