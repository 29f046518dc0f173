//! Lightweight learning pass over user utterances: self-introductions and
//! short first-person statements.

use regex::Regex;
use std::sync::OnceLock;

use crate::log_debug_content;
use crate::memory::MemoryStore;

const MAX_NAME_CHARS: usize = 24;
const MIN_FACT_CHARS: usize = 4;
const MAX_FACT_CHARS: usize = 60;
const NAME_SUFFIXES: [&str; 6] = ["と申します", "といいます", "だよ", "です", "だ", "さん"];
const FIRST_PERSON_JA: [&str; 6] = ["私は", "わたしは", "僕は", "ぼくは", "俺は", "おれは"];
const FIRST_PERSON_EN: [&str; 5] = ["i ", "i'm ", "i am ", "my ", "i've "];

fn name_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\bmy name is\s+([\p{L}\p{N}_'-]+)",
            r"(?i)\bcall me\s+([\p{L}\p{N}_'-]+)",
            r"(?:私|わたし|僕|ぼく|俺|おれ)の名前は\s*([^\s、。，．！!？?]+)",
            r"([^\s、。，．！!？?]+?)(?:って|と)呼んで",
        ]
        .iter()
        .filter_map(|raw| Regex::new(raw).ok())
        .collect()
    })
}

fn clean_name(raw: &str) -> Option<String> {
    let mut name = raw.trim().trim_matches(|c: char| "「」『』\"'".contains(c));
    for suffix in NAME_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped;
            break;
        }
    }
    let name = name.trim();
    let len = name.chars().count();
    (len > 0 && len <= MAX_NAME_CHARS).then(|| name.to_string())
}

/// Name from an explicit self-introduction, if any.
pub fn extract_user_name(text: &str) -> Option<String> {
    name_patterns()
        .iter()
        .filter_map(|re| re.captures(text))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .find_map(|raw| clean_name(&raw))
}

fn is_first_person(sentence: &str) -> bool {
    if FIRST_PERSON_JA.iter().any(|p| sentence.starts_with(p)) {
        return true;
    }
    let lowered = sentence.to_lowercase();
    FIRST_PERSON_EN.iter().any(|p| lowered.starts_with(p))
}

/// Short first-person statements; questions and self-introductions are skipped.
pub fn extract_facts(text: &str) -> Vec<String> {
    let mut facts = Vec::new();
    let mut sentence = String::new();
    for ch in text.chars().chain(std::iter::once('\n')) {
        let terminator = matches!(ch, '。' | '！' | '!' | '？' | '?' | '\n' | '.');
        if !terminator {
            sentence.push(ch);
            continue;
        }
        let candidate = sentence.trim().to_string();
        sentence.clear();
        let is_question = matches!(ch, '？' | '?');
        let len = candidate.chars().count();
        if is_question || !(MIN_FACT_CHARS..=MAX_FACT_CHARS).contains(&len) {
            continue;
        }
        if !is_first_person(&candidate) || extract_user_name(&candidate).is_some() {
            continue;
        }
        if !facts.contains(&candidate) {
            facts.push(candidate);
        }
    }
    facts
}

/// Apply the learning pass for one accepted utterance.
pub fn learn_from_utterance(store: &MemoryStore, text: &str) {
    if let Some(name) = extract_user_name(text) {
        log_debug_content(&format!("learning: user name {name:?}"));
        store.set_user_name(&name);
    }
    for fact in extract_facts(text) {
        log_debug_content(&format!("learning: fact {fact:?}"));
        store.upsert_fact(&fact);
    }
}
