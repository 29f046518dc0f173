//! Keep replies in the configured language by asking the model to translate.

use regex::Regex;
use std::sync::OnceLock;

use super::{ChatMessage, ModelClient};
use crate::config::ReplyLanguage;
use crate::log_debug;

const JA_TRANSLATE_PROMPT: &str = "次のテキストを自然な日本語に翻訳してください。箇条書きや改行は維持し、過度な絵文字や擬態語は控えめに。英語のフレーズやアクション記法（例:*stretches*）も日本語に言い換えてください。";
const EN_TRANSLATE_PROMPT: &str = "Translate the following text into natural English. Keep bullet points and line breaks. Rephrase any action notation such as *stretches* as plain English.";

fn action_marker_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*[^*\n]+\*").ok()).as_ref()
}

fn is_japanese_char(ch: char) -> bool {
    matches!(ch,
        '\u{3040}'..='\u{309F}'   // hiragana
        | '\u{30A0}'..='\u{30FF}' // katakana
        | '\u{4E00}'..='\u{9FFF}' // CJK unified
        | '\u{3400}'..='\u{4DBF}'
        | '\u{FF66}'..='\u{FF9F}')
}

fn has_japanese(text: &str) -> bool {
    text.chars().any(is_japanese_char)
}

fn has_latin_letters(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphabetic())
}

fn has_action_markers(text: &str) -> bool {
    action_marker_regex().is_some_and(|re| re.is_match(text))
}

/// Whether `text` should be sent back to the model for translation.
pub fn needs_translation(text: &str, language: ReplyLanguage) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    match language {
        ReplyLanguage::Japanese => {
            !has_japanese(text) || has_latin_letters(text) || has_action_markers(text)
        }
        ReplyLanguage::English => has_japanese(text),
    }
}

/// Translate `text` when needed; on any failure the original text is kept.
pub fn translate_if_needed(
    client: &dyn ModelClient,
    text: &str,
    language: Option<ReplyLanguage>,
) -> String {
    let Some(language) = language else {
        return text.to_string();
    };
    if !needs_translation(text, language) {
        return text.to_string();
    }
    let prompt = match language {
        ReplyLanguage::Japanese => JA_TRANSLATE_PROMPT,
        ReplyLanguage::English => EN_TRANSLATE_PROMPT,
    };
    let messages = [ChatMessage::system(prompt), ChatMessage::user(text)];
    match client.chat(&messages) {
        Ok(translated) if !translated.trim().is_empty() => translated.trim().to_string(),
        Ok(_) => text.to_string(),
        Err(err) => {
            log_debug(&format!("translate: keeping original reply ({err:#})"));
            text.to_string()
        }
    }
}
