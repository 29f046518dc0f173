//! Character-count helpers shared by the store, the reply pipeline and the sinks.

pub const ELLIPSIS: char = '…';

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Clip to at most `max` characters; a clipped result ends with [`ELLIPSIS`]
/// and is exactly `max` characters long.
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if char_len(text) <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push(ELLIPSIS);
    out
}
