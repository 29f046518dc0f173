//! Where the session's output goes: an ephemeral bubble or a persistent panel.
//!
//! The session owns exactly one sink, chosen once per mode, and is the only
//! caller of it.

mod bubble;
mod capture;
mod panel;

use std::io::Write;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::TalkSettings;
use crate::memory::{ConversationTurn, Role};

pub use bubble::{Bubble, BubbleOptions, BubbleSink};
pub use capture::{CaptureSink, DisplayEvent};
pub use panel::PanelSink;

pub trait DisplaySink: Send {
    fn show(&mut self, text: &str, role: Role);
    fn set_busy(&mut self, busy: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Bubble,
    Panel,
}

impl DisplayMode {
    pub fn from_chat_mode(chat_mode: bool) -> Self {
        if chat_mode {
            Self::Panel
        } else {
            Self::Bubble
        }
    }
}

/// Speaker names shown in front of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLabels {
    pub user: String,
    pub assistant: String,
    pub system: String,
}

impl DisplayLabels {
    pub fn from_talk(talk: &TalkSettings) -> Self {
        Self {
            user: talk.user_label.clone(),
            assistant: talk.mascot_name.clone(),
            system: "system".to_string(),
        }
    }

    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user,
            Role::Assistant => &self.assistant,
            Role::System => &self.system,
        }
    }
}

pub(crate) fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Clip to `max_width` terminal columns, ending with `…` when clipped.
pub(crate) fn truncate_display(text: &str, max_width: usize) -> String {
    if display_width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let budget = max_width - 1;
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push(crate::text::ELLIPSIS);
    out
}

/// Build the sink for `mode`, writing to `writer`. A panel starts out showing
/// `history`; a bubble ignores it.
pub fn sink_for_mode<W: Write + Send + 'static>(
    mode: DisplayMode,
    talk: &TalkSettings,
    writer: W,
    history: &[ConversationTurn],
) -> Box<dyn DisplaySink> {
    let labels = DisplayLabels::from_talk(talk);
    match mode {
        DisplayMode::Bubble => Box::new(BubbleSink::new(
            writer,
            BubbleOptions::from_talk(talk),
            labels,
        )),
        DisplayMode::Panel => {
            let mut panel = PanelSink::new(writer, talk.panel_history, labels);
            panel.seed(history);
            Box::new(panel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_chat_flag() {
        assert_eq!(DisplayMode::from_chat_mode(true), DisplayMode::Panel);
        assert_eq!(DisplayMode::from_chat_mode(false), DisplayMode::Bubble);
    }

    #[test]
    fn truncate_counts_wide_glyphs_as_two_columns() {
        assert_eq!(truncate_display("あいうえお", 6), "あい…");
        assert_eq!(truncate_display("abc", 3), "abc");
        assert_eq!(truncate_display("abcdef", 4), "abc…");
        assert_eq!(truncate_display("abc", 0), "");
    }

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buf").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().expect("buf").clone()).expect("utf8")
        }
    }

    fn stored(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn panel_sink_replays_history_bubble_does_not() {
        let talk = TalkSettings::default();
        let history = [stored(Role::User, "hi"), stored(Role::Assistant, "やあ")];

        let panel_buf = SharedBuf::default();
        let _panel = sink_for_mode(DisplayMode::Panel, &talk, panel_buf.clone(), &history);
        assert_eq!(panel_buf.text(), "ユーザー> hi\nエド> やあ\n");

        let bubble_buf = SharedBuf::default();
        let mut bubble = sink_for_mode(DisplayMode::Bubble, &talk, bubble_buf.clone(), &history);
        assert!(bubble_buf.text().is_empty());
        bubble.show("こんにちは", Role::Assistant);
        assert_eq!(bubble_buf.text(), "(エド) こんにちは\n");
    }

    #[test]
    fn labels_map_roles() {
        let labels = DisplayLabels::from_talk(&TalkSettings::default());
        assert_eq!(labels.for_role(Role::Assistant), "エド");
        assert_eq!(labels.for_role(Role::User), "ユーザー");
    }
}
