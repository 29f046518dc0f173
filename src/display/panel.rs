use std::collections::VecDeque;
use std::io::Write;

use super::{DisplayLabels, DisplaySink};
use crate::log_debug;
use crate::memory::{ConversationTurn, Role};

/// Persistent transcript with a bounded history.
pub struct PanelSink<W: Write> {
    writer: W,
    history: VecDeque<(Role, String)>,
    capacity: usize,
    labels: DisplayLabels,
    busy: bool,
}

impl<W: Write> PanelSink<W> {
    pub fn new(writer: W, capacity: usize, labels: DisplayLabels) -> Self {
        Self {
            writer,
            history: VecDeque::new(),
            capacity: capacity.max(1),
            labels,
            busy: false,
        }
    }

    /// Populate the transcript from stored turns, oldest first.
    pub fn seed(&mut self, turns: &[ConversationTurn]) {
        for turn in turns {
            self.append(&turn.content, turn.role);
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &(Role, String)> {
        self.history.iter()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn append(&mut self, text: &str, role: Role) {
        let label = self.labels.for_role(role).to_string();
        let mut write_result = Ok(());
        for line in text.lines() {
            write_result = write_result.and_then(|()| writeln!(self.writer, "{label}> {line}"));
        }
        if let Err(err) = write_result.and_then(|()| self.writer.flush()) {
            log_debug(&format!("panel: write failed: {err}"));
        }
        self.history.push_back((role, text.to_string()));
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }
}

impl<W: Write + Send> DisplaySink for PanelSink<W> {
    fn show(&mut self, text: &str, role: Role) {
        self.append(text, role);
    }

    fn set_busy(&mut self, busy: bool) {
        if self.busy == busy {
            return;
        }
        self.busy = busy;
        if !busy {
            let _ = write!(self.writer, "> ").and_then(|()| self.writer.flush());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TalkSettings;

    fn sink(capacity: usize) -> PanelSink<Vec<u8>> {
        PanelSink::new(
            Vec::new(),
            capacity,
            DisplayLabels::from_talk(&TalkSettings::default()),
        )
    }

    #[test]
    fn appends_labelled_lines() {
        let mut panel = sink(10);
        panel.show("hi\nthere", Role::User);
        panel.show("yo", Role::Assistant);
        let written = String::from_utf8(panel.writer().clone()).expect("utf8");
        assert_eq!(written, "ユーザー> hi\nユーザー> there\nエド> yo\n");
        assert_eq!(panel.history().count(), 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut panel = sink(2);
        for text in ["a", "b", "c"] {
            panel.show(text, Role::Assistant);
        }
        let kept: Vec<&str> = panel.history().map(|(_, t)| t.as_str()).collect();
        assert_eq!(kept, vec!["b", "c"]);
    }

    #[test]
    fn seed_replays_turns() {
        let mut panel = sink(10);
        panel.seed(&[
            ConversationTurn {
                role: Role::User,
                content: "q".to_string(),
                timestamp: 1,
            },
            ConversationTurn {
                role: Role::Assistant,
                content: "a".to_string(),
                timestamp: 2,
            },
        ]);
        assert_eq!(panel.history().count(), 2);
    }

    #[test]
    fn prompt_reappears_when_idle() {
        let mut panel = sink(10);
        panel.set_busy(true);
        panel.set_busy(false);
        assert!(!panel.is_busy());
        assert_eq!(String::from_utf8(panel.writer().clone()).expect("utf8"), "> ");
    }
}
