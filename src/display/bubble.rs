use std::io::Write;
use std::time::Duration;

use super::{truncate_display, DisplayLabels, DisplaySink};
use crate::config::TalkSettings;
use crate::log_debug;
use crate::memory::Role;
use crate::text::char_len;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleOptions {
    pub max_width: usize,
    pub base: Duration,
    pub per_char: Duration,
    pub max: Duration,
}

impl BubbleOptions {
    pub fn from_talk(talk: &TalkSettings) -> Self {
        Self {
            max_width: talk.bubble_max_width,
            base: Duration::from_millis(talk.bubble_time_base_ms),
            per_char: Duration::from_millis(talk.bubble_time_per_char_ms),
            max: Duration::from_millis(talk.bubble_time_max_ms),
        }
    }

    /// `min(max, base + chars * per_char)`
    pub fn visible_for(&self, text: &str) -> Duration {
        let chars = u32::try_from(char_len(text)).unwrap_or(u32::MAX);
        self.base
            .saturating_add(self.per_char.saturating_mul(chars))
            .min(self.max)
    }
}

/// The bubble currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub text: String,
    pub role: Role,
    /// `None` while a reply is awaited: the bubble stays up until replaced.
    pub visible_for: Option<Duration>,
}

/// One bubble at a time; every `show` replaces the previous one.
pub struct BubbleSink<W: Write> {
    writer: W,
    options: BubbleOptions,
    labels: DisplayLabels,
    current: Option<Bubble>,
    busy: bool,
}

impl<W: Write> BubbleSink<W> {
    pub fn new(writer: W, options: BubbleOptions, labels: DisplayLabels) -> Self {
        Self {
            writer,
            options,
            labels,
            current: None,
            busy: false,
        }
    }

    pub fn current(&self) -> Option<&Bubble> {
        self.current.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

fn fold_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl<W: Write + Send> DisplaySink for BubbleSink<W> {
    fn show(&mut self, text: &str, role: Role) {
        let label = self.labels.for_role(role);
        let prefix = format!("({label}) ");
        let budget = self
            .options
            .max_width
            .saturating_sub(super::display_width(&prefix));
        let folded = truncate_display(&fold_lines(text), budget);
        let visible_for = (!self.busy).then(|| self.options.visible_for(&folded));
        if let Err(err) = writeln!(self.writer, "{prefix}{folded}").and_then(|()| self.writer.flush()) {
            log_debug(&format!("bubble: write failed: {err}"));
        }
        self.current = Some(Bubble {
            text: folded,
            role,
            visible_for,
        });
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        if busy {
            // The placeholder is shown just before the session goes busy.
            if let Some(bubble) = self.current.as_mut() {
                bubble.visible_for = None;
            }
        }
    }
}
