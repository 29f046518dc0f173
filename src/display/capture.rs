use std::sync::{Arc, Mutex};

use super::DisplaySink;
use crate::lock::lock_or_recover;
use crate::memory::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Show { text: String, role: Role },
    Busy(bool),
}

/// Records every call; clones share the same event log.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    events: Arc<Mutex<Vec<DisplayEvent>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DisplayEvent> {
        lock_or_recover(&self.events, "capture.events").clone()
    }

    pub fn shown(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Show { text, .. } => Some(text),
                DisplayEvent::Busy(_) => None,
            })
            .collect()
    }

    pub fn last_shown(&self) -> Option<String> {
        self.shown().pop()
    }

    /// Busy state after the most recent `set_busy`; false if never called.
    pub fn is_busy(&self) -> bool {
        self.events()
            .iter()
            .rev()
            .find_map(|event| match event {
                DisplayEvent::Busy(busy) => Some(*busy),
                DisplayEvent::Show { .. } => None,
            })
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.events, "capture.events").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DisplaySink for CaptureSink {
    fn show(&mut self, text: &str, role: Role) {
        lock_or_recover(&self.events, "capture.events").push(DisplayEvent::Show {
            text: text.to_string(),
            role,
        });
    }

    fn set_busy(&mut self, busy: bool) {
        lock_or_recover(&self.events, "capture.events").push(DisplayEvent::Busy(busy));
    }
}
