//! Deterministic model client driven by scripted steps, for tests and offline runs.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{ChatMessage, ModelClient};
use crate::lock::lock_or_recover;

#[derive(Debug, Clone)]
pub enum ScriptedStepKind {
    Reply(String),
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub delay: Duration,
    pub kind: ScriptedStepKind,
}

impl ScriptedStep {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            kind: ScriptedStepKind::Reply(text.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            kind: ScriptedStepKind::Fail(message.into()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Pops one step per call and records every request it receives.
/// An exhausted script answers with an error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModelClient {
    script: Arc<Mutex<VecDeque<ScriptedStep>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedModelClient {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push_step(&self, step: ScriptedStep) {
        lock_or_recover(&self.script, "scripted.script").push_back(step);
    }

    /// Every message list received so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        lock_or_recover(&self.requests, "scripted.requests").clone()
    }

    pub fn remaining_steps(&self) -> usize {
        lock_or_recover(&self.script, "scripted.script").len()
    }
}

impl ModelClient for ScriptedModelClient {
    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        lock_or_recover(&self.requests, "scripted.requests").push(messages.to_vec());
        let step = lock_or_recover(&self.script, "scripted.script").pop_front();
        let Some(step) = step else {
            return Err(anyhow!("scripted client has no steps left"));
        };
        if !step.delay.is_zero() {
            thread::sleep(step.delay);
        }
        match step.kind {
            ScriptedStepKind::Reply(text) => Ok(text),
            ScriptedStepKind::Fail(message) => Err(anyhow!(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_consumed_in_order_and_requests_recorded() {
        let client = ScriptedModelClient::new(vec![
            ScriptedStep::reply("one"),
            ScriptedStep::fail("two"),
        ]);
        let msg = [ChatMessage::user("q")];
        assert_eq!(client.chat(&msg).expect("first"), "one");
        assert!(client.chat(&msg).is_err());
        assert!(client.chat(&msg).is_err());
        assert_eq!(client.requests().len(), 3);
        assert_eq!(client.remaining_steps(), 0);
    }

    #[test]
    fn clones_share_script() {
        let client = ScriptedModelClient::default();
        let handle = client.clone();
        handle.push_step(ScriptedStep::reply("later"));
        assert_eq!(client.chat(&[]).expect("reply"), "later");
        assert_eq!(handle.requests().len(), 1);
    }
}
