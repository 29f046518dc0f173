//! Conversation turn orchestration.
//!
//! A [`Session`] lives on one control thread and owns the turn state and the
//! display sink. Model calls run on detached workers that hand their result
//! back over a bounded channel; only [`Session::handle_worker_message`] turns a
//! result into display and memory updates. At most one request is in flight.

mod control_loop;
mod escalation;
mod prompt;
mod sanitize;
mod worker;

use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::CoreConfig;
use crate::display::DisplaySink;
use crate::llm::ModelClient;
use crate::memory::{MemoryStore, Role};
use crate::safety::SafetyFilter;
use crate::{log_debug, log_debug_content};

pub use control_loop::{run_control_loop, ControlInput};
pub use escalation::{forced_failure_after, Escalation, EscalationStep};
pub use prompt::{build_messages, context_prefix};
pub use sanitize::{looks_internal_instruction, prepare_reply, sanitize_reply, PreparedReply};
pub use worker::{AskOutcome, WorkerMessage};

use worker::{spawn_ask_worker, spawn_post_turn, AskJob, PostTurnJob};

const RESULTS_CAPACITY: usize = 16;
pub const ASK_COUNTER: &str = "ask_count";

/// What `submit` did with an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Blank input; nothing happened.
    Empty,
    /// The safety gate matched; its reason was shown.
    Rejected,
    /// A request was already in flight; dropped without a trace.
    Dropped,
    /// The session is shutting down.
    Closed,
    /// Persisted and handed to a worker under this request id.
    Dispatched(u64),
}

struct InFlight {
    request_id: u64,
    user_text: String,
    escalation: Escalation,
}

enum TurnState {
    Idle,
    Awaiting(InFlight),
}

pub struct Session {
    config: Arc<CoreConfig>,
    store: Arc<MemoryStore>,
    client: Option<Arc<dyn ModelClient>>,
    safety: SafetyFilter,
    display: Box<dyn DisplaySink>,
    state: TurnState,
    last_request_id: u64,
    results_tx: Sender<WorkerMessage>,
    results_rx: Receiver<WorkerMessage>,
    accepting: Arc<AtomicBool>,
}

impl Session {
    pub fn new(
        config: Arc<CoreConfig>,
        store: Arc<MemoryStore>,
        client: Option<Arc<dyn ModelClient>>,
        display: Box<dyn DisplaySink>,
    ) -> Self {
        let (results_tx, results_rx) = crossbeam_channel::bounded(RESULTS_CAPACITY);
        let safety = SafetyFilter::new(&config.deny_list, &config.rejection_template);
        Self {
            config,
            store,
            client,
            safety,
            display,
            state: TurnState::Idle,
            last_request_id: 0,
            results_tx,
            results_rx,
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn config(&self) -> &Arc<CoreConfig> {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Worker results; drained only by the control context.
    pub fn results_receiver(&self) -> Receiver<WorkerMessage> {
        self.results_rx.clone()
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, TurnState::Awaiting(_))
    }

    pub fn in_flight_request(&self) -> Option<u64> {
        match &self.state {
            TurnState::Awaiting(in_flight) => Some(in_flight.request_id),
            TurnState::Idle => None,
        }
    }

    /// When `poll_timeout` next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            TurnState::Awaiting(in_flight) => in_flight.escalation.next_deadline(),
            TurnState::Idle => None,
        }
    }

    /// Accept one utterance. Never blocks on the network and never fails.
    pub fn submit(&mut self, text: &str, now: Instant) -> SubmitStatus {
        let text = text.trim();
        if text.is_empty() {
            return SubmitStatus::Empty;
        }
        if !self.accepting.load(Ordering::SeqCst) {
            return SubmitStatus::Closed;
        }

        let verdict = self.safety.check(text);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or_default();
            tracing::info!("submission rejected by safety filter");
            self.display.show(&reason, Role::Assistant);
            return SubmitStatus::Rejected;
        }

        if let TurnState::Awaiting(in_flight) = &self.state {
            log_debug(&format!(
                "submit dropped: request {} still in flight",
                in_flight.request_id
            ));
            return SubmitStatus::Dropped;
        }

        // Context is read before the new turn lands so it is not sent twice.
        let history = self.store.recent_turns(self.config.context_turns);
        let summary = self.store.get_summary();
        let prefix = context_prefix(&self.config.context, &chrono::Local::now());
        let messages = build_messages(&self.config, &summary, &history, text, prefix.as_deref());

        self.store.append_turn(Role::User, text);
        self.store.append_query(text);
        self.store.inc_counter(ASK_COUNTER, 1);

        self.last_request_id += 1;
        let request_id = self.last_request_id;
        self.state = TurnState::Awaiting(InFlight {
            request_id,
            user_text: text.to_string(),
            escalation: Escalation::new(
                now,
                self.config.answer_timeout,
                self.config.answer_max_wait,
            ),
        });
        self.display.show(&self.config.messages.pending, Role::Assistant);
        self.display.set_busy(true);
        log_debug_content(&format!("submit {request_id}: {text}"));
        tracing::info!(request_id, messages = messages.len(), "turn dispatched");

        let immediate = match (&self.client, self.config.model_enabled) {
            (_, false) => Some(AskOutcome::Disabled),
            (None, true) => Some(AskOutcome::Unavailable),
            (Some(client), true) => {
                let job = AskJob {
                    request_id,
                    messages,
                    client: Arc::clone(client),
                    reply_language: self.config.reply_language,
                };
                match spawn_ask_worker(job, self.results_tx.clone()) {
                    Ok(()) => None,
                    Err(err) => {
                        log_debug(&format!("ask {request_id}: worker failed to start: {err}"));
                        Some(AskOutcome::Unavailable)
                    }
                }
            }
        };
        if let Some(outcome) = immediate {
            let message = WorkerMessage::Ask {
                request_id,
                outcome,
            };
            if let Err(err) = self.results_tx.try_send(message) {
                self.handle_worker_message(err.into_inner());
            }
        }
        SubmitStatus::Dispatched(request_id)
    }

    /// Apply one worker result. Results for anything but the in-flight request
    /// are stale and ignored.
    pub fn handle_worker_message(&mut self, message: WorkerMessage) {
        let WorkerMessage::Ask {
            request_id,
            outcome,
        } = message;
        let in_flight = match std::mem::replace(&mut self.state, TurnState::Idle) {
            TurnState::Awaiting(in_flight) if in_flight.request_id == request_id => in_flight,
            other => {
                self.state = other;
                log_debug(&format!("ask {request_id}: stale result ignored"));
                tracing::debug!(request_id, "stale worker result discarded");
                return;
            }
        };
        self.display.set_busy(false);
        self.finish_turn(in_flight, outcome);
    }

    fn finish_turn(&mut self, in_flight: InFlight, outcome: AskOutcome) {
        let request_id = in_flight.request_id;
        match outcome {
            AskOutcome::Disabled => {
                tracing::info!(request_id, outcome = "disabled", "turn finished");
                self.display
                    .show(&self.config.messages.disabled, Role::Assistant);
            }
            AskOutcome::Unavailable => {
                tracing::info!(request_id, outcome = "unavailable", "turn finished");
                self.display
                    .show(&self.config.messages.unavailable, Role::Assistant);
            }
            AskOutcome::Reply(raw) => {
                let prepared = prepare_reply(
                    &raw,
                    self.config.answer_max_chars,
                    &self.config.messages.unknown_reply,
                );
                match prepared {
                    PreparedReply::Suppressed(text) => {
                        tracing::warn!(request_id, "reply looked like an internal instruction");
                        log_debug_content(&format!("ask {request_id}: suppressed echo: {raw}"));
                        self.display.show(&text, Role::Assistant);
                    }
                    PreparedReply::Keep(text) => {
                        tracing::info!(request_id, outcome = "reply", "turn finished");
                        self.store.append_turn(Role::Assistant, &text);
                        self.display.show(&text, Role::Assistant);
                        self.start_post_turn(in_flight.user_text);
                    }
                }
            }
        }
    }

    fn start_post_turn(&self, user_text: String) {
        if !self.config.learning_enabled && !self.config.summarize_enabled {
            return;
        }
        if !self.accepting.load(Ordering::SeqCst) {
            return;
        }
        spawn_post_turn(
            PostTurnJob {
                store: Arc::clone(&self.store),
                client: self.client.clone(),
                config: Arc::clone(&self.config),
                user_text,
            },
            Arc::clone(&self.accepting),
        );
    }

    /// Drive escalation. Call whenever `now` may have passed `next_deadline`.
    pub fn poll_timeout(&mut self, now: Instant) {
        loop {
            let TurnState::Awaiting(in_flight) = &mut self.state else {
                return;
            };
            if !in_flight.escalation.is_due(now) {
                return;
            }
            let request_id = in_flight.request_id;
            match in_flight.escalation.on_expiry() {
                EscalationStep::Extend => {
                    tracing::info!(
                        request_id,
                        waited_ms = in_flight.escalation.elapsed().as_millis() as u64,
                        "still waiting for reply"
                    );
                    self.display
                        .show(&self.config.messages.pending, Role::Assistant);
                }
                EscalationStep::Fail => {
                    log_debug(&format!("ask {request_id}: gave up waiting"));
                    if let TurnState::Awaiting(in_flight) =
                        std::mem::replace(&mut self.state, TurnState::Idle)
                    {
                        self.display.set_busy(false);
                        self.finish_turn(in_flight, AskOutcome::Unavailable);
                    }
                    return;
                }
            }
        }
    }

    /// Swap in a reloaded snapshot. An in-flight request keeps its own timing.
    pub fn apply_config(&mut self, config: Arc<CoreConfig>) {
        self.store.set_limits(config.limits);
        self.safety = SafetyFilter::new(&config.deny_list, &config.rejection_template);
        self.config = config;
        log_debug("session: configuration reloaded");
    }

    pub fn set_client(&mut self, client: Option<Arc<dyn ModelClient>>) {
        self.client = client;
    }

    /// Render the memory snapshot through the display sink.
    pub fn show_snapshot(&mut self) {
        let snapshot = self.store.snapshot();
        let text = serde_json::to_string_pretty(&snapshot)
            .unwrap_or_else(|err| format!("snapshot unavailable: {err}"));
        self.display.show(&text, Role::System);
    }

    /// Explicitly overwrite the stored user name.
    pub fn set_user_name(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.store.set_user_name(name);
        self.display.show(&format!("profile.name = {name}"), Role::System);
    }

    /// Stop accepting work. Detached workers are left to finish on their own.
    pub fn shutdown(&mut self) {
        self.accepting.store(false, Ordering::SeqCst);
        if let Some(request_id) = self.in_flight_request() {
            log_debug(&format!("shutdown with request {request_id} in flight"));
        }
    }
}
