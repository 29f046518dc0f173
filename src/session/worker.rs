//! Detached worker threads. Ask workers report back over the results channel;
//! post-turn workers (learning, summary) report nothing.

use crossbeam_channel::Sender;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config::{CoreConfig, ReplyLanguage};
use crate::learning::learn_from_utterance;
use crate::llm::{translate_if_needed, ChatMessage, ModelClient};
use crate::log_debug;
use crate::memory::MemoryStore;
use crate::summarizer::refresh_summary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    Reply(String),
    Disabled,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    Ask { request_id: u64, outcome: AskOutcome },
}

pub(crate) struct AskJob {
    pub request_id: u64,
    pub messages: Vec<ChatMessage>,
    pub client: Arc<dyn ModelClient>,
    pub reply_language: Option<ReplyLanguage>,
}

pub(crate) fn run_ask(job: &AskJob) -> AskOutcome {
    match job.client.chat(&job.messages) {
        Ok(text) if !text.trim().is_empty() => AskOutcome::Reply(translate_if_needed(
            job.client.as_ref(),
            &text,
            job.reply_language,
        )),
        Ok(_) => {
            log_debug(&format!("ask {}: empty reply", job.request_id));
            AskOutcome::Unavailable
        }
        Err(err) => {
            log_debug(&format!("ask {}: {err:#}", job.request_id));
            AskOutcome::Unavailable
        }
    }
}

pub(crate) fn spawn_ask_worker(job: AskJob, results: Sender<WorkerMessage>) -> io::Result<()> {
    thread::Builder::new()
        .name(format!("edo-ask-{}", job.request_id))
        .spawn(move || {
            let outcome = run_ask(&job);
            let message = WorkerMessage::Ask {
                request_id: job.request_id,
                outcome,
            };
            if results.send(message).is_err() {
                log_debug(&format!(
                    "ask {}: session gone; dropping result",
                    job.request_id
                ));
            }
        })
        .map(|_| ())
}

pub(crate) struct PostTurnJob {
    pub store: Arc<MemoryStore>,
    pub client: Option<Arc<dyn ModelClient>>,
    pub config: Arc<CoreConfig>,
    pub user_text: String,
}

pub(crate) fn run_post_turn(job: &PostTurnJob, accepting: &AtomicBool) {
    if !accepting.load(Ordering::SeqCst) {
        return;
    }
    if job.config.learning_enabled {
        learn_from_utterance(&job.store, &job.user_text);
    }
    if job.config.summarize_enabled && accepting.load(Ordering::SeqCst) {
        refresh_summary(&job.store, job.client.as_deref(), &job.config);
    }
}

/// Fire-and-forget; the handle is dropped so the thread is never joined.
pub(crate) fn spawn_post_turn(job: PostTurnJob, accepting: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("edo-post-turn".to_string())
        .spawn(move || run_post_turn(&job, &accepting));
    if let Err(err) = spawned {
        log_debug(&format!("post-turn worker failed to start: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryLimits;
    use crate::llm::scripted::{ScriptedModelClient, ScriptedStep};
    use crate::memory::Role;

    fn job(client: ScriptedModelClient, language: Option<ReplyLanguage>) -> AskJob {
        AskJob {
            request_id: 7,
            messages: vec![ChatMessage::user("hi")],
            client: Arc::new(client),
            reply_language: language,
        }
    }

    #[test]
    fn reply_is_translated_on_worker() {
        let client = ScriptedModelClient::new(vec![
            ScriptedStep::reply("Hello"),
            ScriptedStep::reply("こんにちは"),
        ]);
        let outcome = run_ask(&job(client, Some(ReplyLanguage::Japanese)));
        assert_eq!(outcome, AskOutcome::Reply("こんにちは".to_string()));
    }

    #[test]
    fn failure_and_blank_map_to_unavailable() {
        let failing = ScriptedModelClient::new(vec![ScriptedStep::fail("down")]);
        assert_eq!(run_ask(&job(failing, None)), AskOutcome::Unavailable);
        let blank = ScriptedModelClient::new(vec![ScriptedStep::reply("  ")]);
        assert_eq!(run_ask(&job(blank, None)), AskOutcome::Unavailable);
    }

    #[test]
    fn spawned_worker_delivers_through_channel() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let client = ScriptedModelClient::new(vec![ScriptedStep::reply("ok")]);
        spawn_ask_worker(job(client, None), tx).expect("spawn");
        let message = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("result");
        assert_eq!(
            message,
            WorkerMessage::Ask {
                request_id: 7,
                outcome: AskOutcome::Reply("ok".to_string())
            }
        );
    }

    #[test]
    fn post_turn_respects_shutdown_gate() {
        let store = Arc::new(MemoryStore::in_memory(MemoryLimits::default()));
        store.append_turn(Role::User, "私は猫が好き");
        let job = PostTurnJob {
            store: Arc::clone(&store),
            client: None,
            config: Arc::new(CoreConfig::default()),
            user_text: "私は猫が好き".to_string(),
        };
        run_post_turn(&job, &AtomicBool::new(false));
        assert!(store.recent_facts(5).is_empty());
        assert_eq!(store.get_summary(), "");

        run_post_turn(&job, &AtomicBool::new(true));
        assert_eq!(store.recent_facts(5).len(), 1);
        assert!(store.get_summary().contains("私は猫が好き"));
    }
}
