//! End-to-end turns through the public API: session, workers, and a file-backed store.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use edo_talker::config::{CoreConfig, MemoryLimits};
use edo_talker::display::CaptureSink;
use edo_talker::llm::scripted::{ScriptedModelClient, ScriptedStep};
use edo_talker::memory::{Backing, MemoryStore, Role, StoreOptions};
use edo_talker::{Session, SubmitStatus};

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_db(label: &str) -> (PathBuf, PathBuf) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "edo-talker-flow-{label}-{}-{nanos}-{seq}",
        std::process::id()
    ));
    let db = dir.join("edo.db");
    (dir, db)
}

fn open(db: &PathBuf, limits: MemoryLimits) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::open(&StoreOptions {
        path: db.clone(),
        legacy_json: None,
        limits,
    }))
}

fn pump(session: &mut Session) {
    let message = session
        .results_receiver()
        .recv_timeout(Duration::from_secs(5))
        .expect("worker result");
    session.handle_worker_message(message);
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn reply_learning_and_summary_survive_reopen() {
    let (dir, db) = temp_db("reopen");
    let limits = MemoryLimits::default();
    let config = CoreConfig {
        model_enabled: true,
        reply_language: None,
        learning_enabled: true,
        summarize_enabled: true,
        ..CoreConfig::default()
    };
    let client = ScriptedModelClient::new(vec![
        ScriptedStep::reply("よろしくね、アキ！"),
        ScriptedStep::reply("アキは猫が好き。"),
    ]);
    let sink = CaptureSink::new();
    let store = open(&db, limits);
    assert_eq!(store.backing(), &Backing::File(db.clone()));
    let mut session = Session::new(
        Arc::new(config),
        Arc::clone(&store),
        Some(Arc::new(client.clone())),
        Box::new(sink.clone()),
    );

    let status = session.submit("私の名前はアキです。私は猫が好き。", Instant::now());
    assert_eq!(status, SubmitStatus::Dispatched(1));
    pump(&mut session);
    assert_eq!(sink.last_shown().as_deref(), Some("よろしくね、アキ！"));
    assert!(wait_until(|| !store.get_summary().is_empty()));
    session.shutdown();
    drop(session);
    drop(store);

    let reopened = open(&db, limits);
    let snapshot = reopened.snapshot();
    assert_eq!(snapshot.conversation.len(), 2);
    assert_eq!(snapshot.conversation[0].role, Role::User);
    assert_eq!(snapshot.conversation[1].content, "よろしくね、アキ！");
    assert_eq!(snapshot.profile.name.as_deref(), Some("アキ"));
    assert_eq!(snapshot.summary, "アキは猫が好き。");
    assert_eq!(snapshot.facts.len(), 1);
    assert_eq!(snapshot.facts[0].text, "私は猫が好き");
    assert_eq!(snapshot.counters.get("ask_count"), Some(&1));
    // Second request is the summary, and it saw both turns.
    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1][1].content.contains("よろしくね、アキ！"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn rejected_and_dropped_submissions_leave_no_trace() {
    let (dir, db) = temp_db("gate");
    let store = open(&db, MemoryLimits::default());
    let config = CoreConfig {
        model_enabled: true,
        reply_language: None,
        learning_enabled: false,
        summarize_enabled: false,
        deny_list: vec!["password".to_string()],
        ..CoreConfig::default()
    };
    let slow = ScriptedStep::reply("ok").with_delay(Duration::from_millis(100));
    let sink = CaptureSink::new();
    let mut session = Session::new(
        Arc::new(config),
        Arc::clone(&store),
        Some(Arc::new(ScriptedModelClient::new(vec![slow]))),
        Box::new(sink.clone()),
    );

    let now = Instant::now();
    assert_eq!(session.submit("my PASSWORD is hunter2", now), SubmitStatus::Rejected);
    assert!(sink.last_shown().unwrap_or_default().contains("password"));
    assert!(store.recent_turns(10).is_empty());

    assert_eq!(session.submit("first", now), SubmitStatus::Dispatched(1));
    assert_eq!(session.submit("second", now), SubmitStatus::Dropped);
    pump(&mut session);

    let contents: Vec<String> = store
        .recent_turns(10)
        .into_iter()
        .map(|turn| turn.content)
        .collect();
    assert_eq!(contents, vec!["first".to_string(), "ok".to_string()]);
    assert_eq!(store.recent_queries(10).len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn disabled_model_still_records_the_user_turn() {
    let (dir, db) = temp_db("disabled");
    let store = open(&db, MemoryLimits::default());
    let config = CoreConfig {
        model_enabled: false,
        ..CoreConfig::default()
    };
    let disabled = config.messages.disabled.clone();
    let sink = CaptureSink::new();
    let mut session = Session::new(Arc::new(config), Arc::clone(&store), None, Box::new(sink.clone()));

    assert_eq!(session.submit("hi", Instant::now()), SubmitStatus::Dispatched(1));
    pump(&mut session);

    assert_eq!(sink.last_shown(), Some(disabled));
    let turns = store.recent_turns(10);
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::User);
    let _ = std::fs::remove_dir_all(&dir);
}
