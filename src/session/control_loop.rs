//! The single control loop: user input, worker results, and escalation ticks.

use crossbeam_channel::{select, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Session;
use crate::config::CoreConfig;
use crate::llm::ModelClient;
use crate::log_debug;

/// Upper bound on how long the loop sleeps with nothing scheduled.
const IDLE_WAIT_MS: u64 = 250;

pub enum ControlInput {
    Submit(String),
    Reload {
        config: Arc<CoreConfig>,
        client: Option<Arc<dyn ModelClient>>,
    },
    ShowSnapshot,
    SetUserName(String),
    Shutdown,
}

fn select_timeout(session: &Session, now: Instant) -> Duration {
    let idle = Duration::from_millis(IDLE_WAIT_MS);
    session
        .next_deadline()
        .map(|deadline| deadline.saturating_duration_since(now).min(idle))
        .unwrap_or(idle)
}

fn handle_input(session: &mut Session, input: ControlInput, running: &mut bool) {
    match input {
        ControlInput::Submit(text) => {
            let status = session.submit(&text, Instant::now());
            log_debug(&format!("submit -> {status:?}"));
        }
        ControlInput::Reload { config, client } => {
            session.apply_config(config);
            session.set_client(client);
        }
        ControlInput::ShowSnapshot => session.show_snapshot(),
        ControlInput::SetUserName(name) => session.set_user_name(&name),
        ControlInput::Shutdown => *running = false,
    }
}

/// Run until `Shutdown` arrives or every input sender is gone.
pub fn run_control_loop(session: &mut Session, inputs: &Receiver<ControlInput>) {
    let results = session.results_receiver();
    let mut running = true;
    while running {
        session.poll_timeout(Instant::now());
        let timeout = select_timeout(session, Instant::now());
        select! {
            recv(inputs) -> input => {
                match input {
                    Ok(input) => handle_input(session, input, &mut running),
                    Err(_) => running = false,
                }
            }
            recv(results) -> message => {
                if let Ok(message) = message {
                    session.handle_worker_message(message);
                }
            }
            default(timeout) => {}
        }
    }
    // Results that already arrived still get shown before exit.
    while let Ok(message) = results.try_recv() {
        session.handle_worker_message(message);
    }
    session.shutdown();
}
