//! Edo talker entrypoint: a line-oriented front end for the conversation core.
//!
//! # Architecture
//!
//! - Input thread: reads stdin lines and turns slash commands into control inputs
//! - Control loop: owns the session, drains worker results, drives escalation
//! - Ask workers: one detached thread per model request
//! - Post-turn workers: learning and summary refresh after each reply

mod commands;
mod dump;
mod input;
mod runtime;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::bounded;
use std::io::{self, Write};
use std::sync::Arc;

use edo_talker::config::{AppConfig, CoreConfig, Settings};
use edo_talker::display::{sink_for_mode, DisplayMode};
use edo_talker::memory::{MemoryStore, StoreOptions};
use edo_talker::{init_logging, init_tracing, log_debug, log_file_path, run_control_loop, Session};

use crate::input::spawn_input_thread;
use crate::runtime::{build_client, SettingsSource};

const INPUT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Parser)]
#[command(about = "Edo desktop companion talker", author, version)]
struct Cli {
    #[command(flatten)]
    app: AppConfig,

    /// Print the memory snapshot as JSON and exit
    #[arg(long = "dump-memory", default_value_t = false)]
    dump_memory: bool,

    /// Print table sizes and the newest rows, then exit
    #[arg(long = "dump-db", default_value_t = false)]
    dump_db: bool,

    /// Print the default settings file and exit
    #[arg(long = "print-default-config", default_value_t = false)]
    print_default_config: bool,
}

fn open_store(settings: &Settings, config: &CoreConfig) -> MemoryStore {
    let options = StoreOptions {
        path: settings.database_path(),
        legacy_json: Some(settings.legacy_json_path()),
        limits: config.limits,
    };
    let store = MemoryStore::open(&options);
    store.seed_user_name(&settings.profile.user_name);
    store
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.print_default_config {
        print!("{}", Settings::default().to_toml_string()?);
        return Ok(());
    }

    init_logging(&cli.app);
    init_tracing(&cli.app);
    log_debug(&format!(
        "edo-talker {} starting (log: {})",
        env!("CARGO_PKG_VERSION"),
        log_file_path().display()
    ));

    let source = SettingsSource::new(&cli.app);
    let settings = source.load();
    let config = Arc::new(CoreConfig::from_settings(&settings));
    let store = Arc::new(open_store(&settings, &config));

    let mut stdout = io::stdout();
    if cli.dump_memory {
        dump::write_snapshot(&store, &mut stdout)?;
        return Ok(());
    }
    if cli.dump_db {
        dump::write_db_overview(&store, &mut stdout)?;
        return Ok(());
    }

    let client = build_client(&settings);
    let mode = DisplayMode::from_chat_mode(config.chat_mode);
    let history = match mode {
        DisplayMode::Panel => store.recent_turns(config.context_turns.saturating_mul(2)),
        DisplayMode::Bubble => Vec::new(),
    };
    let display = sink_for_mode(mode, &settings.talk, io::stdout(), &history);
    tracing::info!(
        model_enabled = config.model_enabled,
        client = client.is_some(),
        mode = ?mode,
        "talker ready"
    );

    let mut session = Session::new(config, store, client, display);
    let (input_tx, input_rx) = bounded(INPUT_CHANNEL_CAPACITY);
    // Not joined: the reader may be parked on stdin when the loop exits.
    let _input_thread = spawn_input_thread(input_tx, source);
    run_control_loop(&mut session, &input_rx);

    stdout.flush()?;
    log_debug("edo-talker exiting");
    Ok(())
}
