//! Stdin reader thread so line input never blocks the control loop.

use crossbeam_channel::Sender;
use std::io::{self, BufRead, Write};
use std::thread;

use edo_talker::{log_debug, ControlInput};

use crate::commands::{parse_line, Command, HELP_TEXT};
use crate::runtime::SettingsSource;

/// Translate one parsed line into control inputs. `false` means stop reading.
fn forward(command: Command, source: &SettingsSource, tx: &Sender<ControlInput>) -> bool {
    let input = match command {
        Command::Say(text) => ControlInput::Submit(text),
        Command::Quit => {
            let _ = tx.send(ControlInput::Shutdown);
            return false;
        }
        Command::Reload => {
            let (config, client) = source.reload();
            ControlInput::Reload { config, client }
        }
        Command::Snapshot => ControlInput::ShowSnapshot,
        Command::Name(name) => ControlInput::SetUserName(name),
        Command::Help => {
            let _ = writeln!(io::stderr(), "{HELP_TEXT}");
            return true;
        }
        Command::Unknown(raw) => {
            let _ = writeln!(io::stderr(), "unknown command: {raw} ({HELP_TEXT})");
            return true;
        }
    };
    tx.send(input).is_ok()
}

pub(crate) fn spawn_input_thread(
    tx: Sender<ControlInput>,
    source: SettingsSource,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    log_debug(&format!("stdin read error: {err}"));
                    break;
                }
            };
            if !forward(parse_line(&line), &source, &tx) {
                return;
            }
        }
        // EOF ends the session the same way /quit does.
        let _ = tx.send(ControlInput::Shutdown);
    })
}
