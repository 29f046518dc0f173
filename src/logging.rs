//! Plain-text debug log for diagnosing turns without touching the display.
//!
//! Lines are tagged with the writing thread (`edo-ask-7`, `edo-post-turn`, ...)
//! so a worker's output can be told apart from the control loop's. When the
//! file passes its cap it is moved to `<name>.1` and a fresh file is started.

use crate::config::AppConfig;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

const LOG_PATH_ENV: &str = "EDO_TALKER_LOG";
const LOG_CAP_BYTES: u64 = 4 * 1024 * 1024;

/// How much the debug log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub(crate) enum LogLevel {
    Off = 0,
    /// Turn bookkeeping only.
    Events = 1,
    /// Also utterances and replies.
    Content = 2,
}

impl LogLevel {
    pub(crate) fn from_flags(config: &AppConfig) -> Self {
        match (logging_enabled(config), config.log_content) {
            (false, _) => Self::Off,
            (true, false) => Self::Events,
            (true, true) => Self::Content,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            2 => Self::Content,
            1 => Self::Events,
            _ => Self::Off,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Off as u8);
static SINK: OnceLock<Mutex<Option<RotatingFile>>> = OnceLock::new();

/// Debug log location; `EDO_TALKER_LOG` overrides the temp-dir default.
pub fn log_file_path() -> PathBuf {
    env::var(LOG_PATH_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("edo_talker.log"))
}

fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".1");
    path.with_file_name(name)
}

struct RotatingFile {
    path: PathBuf,
    file: File,
    cap: u64,
    len: u64,
}

impl RotatingFile {
    fn open(path: PathBuf, cap: u64) -> Option<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
        let len = file.metadata().map(|meta| meta.len()).unwrap_or(0);
        let mut sink = Self { path, file, cap, len };
        if sink.len > sink.cap {
            sink.rotate();
        }
        Some(sink)
    }

    /// Keep one previous generation; losing the log is better than failing a turn.
    fn rotate(&mut self) {
        let _ = fs::rename(&self.path, rotated_path(&self.path));
        if let Ok(file) = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
        {
            self.file = file;
            self.len = 0;
        }
    }

    fn append(&mut self, line: &str) {
        let incoming = line.len() as u64;
        if self.len > 0 && self.len.saturating_add(incoming) > self.cap {
            self.rotate();
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.len = self.len.saturating_add(incoming);
        }
    }
}

fn sink() -> &'static Mutex<Option<RotatingFile>> {
    SINK.get_or_init(|| Mutex::new(None))
}

fn level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

#[inline]
pub(crate) fn logging_enabled(config: &AppConfig) -> bool {
    config.logs && !config.no_logs
}

/// Configure the debug log from CLI flags. Safe to call again on reload.
pub fn init_logging(config: &AppConfig) {
    let level = LogLevel::from_flags(config);
    let opened = match level {
        LogLevel::Off => None,
        _ => RotatingFile::open(log_file_path(), LOG_CAP_BYTES),
    };
    // The log cannot report its own poisoning, so take the guard back quietly.
    *sink().lock().unwrap_or_else(PoisonError::into_inner) = opened;
    LEVEL.store(level as u8, Ordering::Relaxed);
}

fn format_line(msg: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let current = thread::current();
    let name = current.name().unwrap_or("unnamed");
    format!("[{secs}] [{name}] {msg}\n")
}

fn write_at(min: LogLevel, msg: &str) {
    if level() < min {
        return;
    }
    let line = format_line(msg);
    if let Some(file) = sink().lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
        file.append(&line);
    }
}

/// Record a turn event when `--logs` is on.
pub fn log_debug(msg: &str) {
    write_at(LogLevel::Events, msg);
}

/// Record text that may quote the user or the model; needs `--log-content` too.
pub fn log_debug_content(msg: &str) {
    write_at(LogLevel::Content, msg);
}
