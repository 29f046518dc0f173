//! JSON trace output for turn lifecycle events (dispatch, escalation, outcome).

use crate::config::AppConfig;
use crate::logging::logging_enabled;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub(crate) fn tracing_log_path() -> PathBuf {
    env::var("EDO_TALKER_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("edo_talker_trace.jsonl"))
}

fn init_tracing_once(config: &AppConfig, once: &OnceLock<()>) {
    if !logging_enabled(config) {
        return;
    }

    let _ = once.get_or_init(|| {
        let path = tracing_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Install the global JSON subscriber once, if logging is enabled.
pub fn init_tracing(config: &AppConfig) {
    init_tracing_once(config, &TRACING_INIT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn unique_trace_path(suffix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after epoch")
            .as_nanos();
        env::temp_dir().join(format!("edo-talker-trace-{suffix}-{nanos}.jsonl"))
    }

    #[test]
    fn trace_path_prefers_env_override() {
        let _guard = env_lock().lock().expect("env lock");
        let path = unique_trace_path("env");
        unsafe {
            env::set_var("EDO_TALKER_TRACE_LOG", &path);
        }
        assert_eq!(tracing_log_path(), path);
        unsafe {
            env::remove_var("EDO_TALKER_TRACE_LOG");
        }
        assert_eq!(
            tracing_log_path(),
            env::temp_dir().join("edo_talker_trace.jsonl")
        );
    }

    #[test]
    fn disabled_logging_never_creates_trace_file() {
        let _guard = env_lock().lock().expect("env lock");
        let path = unique_trace_path("disabled");
        unsafe {
            env::set_var("EDO_TALKER_TRACE_LOG", &path);
        }
        let once = OnceLock::new();
        let cfg = AppConfig::parse_from(["telemetry-test", "--no-logs"]);
        init_tracing_once(&cfg, &once);
        assert!(!path.exists());
        unsafe {
            env::remove_var("EDO_TALKER_TRACE_LOG");
        }
        let _ = fs::remove_file(path);
    }
}
