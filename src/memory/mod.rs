//! Durable, bounded conversation memory backed by SQLite.
//!
//! Every public operation is total: storage errors are logged and the call
//! degrades to a no-op or an empty result. One mutex serializes all access so
//! the interactive path and the post-turn workers never interleave inside a
//! single call.

mod legacy;
mod schema;
mod types;

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::MemoryLimits;
use crate::lock::lock_or_recover;
use crate::log_debug;
use crate::text::truncate_with_ellipsis;

pub use types::{
    ConversationTurn, Fact, LimitsView, MemorySnapshot, ProfileView, Query, Role, SensorReading,
};

/// Where the store ended up after opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    File(PathBuf),
    /// The file could not be used; state lives only for this process.
    Memory,
    /// Not even an in-memory database could be opened; every call is a no-op.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub path: PathBuf,
    pub legacy_json: Option<PathBuf>,
    pub limits: MemoryLimits,
}

struct Inner {
    conn: Option<Connection>,
    limits: MemoryLimits,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    backing: Backing,
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

fn now_fractional() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(schema::SCHEMA_SQL)?;
    conn.query_row("SELECT COUNT(*) FROM conversation", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(())
}

fn open_file(path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    conn.execute_batch(schema::PRAGMAS)
        .context("failed to apply pragmas")?;
    init_schema(&conn).context("failed to initialize schema")?;
    Ok(conn)
}

fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    init_schema(&conn).context("failed to initialize schema")?;
    Ok(conn)
}

/// Move an unreadable database (and its WAL companions) out of the way.
fn quarantine(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let target = path.with_file_name(format!("{file_name}.corrupt-{}", now_secs()));
    fs::rename(path, &target).ok()?;
    for suffix in ["-wal", "-shm"] {
        let _ = fs::remove_file(path.with_file_name(format!("{file_name}{suffix}")));
    }
    Some(target)
}

fn open_durable(path: &Path) -> (Option<Connection>, Backing) {
    let first_err = match open_file(path) {
        Ok(conn) => return (Some(conn), Backing::File(path.to_path_buf())),
        Err(err) => err,
    };
    log_debug(&format!("memory: {first_err:#}"));
    tracing::warn!(path = %path.display(), error = %format!("{first_err:#}"), "memory store unreadable");

    if path.exists() {
        if let Some(moved) = quarantine(path) {
            log_debug(&format!(
                "memory: moved unreadable database to {}",
                moved.display()
            ));
            match open_file(path) {
                Ok(conn) => return (Some(conn), Backing::File(path.to_path_buf())),
                Err(err) => log_debug(&format!("memory: reopen failed: {err:#}")),
            }
        }
    }

    match open_in_memory() {
        Ok(conn) => {
            log_debug("memory: falling back to in-memory store");
            (Some(conn), Backing::Memory)
        }
        Err(err) => {
            log_debug(&format!("memory: {err:#}; store disabled"));
            (None, Backing::Unavailable)
        }
    }
}

fn trim_turns(conn: &Connection, max_history: usize) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM conversation WHERE id NOT IN \
         (SELECT id FROM conversation ORDER BY id DESC LIMIT ?1)",
        params![sql_limit(max_history)],
    )?;
    Ok(())
}

fn trim_queries(conn: &Connection, max_history: usize) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM queries WHERE id NOT IN \
         (SELECT id FROM queries ORDER BY id DESC LIMIT ?1)",
        params![sql_limit(max_history)],
    )?;
    Ok(())
}

/// Keep the top `max_facts` by (count desc, last_seen desc); newer ids win ties.
fn evict_facts(conn: &Connection, max_facts: usize) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM facts WHERE id NOT IN \
         (SELECT id FROM facts ORDER BY count DESC, last_seen DESC, id DESC LIMIT ?1)",
        params![sql_limit(max_facts)],
    )?;
    Ok(())
}

fn read_summary(conn: &Connection) -> rusqlite::Result<String> {
    Ok(conn
        .query_row("SELECT text FROM summary WHERE id = 1", [], |row| {
            row.get::<_, String>(0)
        })
        .optional()?
        .unwrap_or_default())
}

fn write_summary(conn: &Connection, text: &str, max_chars: usize) -> rusqlite::Result<()> {
    let bounded = truncate_with_ellipsis(text, max_chars);
    conn.execute(
        "INSERT OR REPLACE INTO summary(id, text) VALUES (1, ?1)",
        params![bounded],
    )?;
    Ok(())
}

fn enforce_limits(conn: &mut Connection, limits: MemoryLimits) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    trim_turns(&tx, limits.max_history)?;
    trim_queries(&tx, limits.max_history)?;
    evict_facts(&tx, limits.max_facts)?;
    let summary = read_summary(&tx)?;
    if crate::text::char_len(&summary) > limits.max_summary_chars {
        write_summary(&tx, &summary, limits.max_summary_chars)?;
    }
    tx.commit()
}

fn read_recent_turns(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<ConversationTurn>> {
    let mut stmt = conn.prepare(
        "SELECT role, content, ts FROM \
         (SELECT id, role, content, ts FROM conversation ORDER BY id DESC LIMIT ?1) \
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![sql_limit(limit)], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    let mut turns = Vec::new();
    for row in rows {
        let (role, content, timestamp) = row?;
        match Role::parse(&role) {
            Some(role) => turns.push(ConversationTurn {
                role,
                content,
                timestamp,
            }),
            None => log_debug(&format!("memory: skipping turn with unknown role {role:?}")),
        }
    }
    Ok(turns)
}

fn read_recent_queries(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<Query>> {
    let mut stmt = conn.prepare(
        "SELECT text, ts FROM \
         (SELECT id, text, ts FROM queries ORDER BY id DESC LIMIT ?1) \
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![sql_limit(limit)], |row| {
        Ok(Query {
            text: row.get(0)?,
            timestamp: row.get(1)?,
        })
    })?;
    rows.collect()
}

fn read_recent_facts(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<Fact>> {
    let mut stmt = conn.prepare(
        "SELECT text, count, first_seen, last_seen FROM facts \
         ORDER BY count DESC, last_seen DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![sql_limit(limit)], |row| {
        Ok(Fact {
            text: row.get(0)?,
            count: row.get(1)?,
            first_seen: row.get(2)?,
            last_seen: row.get(3)?,
        })
    })?;
    rows.collect()
}

fn read_user_name(conn: &Connection) -> rusqlite::Result<Option<String>> {
    let name = conn
        .query_row("SELECT name FROM profile WHERE id = 1", [], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?
        .flatten();
    Ok(name.filter(|n| !n.trim().is_empty()))
}

fn read_counters(conn: &Connection) -> rusqlite::Result<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT key, value FROM counters ORDER BY key")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    rows.collect()
}

impl MemoryStore {
    /// Open (or create) the database at `options.path`, recovering from corruption.
    pub fn open(options: &StoreOptions) -> Self {
        let (conn, backing) = open_durable(&options.path);
        let store = Self {
            inner: Mutex::new(Inner {
                conn,
                limits: options.limits,
            }),
            backing,
        };
        if let Some(legacy_path) = options.legacy_json.as_deref() {
            store.import_legacy_if_empty(legacy_path);
        }
        store.with_conn("enforce_limits", (), |conn, limits| {
            enforce_limits(conn, limits)
        });
        tracing::info!(backing = ?store.backing, "memory store ready");
        store
    }

    /// Fresh store that lives only as long as this value.
    pub fn in_memory(limits: MemoryLimits) -> Self {
        let (conn, backing) = match open_in_memory() {
            Ok(conn) => (Some(conn), Backing::Memory),
            Err(err) => {
                log_debug(&format!("memory: {err:#}; store disabled"));
                (None, Backing::Unavailable)
            }
        };
        Self {
            inner: Mutex::new(Inner { conn, limits }),
            backing,
        }
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    pub fn limits(&self) -> MemoryLimits {
        lock_or_recover(&self.inner, "memory.inner").limits
    }

    /// Swap in new bounds and apply them immediately.
    pub fn set_limits(&self, limits: MemoryLimits) {
        lock_or_recover(&self.inner, "memory.inner").limits = limits;
        self.with_conn("set_limits", (), |conn, limits| enforce_limits(conn, limits));
    }

    fn with_conn<T>(
        &self,
        op: &'static str,
        fallback: T,
        f: impl FnOnce(&mut Connection, MemoryLimits) -> rusqlite::Result<T>,
    ) -> T {
        let mut inner = lock_or_recover(&self.inner, "memory.inner");
        let limits = inner.limits;
        let Some(conn) = inner.conn.as_mut() else {
            return fallback;
        };
        match f(conn, limits) {
            Ok(value) => value,
            Err(err) => {
                log_debug(&format!("memory: {op} failed: {err}"));
                tracing::warn!(op, error = %err, "memory operation failed");
                fallback
            }
        }
    }

    fn import_legacy_if_empty(&self, legacy_path: &Path) {
        if !legacy_path.exists() {
            return;
        }
        let empty = self.with_conn("legacy_probe", false, |conn, _| {
            conn.query_row("SELECT COUNT(*) FROM conversation", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count == 0)
        });
        if !empty {
            return;
        }
        let Some(legacy) = legacy::read_legacy(legacy_path) else {
            return;
        };
        let imported = self.with_conn("legacy_import", false, |conn, _| {
            let tx = conn.transaction()?;
            legacy::import(&tx, &legacy)?;
            tx.commit()?;
            Ok(true)
        });
        if imported {
            log_debug(&format!(
                "memory: imported legacy memory from {}",
                legacy_path.display()
            ));
        }
    }

    /// No-op on blank content; otherwise append and drop the oldest beyond `max_history`.
    pub fn append_turn(&self, role: Role, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        self.with_conn("append_turn", (), |conn, limits| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO conversation(ts, role, content) VALUES (?1, ?2, ?3)",
                params![now_secs(), role.as_str(), content],
            )?;
            trim_turns(&tx, limits.max_history)?;
            tx.commit()
        });
    }

    pub fn append_query(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.with_conn("append_query", (), |conn, limits| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO queries(ts, text) VALUES (?1, ?2)",
                params![now_secs(), text],
            )?;
            trim_queries(&tx, limits.max_history)?;
            tx.commit()
        });
    }

    pub fn get_summary(&self) -> String {
        self.with_conn("get_summary", String::new(), |conn, _| read_summary(conn))
    }

    /// Stores at most `max_summary_chars`; longer input is clipped with an ellipsis.
    pub fn set_summary(&self, text: &str) {
        self.with_conn("set_summary", (), |conn, limits| {
            write_summary(conn, text.trim(), limits.max_summary_chars)
        });
    }

    /// Exact-text upsert, then global eviction down to `max_facts`.
    pub fn upsert_fact(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.with_conn("upsert_fact", (), |conn, limits| {
            let now = now_fractional();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO facts(text, count, first_seen, last_seen) VALUES (?1, 1, ?2, ?2) \
                 ON CONFLICT(text) DO UPDATE SET count = count + 1, last_seen = excluded.last_seen",
                params![text, now],
            )?;
            evict_facts(&tx, limits.max_facts)?;
            tx.commit()
        });
    }

    pub fn get_user_name(&self) -> Option<String> {
        self.with_conn("get_user_name", None, |conn, _| read_user_name(conn))
    }

    /// Overwrite the stored name; blank input is ignored.
    pub fn set_user_name(&self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.with_conn("set_user_name", (), |conn, _| {
            conn.execute(
                "INSERT OR REPLACE INTO profile(id, name) VALUES (1, ?1)",
                params![name],
            )?;
            Ok(())
        });
    }

    /// Set the name only if none is stored yet.
    pub fn seed_user_name(&self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.with_conn("seed_user_name", (), |conn, _| {
            conn.execute(
                "INSERT INTO profile(id, name) VALUES (1, ?1) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name \
                 WHERE profile.name IS NULL OR trim(profile.name) = ''",
                params![name],
            )?;
            Ok(())
        });
    }

    pub fn inc_counter(&self, key: &str, delta: i64) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        self.with_conn("inc_counter", (), |conn, _| {
            conn.execute(
                "INSERT INTO counters(key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = value + excluded.value",
                params![key, delta],
            )?;
            Ok(())
        });
    }

    pub fn counter(&self, key: &str) -> i64 {
        self.with_conn("counter", 0, |conn, _| {
            Ok(conn
                .query_row(
                    "SELECT value FROM counters WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?
                .unwrap_or(0))
        })
    }

    /// The most recent `limit` turns, oldest first.
    pub fn recent_turns(&self, limit: usize) -> Vec<ConversationTurn> {
        self.with_conn("recent_turns", Vec::new(), |conn, _| {
            read_recent_turns(conn, limit)
        })
    }

    pub fn recent_queries(&self, limit: usize) -> Vec<Query> {
        self.with_conn("recent_queries", Vec::new(), |conn, _| {
            read_recent_queries(conn, limit)
        })
    }

    /// Facts ranked by count, then recency.
    pub fn recent_facts(&self, limit: usize) -> Vec<Fact> {
        self.with_conn("recent_facts", Vec::new(), |conn, _| {
            read_recent_facts(conn, limit)
        })
    }

    /// Entry point for host-side sensor bridges (room climate, motion) to log
    /// raw telemetry. The conversation core never reads it back, and the
    /// table is unbounded and left out of [`MemoryStore::snapshot`].
    pub fn append_sensor_reading(&self, reading: &SensorReading) {
        if reading.source.trim().is_empty() {
            return;
        }
        self.with_conn("append_sensor_reading", (), |conn, _| {
            conn.execute(
                "INSERT INTO sensor_readings(ts, source, device_id, device_name, temperature, \
                 humidity, illuminance, motion, event_time) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    now_secs(),
                    reading.source.trim(),
                    reading.device_id,
                    reading.device_name,
                    reading.temperature,
                    reading.humidity,
                    reading.illuminance,
                    reading.motion,
                    reading.event_time,
                ],
            )?;
            Ok(())
        });
    }

    /// Row counts per table, for diagnostics.
    pub fn table_counts(&self) -> Vec<(String, i64)> {
        self.with_conn("table_counts", Vec::new(), |conn, _| {
            schema::TABLES
                .iter()
                .map(|table| {
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get::<_, i64>(0)
                    })
                    .map(|count| (table.to_string(), count))
                })
                .collect()
        })
    }

    /// Consistent view of the bounded collections. Sensor telemetry is left out.
    pub fn snapshot(&self) -> MemorySnapshot {
        let limits = self.limits();
        let empty = MemorySnapshot {
            conversation: Vec::new(),
            queries: Vec::new(),
            summary: String::new(),
            facts: Vec::new(),
            profile: ProfileView::default(),
            counters: BTreeMap::new(),
            limits: limits.into(),
        };
        self.with_conn("snapshot", empty, |conn, limits| {
            let tx = conn.transaction()?;
            let snapshot = MemorySnapshot {
                conversation: read_recent_turns(&tx, limits.max_history)?,
                queries: read_recent_queries(&tx, limits.max_history)?,
                summary: read_summary(&tx)?,
                facts: read_recent_facts(&tx, limits.max_facts)?,
                profile: ProfileView {
                    name: read_user_name(&tx)?,
                },
                counters: read_counters(&tx)?,
                limits: limits.into(),
            };
            tx.commit()?;
            Ok(snapshot)
        })
    }
}
