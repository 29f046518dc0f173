//! `--dump-memory` and `--dump-db` diagnostics.

use anyhow::{Context, Result};
use std::io::Write;

use edo_talker::memory::{Backing, MemoryStore};
use edo_talker::text::truncate_with_ellipsis;

const RECENT_ROWS: usize = 5;
const CELL_MAX_CHARS: usize = 160;

/// Pretty JSON of the bounded memory snapshot.
pub(crate) fn write_snapshot<W: Write>(store: &MemoryStore, out: &mut W) -> Result<()> {
    let json = serde_json::to_string_pretty(&store.snapshot())
        .context("failed to serialize memory snapshot")?;
    writeln!(out, "{json}")?;
    Ok(())
}

fn backing_label(backing: &Backing) -> String {
    match backing {
        Backing::File(path) => path.display().to_string(),
        Backing::Memory => "(in-memory fallback)".to_string(),
        Backing::Unavailable => "(unavailable)".to_string(),
    }
}

/// Table sizes plus the newest rows of each bounded collection.
pub(crate) fn write_db_overview<W: Write>(store: &MemoryStore, out: &mut W) -> Result<()> {
    writeln!(out, "database: {}", backing_label(store.backing()))?;
    for (table, count) in store.table_counts() {
        writeln!(out, "  {table}: {count}")?;
    }

    writeln!(out, "recent conversation:")?;
    for turn in store.recent_turns(RECENT_ROWS) {
        let content = truncate_with_ellipsis(&turn.content, CELL_MAX_CHARS);
        writeln!(out, "  [{}] {}: {content}", turn.timestamp, turn.role)?;
    }

    writeln!(out, "recent queries:")?;
    for query in store.recent_queries(RECENT_ROWS) {
        let text = truncate_with_ellipsis(&query.text, CELL_MAX_CHARS);
        writeln!(out, "  [{}] {text}", query.timestamp)?;
    }

    writeln!(out, "facts:")?;
    for fact in store.recent_facts(RECENT_ROWS) {
        let text = truncate_with_ellipsis(&fact.text, CELL_MAX_CHARS);
        writeln!(out, "  x{} {text}", fact.count)?;
    }

    let summary = store.get_summary();
    writeln!(
        out,
        "summary: {}",
        truncate_with_ellipsis(&summary, CELL_MAX_CHARS)
    )?;
    if let Some(name) = store.get_user_name() {
        writeln!(out, "profile.name: {name}")?;
    }
    Ok(())
}
