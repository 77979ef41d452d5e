// src/telemetry.rs
//! SQLite telemetry sink.
//!
//! Optional key/value recording of per-phase counters, keyed by program
//! name and a per-invocation run id, so repeated assemblies into the same
//! database stay distinguishable. Opened only when `--db` is given.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

pub struct Telemetry {
    conn: Mutex<Connection>,
    program: String,
    run_id: String,
}

impl Telemetry {
    /// Open (creating if needed) the database at `path` and record the
    /// invocation metadata rows.
    pub fn open(path: &str, program: &str, meta: &[(&str, String)]) -> Result<Telemetry> {
        let conn = Connection::open(path).with_context(|| format!("opening db `{}'", path))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS telemetry (
                program TEXT NOT NULL,
                run_id  TEXT NOT NULL,
                phase   TEXT NOT NULL,
                key     TEXT NOT NULL,
                value   TEXT NOT NULL
            );",
        )?;
        let run_id = {
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            format!("{}-{}", now.as_secs(), std::process::id())
        };
        let t = Telemetry { conn: Mutex::new(conn), program: program.to_string(), run_id };
        for (key, value) in meta {
            t.add_text("meta", key, value)?;
        }
        Ok(t)
    }

    pub fn add(&self, phase: &str, key: &str, value: i64) -> Result<()> {
        self.add_text(phase, key, &value.to_string())
    }

    pub fn add_text(&self, phase: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO telemetry (program, run_id, phase, key, value) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![self.program, self.run_id, phase, key, value],
        )?;
        Ok(())
    }
}

/// Record into the sink when one is configured.
pub fn record(telemetry: Option<&Telemetry>, phase: &str, key: &str, value: i64) {
    if let Some(t) = telemetry {
        if let Err(e) = t.add(phase, key, value) {
            tracing::warn!("telemetry write failed: {}", e);
        }
    }
}
