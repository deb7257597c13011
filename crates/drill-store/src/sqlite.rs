//! SQLite-based store implementation

use chrono::{DateTime, Local};
use drill_core::{EventLog, SessionResult};
use drill_util::SessionId;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{SessionArchive, Store, StoreError, StoreResult, StoredSessionSummary};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- One row per finished session attempt (append-only)
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                session_name TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                completed_steps INTEGER NOT NULL,
                planned_steps INTEGER NOT NULL,
                ended_early INTEGER NOT NULL,
                script_path TEXT,
                result_json TEXT NOT NULL,
                events_json TEXT NOT NULL,
                completed_steps_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_session_id ON sessions(session_id);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| drill_util::now())
}

impl Store for SqliteStore {
    fn save_session(&self, archive: &SessionArchive) -> StoreResult<i64> {
        let conn = self.conn()?;
        let result = &archive.result;

        let result_json = serde_json::to_string(result)?;
        let events_json = serde_json::to_string(&archive.event_logs)?;
        let completed_steps_json = serde_json::to_string(&archive.completed_steps)?;
        let script_path = archive
            .script_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        conn.execute(
            r#"
            INSERT INTO sessions (
                session_id, session_name, saved_at, duration_secs,
                completed_steps, planned_steps, ended_early, script_path,
                result_json, events_json, completed_steps_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                result.session_id.as_str(),
                result.session_name,
                drill_util::now().to_rfc3339(),
                result.duration_seconds as i64,
                result.completed_steps,
                result.planned_steps,
                result.ended_early,
                script_path,
                result_json,
                events_json,
                completed_steps_json,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(
            row_id = id,
            session_id = %result.session_id,
            events = archive.event_logs.len(),
            "Session saved"
        );

        Ok(id)
    }

    fn load_last_session(&self) -> StoreResult<Option<SessionArchive>> {
        let conn = self.conn()?;

        let row: Option<(String, String, String, Option<String>)> = conn
            .query_row(
                r#"
                SELECT result_json, events_json, completed_steps_json, script_path
                FROM sessions ORDER BY id DESC LIMIT 1
                "#,
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((result_json, events_json, completed_steps_json, script_path)) = row else {
            return Ok(None);
        };

        let result: SessionResult = serde_json::from_str(&result_json)?;
        let event_logs: EventLog = serde_json::from_str(&events_json)?;
        let completed_steps: Vec<i64> = serde_json::from_str(&completed_steps_json)?;

        Ok(Some(SessionArchive {
            result,
            event_logs,
            completed_steps,
            script_path: script_path.map(PathBuf::from),
        }))
    }

    fn recent_sessions(&self, limit: usize) -> StoreResult<Vec<StoredSessionSummary>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, session_id, session_name, saved_at, duration_secs,
                   completed_steps, planned_steps, ended_early
            FROM sessions ORDER BY id DESC LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map([limit], |row| {
            let saved_at: String = row.get(3)?;
            let duration_secs: i64 = row.get(4)?;
            Ok(StoredSessionSummary {
                id: row.get(0)?,
                session_id: SessionId::new(row.get::<_, String>(1)?),
                session_name: row.get(2)?,
                saved_at: parse_timestamp(&saved_at),
                duration_seconds: duration_secs.max(0) as u64,
                completed_steps: row.get(5)?,
                planned_steps: row.get(6)?,
                ended_early: row.get(7)?,
            })
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }

        Ok(sessions)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
