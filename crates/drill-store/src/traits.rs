//! Store trait definitions

use chrono::{DateTime, Local};
use drill_core::{EventLog, Feedback, SessionResult, TimerEngine};
use drill_util::SessionId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::StoreResult;

/// Main store trait
pub trait Store: Send + Sync {
    /// Persist a finished session, returning its row id
    fn save_session(&self, archive: &SessionArchive) -> StoreResult<i64>;

    /// Most recently saved session, if any
    fn load_last_session(&self) -> StoreResult<Option<SessionArchive>>;

    /// Newest first
    fn recent_sessions(&self, limit: usize) -> StoreResult<Vec<StoredSessionSummary>>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Everything kept about one finished session attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionArchive {
    pub result: SessionResult,
    pub event_logs: EventLog,
    /// Step numbers whose sets were all finished, ascending
    pub completed_steps: Vec<i64>,
    /// Script file the session was loaded from
    pub script_path: Option<PathBuf>,
}

impl SessionArchive {
    /// Capture a finished engine together with the submitted feedback
    pub fn from_engine(
        engine: &TimerEngine,
        feedback: &Feedback,
        script_path: Option<PathBuf>,
    ) -> Self {
        Self {
            result: engine.build_session_result(feedback),
            event_logs: engine.event_log().clone(),
            completed_steps: engine.completed_step_numbers(),
            script_path,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.result.session_id
    }

    pub fn session_name(&self) -> &str {
        &self.result.session_name
    }
}

/// Row of the session history listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSessionSummary {
    pub id: i64,
    pub session_id: SessionId,
    pub session_name: String,
    pub saved_at: DateTime<Local>,
    pub duration_seconds: u64,
    pub completed_steps: u32,
    pub planned_steps: u32,
    pub ended_early: bool,
}
