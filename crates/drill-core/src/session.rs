//! Session state

use chrono::{DateTime, Local};
use drill_script::{ActionType, Step};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::Phase;

/// Lifecycle of one session attempt
///
/// ```text
/// Idle ──start──▶ Running ──last set / skip──▶ Completed
///   │                │
///   └──────end───────┴──────────end──────────▶ EndedEarly
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    EndedEarly,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 4] = [
        SessionStatus::Idle,
        SessionStatus::Running,
        SessionStatus::Completed,
        SessionStatus::EndedEarly,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::EndedEarly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::EndedEarly => "ended_early",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of a running session, owned by one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineState {
    /// Cursor into the script's steps; equals `steps.len()` once completed
    pub step_index: usize,

    /// 1-based set within the current step
    pub current_set: u32,

    /// Work countdown of the current set (timed steps only)
    pub remaining_seconds: u32,

    pub is_resting: bool,
    pub rest_remaining_seconds: u32,
    /// Planned rest plus any extensions, for `rest_end`
    pub rest_total_seconds: u32,

    pub is_paused: bool,

    pub status: SessionStatus,

    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,

    /// Step numbers whose every set was finished
    pub completed_steps: BTreeSet<i64>,

    /// Sets finished across the whole session (never decreases)
    pub completed_sets: u64,

    pub has_skip: bool,

    pub ended_on_step_no: Option<i64>,
    pub ended_on_action_name: Option<String>,
}

impl EngineState {
    pub(crate) fn new(first_step: Option<&Step>) -> Self {
        Self {
            step_index: 0,
            current_set: 1,
            remaining_seconds: first_step.map(work_seconds).unwrap_or(0),
            is_resting: false,
            rest_remaining_seconds: 0,
            rest_total_seconds: 0,
            is_paused: false,
            status: SessionStatus::Idle,
            started_at: None,
            ended_at: None,
            completed_steps: BTreeSet::new(),
            completed_sets: 0,
            has_skip: false,
            ended_on_step_no: None,
            ended_on_action_name: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.is_resting {
            Phase::Rest
        } else {
            Phase::Work
        }
    }

    /// The countdown the user is currently watching
    pub fn visible_remaining_seconds(&self) -> u32 {
        if self.is_resting {
            self.rest_remaining_seconds
        } else {
            self.remaining_seconds
        }
    }
}

/// Initial work countdown for a step
pub(crate) fn work_seconds(step: &Step) -> u32 {
    match step.action_type {
        ActionType::Timed => step.target_seconds,
        ActionType::Reps => 0,
    }
}
