//! Post-session feedback and the derived session result

use chrono::{DateTime, Local};
use drill_util::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How hard the session felt overall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    TooEasy,
    JustRight,
    TooHard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::TooEasy => "too_easy",
            Difficulty::JustRight => "just_right",
            Difficulty::TooHard => "too_hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = FeedbackError;

    /// Accepts the wire names plus the short forms `easy`, `ok` and `hard`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "too_easy" | "easy" => Ok(Difficulty::TooEasy),
            "just_right" | "ok" | "right" => Ok(Difficulty::JustRight),
            "too_hard" | "hard" => Ok(Difficulty::TooHard),
            other => Err(FeedbackError::UnknownDifficulty(other.to_string())),
        }
    }
}

/// Feedback errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedbackError {
    #[error("Unknown difficulty rating: {0} (expected too_easy, just_right or too_hard)")]
    UnknownDifficulty(String),

    #[error("Fatigue score must be between 1 and 10, got {0}")]
    FatigueOutOfRange(u8),
}

/// What the user reports once the session is over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub difficulty: Difficulty,
    /// Subjective fatigue, 1 (fresh) to 10 (exhausted)
    pub fatigue_score: u8,
    pub discomfort_notes: Option<String>,
    pub skip_reason: Option<String>,
    pub end_reason: Option<String>,
}

impl Feedback {
    pub fn new(difficulty: Difficulty, fatigue_score: u8) -> Self {
        Self {
            difficulty,
            fatigue_score,
            discomfort_notes: None,
            skip_reason: None,
            end_reason: None,
        }
    }

    pub fn with_discomfort_notes(mut self, notes: impl Into<String>) -> Self {
        self.discomfort_notes = non_blank(Some(notes.into()));
        self
    }

    pub fn with_skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = non_blank(Some(reason.into()));
        self
    }

    pub fn with_end_reason(mut self, reason: impl Into<String>) -> Self {
        self.end_reason = non_blank(Some(reason.into()));
        self
    }

    pub fn validate(&self) -> Result<(), FeedbackError> {
        if !(1..=10).contains(&self.fatigue_score) {
            return Err(FeedbackError::FatigueOutOfRange(self.fatigue_score));
        }
        Ok(())
    }
}

/// Which optional reasons a driver should ask for, given the session history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackPrompts {
    pub skip_reason_required: bool,
    pub end_reason_required: bool,
}

/// Summary of one finished session attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: SessionId,
    pub session_name: String,
    /// None if the session was ended before it was started
    pub start_time: Option<DateTime<Local>>,
    pub end_time: DateTime<Local>,
    pub duration_seconds: u64,
    pub planned_steps: u32,
    pub completed_steps: u32,
    pub planned_sets: u64,
    pub completed_sets: u64,
    pub ended_early: bool,
    pub ended_on_step_no: Option<i64>,
    pub ended_on_action_name: Option<String>,
    pub overall_difficulty: Difficulty,
    pub fatigue_score: u8,
    pub discomfort_notes: Option<String>,
}

pub(crate) fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}
