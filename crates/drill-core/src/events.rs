//! Session event log
//!
//! Every state transition of the engine appends one [`EventRecord`]. The set
//! of event codes is closed: payloads are typed per code, so the engine can
//! only ever append a code from the vocabulary. Records read back from JSON
//! are checked against the same vocabulary.

use chrono::{DateTime, Local};
use drill_util::{EventId, SessionId};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::Difficulty;

/// The closed vocabulary of event codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCode {
    Pause,
    Resume,
    Skip,
    RestStart,
    RestExtend,
    RestEnd,
    EndSession,
    SessionComplete,
    PostFeedbackSubmit,
}

impl EventCode {
    pub const ALL: [EventCode; 9] = [
        EventCode::Pause,
        EventCode::Resume,
        EventCode::Skip,
        EventCode::RestStart,
        EventCode::RestExtend,
        EventCode::RestEnd,
        EventCode::EndSession,
        EventCode::SessionComplete,
        EventCode::PostFeedbackSubmit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::Pause => "pause",
            EventCode::Resume => "resume",
            EventCode::Skip => "skip",
            EventCode::RestStart => "rest_start",
            EventCode::RestExtend => "rest_extend",
            EventCode::RestEnd => "rest_end",
            EventCode::EndSession => "end_session",
            EventCode::SessionComplete => "session_complete",
            EventCode::PostFeedbackSubmit => "post_feedback_submit",
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event code string outside the vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid event_code: {0}")]
pub struct UnknownEventCode(pub String);

impl FromStr for EventCode {
    type Err = UnknownEventCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownEventCode(s.to_string()))
    }
}

/// Whether the user was working or resting when an event was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    Rest,
}

/// Position within the session at the moment of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub phase: Phase,
    pub set_index: Option<u32>,
    pub set_total: Option<u32>,
    /// Rest countdown while resting, work countdown otherwise
    pub remaining_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestStarted {
    #[serde(flatten)]
    pub snapshot: StepSnapshot,
    pub rest_seconds_planned: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestExtended {
    #[serde(flatten)]
    pub snapshot: StepSnapshot,
    pub added_seconds: u32,
    pub rest_seconds_total_after: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestEnded {
    pub rest_seconds_actual: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCompleted {
    pub completed_exercise_count: u32,
    pub planned_exercise_count: u32,
    pub completed_set_count: u64,
    pub planned_set_count: u64,
    pub session_duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSubmitted {
    pub difficulty_rating: Difficulty,
    pub fatigue_score_1_10: u8,
    pub pain_text: Option<String>,
    pub skip_reason_text: Option<String>,
    pub end_reason_text: Option<String>,
}

/// Kind-specific event payload, one variant per event code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Pause(StepSnapshot),
    Resume(StepSnapshot),
    Skip(StepSnapshot),
    RestStart(RestStarted),
    RestExtend(RestExtended),
    RestEnd(RestEnded),
    EndSession(StepSnapshot),
    SessionComplete(SessionCompleted),
    PostFeedbackSubmit(FeedbackSubmitted),
}

impl EventPayload {
    pub fn code(&self) -> EventCode {
        match self {
            EventPayload::Pause(_) => EventCode::Pause,
            EventPayload::Resume(_) => EventCode::Resume,
            EventPayload::Skip(_) => EventCode::Skip,
            EventPayload::RestStart(_) => EventCode::RestStart,
            EventPayload::RestExtend(_) => EventCode::RestExtend,
            EventPayload::RestEnd(_) => EventCode::RestEnd,
            EventPayload::EndSession(_) => EventCode::EndSession,
            EventPayload::SessionComplete(_) => EventCode::SessionComplete,
            EventPayload::PostFeedbackSubmit(_) => EventCode::PostFeedbackSubmit,
        }
    }

    /// Decode a payload whose shape is selected by `code`
    pub fn from_parts(code: EventCode, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match code {
            EventCode::Pause => EventPayload::Pause(serde_json::from_value(payload)?),
            EventCode::Resume => EventPayload::Resume(serde_json::from_value(payload)?),
            EventCode::Skip => EventPayload::Skip(serde_json::from_value(payload)?),
            EventCode::RestStart => EventPayload::RestStart(serde_json::from_value(payload)?),
            EventCode::RestExtend => EventPayload::RestExtend(serde_json::from_value(payload)?),
            EventCode::RestEnd => EventPayload::RestEnd(serde_json::from_value(payload)?),
            EventCode::EndSession => EventPayload::EndSession(serde_json::from_value(payload)?),
            EventCode::SessionComplete => {
                EventPayload::SessionComplete(serde_json::from_value(payload)?)
            }
            EventCode::PostFeedbackSubmit => {
                EventPayload::PostFeedbackSubmit(serde_json::from_value(payload)?)
            }
        })
    }
}

/// One immutable entry of the session history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireEventRecord")]
pub struct EventRecord {
    pub event_id: EventId,
    pub session_id: SessionId,
    pub timestamp: DateTime<Local>,
    pub step_no: Option<i64>,
    pub action_name: Option<String>,
    pub payload: EventPayload,
}

impl EventRecord {
    pub fn event_code(&self) -> EventCode {
        self.payload.code()
    }
}

/// Export shape of a record; field order is part of the contract
#[derive(Serialize)]
struct WireEventRecordRef<'a> {
    event_id: &'a EventId,
    session_id: &'a SessionId,
    event_code: EventCode,
    timestamp: &'a DateTime<Local>,
    step_no: Option<i64>,
    action_name: Option<&'a str>,
    payload: &'a EventPayload,
}

impl Serialize for EventRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEventRecordRef {
            event_id: &self.event_id,
            session_id: &self.session_id,
            event_code: self.event_code(),
            timestamp: &self.timestamp,
            step_no: self.step_no,
            action_name: self.action_name.as_deref(),
            payload: &self.payload,
        }
        .serialize(serializer)
    }
}

#[derive(Deserialize)]
struct WireEventRecord {
    event_id: EventId,
    session_id: SessionId,
    event_code: EventCode,
    timestamp: DateTime<Local>,
    step_no: Option<i64>,
    action_name: Option<String>,
    #[serde(default)]
    payload: Value,
}

/// A record whose payload does not have the shape its code requires
#[derive(Debug, Error)]
#[error("payload does not match event_code {code}: {source}")]
pub struct PayloadMismatch {
    pub code: EventCode,
    #[source]
    pub source: serde_json::Error,
}

impl TryFrom<WireEventRecord> for EventRecord {
    type Error = PayloadMismatch;

    fn try_from(wire: WireEventRecord) -> Result<Self, Self::Error> {
        let payload = EventPayload::from_parts(wire.event_code, wire.payload).map_err(|source| {
            PayloadMismatch {
                code: wire.event_code,
                source,
            }
        })?;

        Ok(Self {
            event_id: wire.event_id,
            session_id: wire.session_id,
            timestamp: wire.timestamp,
            step_no: wire.step_no,
            action_name: wire.action_name,
            payload,
        })
    }
}

/// Append-only, ordered event history of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    /// Number of records with the given code
    pub fn count(&self, code: EventCode) -> usize {
        self.records.iter().filter(|r| r.event_code() == code).count()
    }

    pub fn contains(&self, code: EventCode) -> bool {
        self.records.iter().any(|r| r.event_code() == code)
    }

    pub fn codes(&self) -> Vec<EventCode> {
        self.records.iter().map(EventRecord::event_code).collect()
    }
}

impl From<Vec<EventRecord>> for EventLog {
    fn from(records: Vec<EventRecord>) -> Self {
        Self { records }
    }
}
