//! Session script schema (as parsed from JSON)

use drill_util::SessionId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A validated, read-only workout definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScript {
    /// Author-supplied unique identifier
    pub session_id: SessionId,

    /// Display name
    pub session_name: String,

    /// Number of steps, always equal to `steps.len()`
    #[serde(deserialize_with = "de_integer")]
    pub total_steps: u32,

    /// Ordered exercise steps
    pub steps: Vec<Step>,
}

impl SessionScript {
    /// Total number of sets across every step
    pub fn planned_set_count(&self) -> u64 {
        self.steps.iter().map(|s| u64::from(s.sets)).sum()
    }
}

/// One exercise within a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Advisory ordering label; not required to be unique or contiguous
    #[serde(deserialize_with = "de_integer")]
    pub step_no: i64,

    pub action_name: String,

    pub action_type: ActionType,

    #[serde(deserialize_with = "de_integer")]
    pub sets: u32,

    /// Work interval per set, only meaningful for `timed` steps
    #[serde(default, deserialize_with = "de_lenient_count")]
    pub target_seconds: u32,

    /// Repetitions per set, only meaningful for `reps` steps
    #[serde(default, deserialize_with = "de_lenient_count")]
    pub target_reps: u32,

    /// Rest inserted between sets of this step
    #[serde(default, deserialize_with = "de_lenient_count")]
    pub rest_seconds: u32,

    /// Shown with the step; anything but a string is dropped
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_lenient_text"
    )]
    pub safety_tip: Option<String>,

    /// Unknown phases are dropped rather than rejected
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_lenient_phase"
    )]
    pub phase: Option<StepPhase>,
}

impl Step {
    /// Human readable per-set requirement, e.g. `45 s` or `12 reps`
    pub fn requirement_label(&self) -> String {
        match self.action_type {
            ActionType::Timed => format!("{} s", self.target_seconds),
            ActionType::Reps => format!("{} reps", self.target_reps),
        }
    }
}

/// How a step's work interval is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Counted down by the engine
    Timed,
    /// Confirmed by the user once per set
    Reps,
}

impl ActionType {
    pub const ALL: [ActionType; 2] = [ActionType::Timed, ActionType::Reps];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Timed => "timed",
            ActionType::Reps => "reps",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Training phase a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Warmup,
    Main,
    Cooldown,
}

impl StepPhase {
    pub const ALL: [StepPhase; 3] = [StepPhase::Warmup, StepPhase::Main, StepPhase::Cooldown];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepPhase::Warmup => "warmup",
            StepPhase::Main => "main",
            StepPhase::Cooldown => "cooldown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

/// Interpret a JSON number as an integer. Floats with no fractional part
/// count as integers.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    if value.is_u64() {
        // Larger than i64::MAX; still an integer, clamp it.
        return Some(i64::MAX);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

fn de_integer<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Value::deserialize(deserializer)?;
    let int = as_integer(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {value}")))?;
    T::try_from(int).map_err(|_| serde::de::Error::custom(format!("integer {int} out of range")))
}

/// Counts that are never validated: anything that is not a usable
/// non-negative number becomes 0, fractions are floored.
fn de_lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match value.as_f64() {
        Some(f) if f.is_finite() && f > 0.0 => f.floor().min(u32::MAX as f64) as u32,
        _ => 0,
    };
    Ok(count)
}

fn de_lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_owned))
}

fn de_lenient_phase<'de, D>(deserializer: D) -> Result<Option<StepPhase>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(StepPhase::parse))
}
