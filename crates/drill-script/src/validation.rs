//! Structural validation of session scripts
//!
//! Checks run in a fixed order and stop at the first failure. Numeric ranges
//! of `target_seconds`, `target_reps` and `rest_seconds`, uniqueness of
//! `step_no` and uniqueness of `session_id` across imports are not checked.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{as_integer, ActionType, StepPhase};

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("root of the session script must be a JSON object")]
    RootNotObject,

    #[error("missing required field session_id (non-empty string)")]
    MissingSessionId,

    #[error("missing required field session_name (non-empty string)")]
    MissingSessionName,

    #[error("missing required field total_steps (positive integer)")]
    InvalidTotalSteps,

    #[error("missing required field steps (non-empty array)")]
    InvalidSteps,

    #[error("total_steps is {total_steps} but steps has {actual} entries")]
    StepCountMismatch { total_steps: i64, actual: usize },

    #[error("steps[{index}] must be an object")]
    StepNotObject { index: usize },

    #[error("steps[{index}].step_no must be an integer")]
    InvalidStepNo { index: usize },

    #[error("steps[{index}].action_name is required")]
    MissingActionName { index: usize },

    #[error("steps[{index}].action_type must be timed or reps")]
    InvalidActionType { index: usize },

    #[error("steps[{index}].sets must be a positive integer")]
    InvalidSets { index: usize },

    #[error("steps[{index}] missing field: {field}")]
    MissingStepField { index: usize, field: &'static str },

    #[error("steps[{index}].phase must be warmup, main or cooldown")]
    InvalidPhase { index: usize },
}

/// Validate a parsed session script document
pub fn validate_script(candidate: &Value) -> Result<(), ValidationError> {
    let Some(root) = candidate.as_object() else {
        return Err(ValidationError::RootNotObject);
    };

    if non_empty_str(root, "session_id").is_none() {
        return Err(ValidationError::MissingSessionId);
    }

    if non_empty_str(root, "session_name").is_none() {
        return Err(ValidationError::MissingSessionName);
    }

    let Some(total_steps) = positive_u32(root, "total_steps") else {
        return Err(ValidationError::InvalidTotalSteps);
    };

    let steps = match root.get("steps").and_then(Value::as_array) {
        Some(steps) if !steps.is_empty() => steps,
        _ => return Err(ValidationError::InvalidSteps),
    };

    if steps.len() != total_steps as usize {
        return Err(ValidationError::StepCountMismatch {
            total_steps: total_steps as i64,
            actual: steps.len(),
        });
    }

    for (index, step) in steps.iter().enumerate() {
        validate_step(step, index)?;
    }

    Ok(())
}

fn validate_step(step: &Value, index: usize) -> Result<(), ValidationError> {
    let Some(step) = step.as_object() else {
        return Err(ValidationError::StepNotObject { index });
    };

    if step.get("step_no").and_then(as_integer).is_none() {
        return Err(ValidationError::InvalidStepNo { index });
    }

    if non_empty_str(step, "action_name").is_none() {
        return Err(ValidationError::MissingActionName { index });
    }

    let action_type = step.get("action_type").and_then(Value::as_str);
    if action_type.and_then(ActionType::parse).is_none() {
        return Err(ValidationError::InvalidActionType { index });
    }

    if positive_u32(step, "sets").is_none() {
        return Err(ValidationError::InvalidSets { index });
    }

    Ok(())
}

/// Stricter contract for scripts picked from the dated sessions directory.
///
/// On top of [`validate_script`], every step must carry `rest_seconds` and a
/// known `phase`.
pub fn validate_scheduled_script(candidate: &Value) -> Result<(), ValidationError> {
    validate_script(candidate)?;

    let steps = candidate
        .get("steps")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for (index, step) in steps.iter().enumerate() {
        for field in ["rest_seconds", "phase"] {
            if step.get(field).is_none() {
                return Err(ValidationError::MissingStepField { index, field });
            }
        }
        if step["phase"].as_str().and_then(StepPhase::parse).is_none() {
            return Err(ValidationError::InvalidPhase { index });
        }
    }

    Ok(())
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn positive_u32(object: &Map<String, Value>, key: &str) -> Option<u32> {
    let value = object.get(key).and_then(as_integer)?;
    u32::try_from(value).ok().filter(|v| *v > 0)
}
