//! Session script parsing and validation for drill
//!
//! Supports JSON session scripts with:
//! - Ordered steps, each `timed` or `reps`
//! - Per-step sets and inter-set rest
//! - Structural validation with the first failure reported
//! - Lookup of today's script in a dated sessions directory

mod catalog;
mod schema;
mod validation;

pub use catalog::*;
pub use schema::*;
pub use validation::*;

use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Script loading errors
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read session script: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Malformed session script (check commas and quotes): {0}")]
    MalformedInput(#[source] serde_json::Error),

    #[error("Invalid session script: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Session script passed validation but has unusable field values: {0}")]
    Unconvertible(#[source] serde_json::Error),
}

impl ScriptError {
    /// Stable machine-readable kind, for drivers that present errors
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptError::ReadError(_) => "READ_ERROR",
            ScriptError::MalformedInput(_) => "MALFORMED_INPUT",
            ScriptError::Invalid(_) => "INVALID_SCRIPT",
            ScriptError::Unconvertible(_) => "UNCONVERTIBLE_SCRIPT",
        }
    }
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// Load and validate a session script from a JSON file
pub fn load_script(path: impl AsRef<Path>) -> ScriptResult<SessionScript> {
    let content = std::fs::read_to_string(path.as_ref())?;
    debug!(path = %path.as_ref().display(), bytes = content.len(), "Session script read");
    parse_and_validate(&content)
}

/// Parse and validate a session script from raw JSON text
pub fn parse_and_validate(raw: &str) -> ScriptResult<SessionScript> {
    let value: Value = serde_json::from_str(raw).map_err(ScriptError::MalformedInput)?;
    script_from_value(value)
}

/// Validate an already parsed document and convert it into a script
pub fn script_from_value(value: Value) -> ScriptResult<SessionScript> {
    validate_script(&value)?;

    let script: SessionScript =
        serde_json::from_value(value).map_err(ScriptError::Unconvertible)?;

    debug!(
        session_id = %script.session_id,
        total_steps = script.total_steps,
        "Session script validated"
    );

    Ok(script)
}
