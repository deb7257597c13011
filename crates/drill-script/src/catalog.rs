//! Lookup of today's session script
//!
//! Scripts are organised by ISO week:
//! `<sessions_dir>/week<YYYY>_<WW>/session_<YYYYMMDD>_<anything>.json`.
//! When several scripts match a day, the lexicographically first one wins.
//! Scheduled scripts must also satisfy [`validate_scheduled_script`].

use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use serde_json::Value;

use crate::{script_from_value, validate_scheduled_script, ScriptError, SessionScript};

/// Result of looking up the script scheduled for a day
#[derive(Debug)]
pub enum TodaySession {
    Found { path: PathBuf, script: SessionScript },
    NoSessionForToday,
    /// The file exists but could not be read or parsed
    InvalidFile(String),
    /// The file parsed but failed structural validation
    InvalidContract(String),
}

impl TodaySession {
    /// Stable status code for drivers
    pub fn status_code(&self) -> Option<&'static str> {
        match self {
            TodaySession::Found { .. } => None,
            TodaySession::NoSessionForToday => Some("NO_SESSION_FOR_TODAY"),
            TodaySession::InvalidFile(_) => Some("INVALID_SESSION_FILE"),
            TodaySession::InvalidContract(_) => Some("INVALID_SESSION_CONTRACT"),
        }
    }
}

/// Directory holding the scripts for the ISO week containing `day`
pub fn week_dir(sessions_dir: &Path, day: NaiveDate) -> PathBuf {
    let week = day.iso_week();
    sessions_dir.join(format!("week{}_{:02}", week.year(), week.week()))
}

/// Find and load the script scheduled for `day`
pub fn find_today_session(sessions_dir: &Path, day: NaiveDate) -> TodaySession {
    let dir = week_dir(sessions_dir, day);
    let prefix = format!("session_{}_", day.format("%Y%m%d"));

    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "No week directory for today");
            return TodaySession::NoSessionForToday;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".json"))
        })
        .collect();
    candidates.sort();

    let Some(path) = candidates.into_iter().next() else {
        return TodaySession::NoSessionForToday;
    };

    let value = match read_json(&path) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Today's session could not be loaded");
            return TodaySession::InvalidFile(e.to_string());
        }
    };

    if let Err(e) = validate_scheduled_script(&value) {
        warn!(path = %path.display(), error = %e, "Today's session failed validation");
        return TodaySession::InvalidContract(e.to_string());
    }

    match script_from_value(value) {
        Ok(script) => TodaySession::Found { path, script },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Today's session could not be converted");
            TodaySession::InvalidContract(e.to_string())
        }
    }
}

fn read_json(path: &Path) -> Result<Value, ScriptError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(ScriptError::MalformedInput)
}
