//! File archive of finished sessions
//!
//! Layout under the archive root:
//!
//! ```text
//! inbox/<stamp>__<session-name-slug>__session_result.json
//! inbox/<stamp>__<session-name-slug>__event_logs.json
//! runs/run_<stamp>_<session-id-slug>.json
//! runs/latest_run.json
//! ```

use chrono::{DateTime, Local};
use drill_core::{EventCode, EventLog, SessionResult};
use drill_util::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{SessionArchive, StoreResult};

const MAX_SLUG_CHARS: usize = 80;

pub const SESSION_RESULT_FILE: &str = "session_result.json";
pub const EVENT_LOGS_FILE: &str = "event_logs.json";
pub const LATEST_RUN_FILE: &str = "latest_run.json";

/// Reduce a free-form name to a safe file name component
///
/// Lowercases, turns whitespace runs into `_`, keeps ASCII letters, digits,
/// `_`, `-` and CJK unified ideographs. Never returns an empty string.
pub fn slugify(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_whitespace = false;

    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        let keep = c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || c == '_'
            || c == '-'
            || ('\u{4e00}'..='\u{9fff}').contains(&c);
        if keep {
            slug.push(c);
        }
    }

    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

fn sanitize_stamp(stamp: &str) -> String {
    let safe: String = stamp
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if safe.is_empty() {
        drill_util::file_stamp(&drill_util::now())
    } else {
        safe
    }
}

fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Sorted, distinct step numbers that received a `skip` event
pub fn skipped_steps(events: &EventLog) -> Vec<i64> {
    events
        .iter()
        .filter(|e| e.event_code() == EventCode::Skip)
        .filter_map(|e| e.step_no)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Condensed event entry of a run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub time: DateTime<Local>,
    #[serde(rename = "type")]
    pub kind: EventCode,
    pub current_step_no: Option<i64>,
}

/// Per-run record kept next to the training plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub session_id: SessionId,
    pub session_file_path: Option<PathBuf>,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: DateTime<Local>,
    pub duration_seconds: u64,
    pub completed_steps: Vec<i64>,
    pub skipped_steps: Vec<i64>,
    pub event_log: Vec<RunEvent>,
}

impl RunSummary {
    pub fn from_archive(archive: &SessionArchive) -> Self {
        let result = &archive.result;
        Self {
            session_id: result.session_id.clone(),
            session_file_path: archive.script_path.clone(),
            start_time: result.start_time,
            end_time: result.end_time,
            duration_seconds: result.duration_seconds,
            completed_steps: archive.completed_steps.clone(),
            skipped_steps: skipped_steps(&archive.event_logs),
            event_log: archive
                .event_logs
                .iter()
                .map(|e| RunEvent {
                    time: e.timestamp,
                    kind: e.event_code(),
                    current_step_no: e.step_no,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestRun {
    latest_run_path: PathBuf,
}

/// Paths of a result/event-log pair on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub session_result_path: PathBuf,
    pub event_logs_path: PathBuf,
}

/// Everything [`FileArchive::write`] produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFiles {
    pub exported: ExportedFiles,
    pub run_file_path: PathBuf,
    pub latest_run_path: PathBuf,
}

/// Write `session_result.json` and `event_logs.json` into `dir`
pub fn export_json(
    dir: impl AsRef<Path>,
    result: &SessionResult,
    events: &EventLog,
) -> StoreResult<ExportedFiles> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let files = ExportedFiles {
        session_result_path: dir.join(SESSION_RESULT_FILE),
        event_logs_path: dir.join(EVENT_LOGS_FILE),
    };
    write_pretty(&files.session_result_path, result)?;
    write_pretty(&files.event_logs_path, events)?;

    debug!(dir = %dir.display(), events = events.len(), "Session exported");
    Ok(files)
}

/// Directory tree receiving finished sessions
#[derive(Debug, Clone)]
pub struct FileArchive {
    root: PathBuf,
}

impl FileArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.root.join("inbox")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    pub fn latest_run_path(&self) -> PathBuf {
        self.runs_dir().join(LATEST_RUN_FILE)
    }

    /// Archive a finished session under `stamp`
    ///
    /// Characters outside `[A-Za-z0-9_-]` are dropped from `stamp`; an empty
    /// stamp is replaced by the current time.
    pub fn write(&self, archive: &SessionArchive, stamp: &str) -> StoreResult<ArchivedFiles> {
        let inbox = self.inbox_dir();
        let runs = self.runs_dir();
        fs::create_dir_all(&inbox)?;
        fs::create_dir_all(&runs)?;

        let stamp = sanitize_stamp(stamp);
        let prefix = format!("{}__{}", stamp, slugify(archive.session_name()));

        let exported = ExportedFiles {
            session_result_path: inbox.join(format!("{}__{}", prefix, SESSION_RESULT_FILE)),
            event_logs_path: inbox.join(format!("{}__{}", prefix, EVENT_LOGS_FILE)),
        };
        write_pretty(&exported.session_result_path, &archive.result)?;
        write_pretty(&exported.event_logs_path, &archive.event_logs)?;

        let run_file_path = runs.join(format!(
            "run_{}_{}.json",
            stamp,
            slugify(archive.session_id().as_str())
        ));
        write_pretty(&run_file_path, &RunSummary::from_archive(archive))?;

        let latest_run_path = self.latest_run_path();
        write_pretty(
            &latest_run_path,
            &LatestRun {
                latest_run_path: run_file_path.clone(),
            },
        )?;

        info!(
            session_id = %archive.session_id(),
            run_file = %run_file_path.display(),
            "Session archived"
        );

        Ok(ArchivedFiles {
            exported,
            run_file_path,
            latest_run_path,
        })
    }

    /// Path recorded by the most recent [`FileArchive::write`]
    pub fn latest_run(&self) -> StoreResult<Option<PathBuf>> {
        let path = self.latest_run_path();
        if !path.exists() {
            return Ok(None);
        }
        let latest: LatestRun = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(Some(latest.latest_run_path))
    }
}
