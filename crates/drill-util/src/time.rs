//! Time utilities for drill
//!
//! The engine never reads the wall clock directly. It asks a [`Clock`] for
//! the current instant when it stamps `started_at`, `ended_at` and event
//! timestamps, so tests can drive time by hand with [`ManualClock`].
//!
//! # Mock Time for Development
//!
//! In debug builds, the `DRILL_MOCK_TIME` environment variable can be set
//! to override the system time returned by [`now`].
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 07:30:00`)

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::sync::{Mutex, OnceLock};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "DRILL_MOCK_TIME";

/// Offset between mock time and real time, fixed at first use so that mock
/// time advances naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => {
                        if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Whole seconds elapsed between two instants, rounded to the nearest
/// second and never negative.
pub fn elapsed_seconds(start: DateTime<Local>, end: DateTime<Local>) -> u64 {
    let millis = end.signed_duration_since(start).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    ((millis + 500) / 1000) as u64
}

/// Format a countdown as `MM:SS` (minutes grow past 59 rather than wrapping).
pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format a DateTime for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Compact timestamp used in archive file names (`YYYYMMDD_HHMMSS`).
pub fn file_stamp(dt: &DateTime<Local>) -> String {
    dt.format("%Y%m%d_%H%M%S").to_string()
}

/// Source of wall-clock instants for transition stamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Clock backed by [`now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(chrono::Duration::seconds(secs));
    }

    pub fn set(&self, at: DateTime<Local>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_seconds_rounds() {
        let start = Local.with_ymd_and_hms(2025, 12, 29, 7, 0, 0).unwrap();

        assert_eq!(elapsed_seconds(start, start), 0);
        assert_eq!(elapsed_seconds(start, start + chrono::Duration::milliseconds(499)), 0);
        assert_eq!(elapsed_seconds(start, start + chrono::Duration::milliseconds(500)), 1);
        assert_eq!(elapsed_seconds(start, start + chrono::Duration::seconds(95)), 95);
    }

    #[test]
    fn test_elapsed_seconds_never_negative() {
        let start = Local.with_ymd_and_hms(2025, 12, 29, 7, 0, 0).unwrap();
        let earlier = start - chrono::Duration::seconds(30);
        assert_eq!(elapsed_seconds(start, earlier), 0);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(45), "00:45");
        assert_eq!(format_countdown(90), "01:30");
        assert_eq!(format_countdown(3600), "60:00");
    }

    #[test]
    fn test_file_stamp() {
        let dt = Local.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(file_stamp(&dt), "20250304_050607");
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Local.with_ymd_and_hms(2025, 12, 29, 7, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance_secs(90);
        assert_eq!(clock.now(), start + chrono::Duration::seconds(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
