//! Shared utilities for drill
//!
//! This crate provides:
//! - ID types (SessionId, EventId)
//! - Time utilities (wall-clock source, mock time, clock abstraction)
//! - Default paths for config and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
