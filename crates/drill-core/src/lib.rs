//! Session timer state machine for drill
//!
//! This crate is the heart of drill, containing:
//! - Session state machine (Idle -> Running -> Completed | EndedEarly)
//! - Tick-driven progression through steps, sets and rest periods
//! - The append-only event log and its closed vocabulary of event codes
//! - Derivation of the session result from final state and feedback

mod engine;
mod events;
mod result;
mod session;
mod transitions;

pub use engine::*;
pub use events::*;
pub use result::*;
pub use session::*;
pub use transitions::*;
