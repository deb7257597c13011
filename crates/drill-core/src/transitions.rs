//! Transition table of the session state machine
//!
//! Every engine command consults [`disposition`] before touching state. A
//! command that is not valid in the current (status, paused, resting, step
//! type) combination is ignored without an error.

use drill_script::ActionType;

use crate::SessionStatus;

/// Operations the engine can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Start,
    Tick,
    Pause,
    Resume,
    Skip,
    StartRest,
    ExtendRest,
    CompleteRepSet,
    EndSession,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Start,
        Operation::Tick,
        Operation::Pause,
        Operation::Resume,
        Operation::Skip,
        Operation::StartRest,
        Operation::ExtendRest,
        Operation::CompleteRepSet,
        Operation::EndSession,
    ];
}

/// The parts of engine state that decide whether an operation applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub status: SessionStatus,
    pub paused: bool,
    pub resting: bool,
    /// Type of the current step, None once past the last step
    pub step_type: Option<ActionType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Apply,
    Ignore,
}

/// Look up what `op` does in the state described by `guard`
pub fn disposition(op: Operation, guard: Guard) -> Disposition {
    use Operation::*;
    use SessionStatus::*;

    let applies = match (op, guard.status) {
        (Start, Idle) => true,
        (EndSession, Idle | Running) => true,
        // Nothing else happens before start or after the end
        (_, Idle | Completed | EndedEarly) => false,

        (Start, Running) => false,
        (Tick, Running) => !guard.paused,
        (Pause, Running) => !guard.paused,
        (Resume, Running) => guard.paused,
        (Skip, Running) => true,
        (StartRest, Running) => true,
        (ExtendRest, Running) => guard.resting,
        (CompleteRepSet, Running) => {
            !guard.resting && guard.step_type == Some(ActionType::Reps)
        }
    };

    if applies {
        Disposition::Apply
    } else {
        Disposition::Ignore
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_guards() -> Vec<Guard> {
        let mut guards = Vec::new();
        for status in SessionStatus::ALL {
            for paused in [false, true] {
                for resting in [false, true] {
                    for step_type in [None, Some(ActionType::Timed), Some(ActionType::Reps)] {
                        guards.push(Guard {
                            status,
                            paused,
                            resting,
                            step_type,
                        });
                    }
                }
            }
        }
        guards
    }

    fn applying(op: Operation) -> Vec<Guard> {
        all_guards()
            .into_iter()
            .filter(|g| disposition(op, *g) == Disposition::Apply)
            .collect()
    }

    #[test]
    fn test_terminal_states_ignore_everything() {
        for guard in all_guards() {
            if guard.status.is_terminal() {
                for op in Operation::ALL {
                    assert_eq!(disposition(op, guard), Disposition::Ignore, "{:?} {:?}", op, guard);
                }
            }
        }
    }

    #[test]
    fn test_idle_only_starts_or_ends() {
        for guard in all_guards().into_iter().filter(|g| g.status == SessionStatus::Idle) {
            for op in Operation::ALL {
                let expected = if matches!(op, Operation::Start | Operation::EndSession) {
                    Disposition::Apply
                } else {
                    Disposition::Ignore
                };
                assert_eq!(disposition(op, guard), expected, "{:?} {:?}", op, guard);
            }
        }
    }

    #[test]
    fn test_start_is_idle_only() {
        let guards = applying(Operation::Start);
        assert_eq!(guards.len(), 12);
        assert!(guards.iter().all(|g| g.status == SessionStatus::Idle));
    }

    #[test]
    fn test_tick_and_pause_need_unpaused_running() {
        for op in [Operation::Tick, Operation::Pause] {
            let guards = applying(op);
            assert_eq!(guards.len(), 6, "{:?}", op);
            assert!(guards
                .iter()
                .all(|g| g.status == SessionStatus::Running && !g.paused));
        }
    }

    #[test]
    fn test_resume_needs_paused_running() {
        let guards = applying(Operation::Resume);
        assert_eq!(guards.len(), 6);
        assert!(guards
            .iter()
            .all(|g| g.status == SessionStatus::Running && g.paused));
    }

    #[test]
    fn test_skip_and_start_rest_apply_in_any_running_substate() {
        for op in [Operation::Skip, Operation::StartRest] {
            let guards = applying(op);
            assert_eq!(guards.len(), 12, "{:?}", op);
            assert!(guards.iter().all(|g| g.status == SessionStatus::Running));
        }
    }

    #[test]
    fn test_extend_rest_needs_resting() {
        let guards = applying(Operation::ExtendRest);
        assert_eq!(guards.len(), 6);
        assert!(guards
            .iter()
            .all(|g| g.status == SessionStatus::Running && g.resting));
    }

    #[test]
    fn test_complete_rep_set_needs_reps_step_at_work() {
        let guards = applying(Operation::CompleteRepSet);
        // Paused or not, but never while resting and only on reps steps
        assert_eq!(guards.len(), 2);
        assert!(guards.iter().all(|g| g.status == SessionStatus::Running
            && !g.resting
            && g.step_type == Some(ActionType::Reps)));
    }

    #[test]
    fn test_end_session_before_terminal() {
        let guards = applying(Operation::EndSession);
        assert_eq!(guards.len(), 24);
        assert!(guards.iter().all(|g| !g.status.is_terminal()));
    }
}
