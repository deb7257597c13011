//! Session timer engine

use chrono::{DateTime, Local};
use drill_script::{ActionType, SessionScript, Step};
use drill_util::{elapsed_seconds, Clock, EventId, SystemClock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::result::non_blank;
use crate::session::work_seconds;
use crate::{
    disposition, Disposition, EngineState, EventCode, EventLog, EventPayload, EventRecord,
    Feedback, FeedbackPrompts, FeedbackSubmitted, Guard, Operation, RestEnded, RestExtended,
    RestStarted, SessionCompleted, SessionResult, SessionStatus, StepSnapshot,
};

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running, or paused
    Ignored,
    /// A countdown moved by one second
    Counted,
    /// Current step is `reps`; waiting for the user to confirm the set
    AwaitingReps,
    /// The rest countdown reached zero
    RestEnded,
    /// A set finished; the rest before the next set began, if it has one
    SetFinished,
    /// The last set of a step finished and the next step is active
    StepAdvanced,
    /// The last set of the last step finished
    SessionCompleted,
}

/// User-initiated command, as routed by a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    /// Pause when running, resume when paused
    TogglePause,
    Skip,
    StartRest { seconds: u32 },
    ExtendRest { seconds: u32 },
    CompleteRepSet,
    EndSession,
}

/// Drives one session attempt through its steps, sets and rests
///
/// The engine is synchronous and performs no I/O. A driver calls
/// [`TimerEngine::tick`] once per elapsed second and forwards user commands
/// in between; calls must be serialized by the caller.
pub struct TimerEngine {
    script: SessionScript,
    state: EngineState,
    log: EventLog,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEngine")
            .field("session_id", &self.script.session_id)
            .field("state", &self.state)
            .field("events", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Create an idle engine stamped by the system clock
    pub fn new(script: SessionScript) -> Self {
        Self::with_clock(script, Arc::new(SystemClock))
    }

    /// Create an idle engine with an explicit clock
    pub fn with_clock(script: SessionScript, clock: Arc<dyn Clock>) -> Self {
        let state = EngineState::new(script.steps.first());

        debug!(
            session_id = %script.session_id,
            total_steps = script.total_steps,
            "Timer engine created"
        );

        Self {
            script,
            state,
            log: EventLog::new(),
            clock,
        }
    }

    pub fn script(&self) -> &SessionScript {
        &self.script
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn is_terminal(&self) -> bool {
        self.state.status.is_terminal()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.script.steps.get(self.state.step_index)
    }

    pub fn next_step(&self) -> Option<&Step> {
        self.script.steps.get(self.state.step_index + 1)
    }

    /// Completed step numbers in ascending order
    pub fn completed_step_numbers(&self) -> Vec<i64> {
        self.state.completed_steps.iter().copied().collect()
    }

    /// Reasons a driver should ask for when collecting feedback
    pub fn feedback_prompts(&self) -> FeedbackPrompts {
        FeedbackPrompts {
            skip_reason_required: self.log.contains(EventCode::Skip),
            end_reason_required: self.log.contains(EventCode::EndSession),
        }
    }

    fn guard(&self) -> Guard {
        Guard {
            status: self.state.status,
            paused: self.state.is_paused,
            resting: self.state.is_resting,
            step_type: self.current_step().map(|s| s.action_type),
        }
    }

    fn permits(&self, op: Operation) -> bool {
        match disposition(op, self.guard()) {
            Disposition::Apply => true,
            Disposition::Ignore => {
                debug!(
                    operation = ?op,
                    status = %self.state.status,
                    paused = self.state.is_paused,
                    resting = self.state.is_resting,
                    "Operation ignored in current state"
                );
                false
            }
        }
    }

    /// Route a driver command to the matching operation
    pub fn dispatch(&mut self, command: Command) -> bool {
        match command {
            Command::Start => self.start_session(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => {
                if self.state.is_paused {
                    self.resume()
                } else {
                    self.pause()
                }
            }
            Command::Skip => self.skip(),
            Command::StartRest { seconds } => self.start_rest(seconds),
            Command::ExtendRest { seconds } => self.extend_rest(seconds),
            Command::CompleteRepSet => self.complete_rep_set(),
            Command::EndSession => self.end_session(),
        }
    }

    /// Move from idle to running
    pub fn start_session(&mut self) -> bool {
        if !self.permits(Operation::Start) {
            return false;
        }

        self.state.status = SessionStatus::Running;
        self.state.started_at = Some(self.clock.now());
        if let Some(seconds) = self
            .current_step()
            .filter(|s| s.action_type == ActionType::Timed)
            .map(|s| s.target_seconds)
        {
            self.state.remaining_seconds = seconds;
        }

        info!(
            session_id = %self.script.session_id,
            session_name = %self.script.session_name,
            total_steps = self.script.total_steps,
            "Session started"
        );
        true
    }

    /// Advance time by one second
    pub fn tick(&mut self) -> TickOutcome {
        if !self.permits(Operation::Tick) {
            return TickOutcome::Ignored;
        }

        // Rest takes priority over the work countdown
        if self.state.is_resting {
            self.state.rest_remaining_seconds = self.state.rest_remaining_seconds.saturating_sub(1);
            if self.state.rest_remaining_seconds > 0 {
                return TickOutcome::Counted;
            }

            let rest_seconds_actual = self.state.rest_total_seconds;
            self.log_event(EventPayload::RestEnd(RestEnded { rest_seconds_actual }));
            self.state.is_resting = false;
            self.state.rest_total_seconds = 0;
            return TickOutcome::RestEnded;
        }

        let Some(action_type) = self.current_step().map(|s| s.action_type) else {
            return TickOutcome::Ignored;
        };

        match action_type {
            ActionType::Reps => TickOutcome::AwaitingReps,
            ActionType::Timed => {
                self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
                if self.state.remaining_seconds > 0 {
                    TickOutcome::Counted
                } else {
                    self.finish_current_set()
                }
            }
        }
    }

    fn finish_current_set(&mut self) -> TickOutcome {
        let Some(step) = self.current_step() else {
            return TickOutcome::Ignored;
        };
        let (step_no, sets, rest_seconds) = (step.step_no, step.sets, step.rest_seconds);

        self.state.completed_sets += 1;

        if self.state.current_set >= sets {
            self.state.completed_steps.insert(step_no);
            debug!(step_no, completed_sets = self.state.completed_sets, "Step finished");
            return self.move_to_next_step();
        }

        self.state.current_set += 1;
        // Next set counts down from the full target again
        self.state.remaining_seconds = self.current_step().map(work_seconds).unwrap_or(0);
        debug!(
            step_no,
            next_set = self.state.current_set,
            rest_seconds,
            "Set finished"
        );
        // A zero-length rest is no rest: the next set is ready immediately
        if rest_seconds > 0 {
            self.start_rest(rest_seconds);
        }
        TickOutcome::SetFinished
    }

    /// Confirm the current set of a `reps` step
    pub fn complete_rep_set(&mut self) -> bool {
        if !self.permits(Operation::CompleteRepSet) {
            return false;
        }
        self.finish_current_set();
        true
    }

    fn move_to_next_step(&mut self) -> TickOutcome {
        self.state.step_index += 1;
        self.state.current_set = 1;

        let Some((step_no, work, action_name)) = self
            .current_step()
            .map(|s| (s.step_no, work_seconds(s), s.action_name.clone()))
        else {
            let ended_at = self.clock.now();
            self.state.status = SessionStatus::Completed;
            self.state.ended_at = Some(ended_at);

            let payload = SessionCompleted {
                completed_exercise_count: self.state.completed_steps.len() as u32,
                planned_exercise_count: self.script.total_steps,
                completed_set_count: self.state.completed_sets,
                planned_set_count: self.script.planned_set_count(),
                session_duration_seconds: self.duration_seconds_until(ended_at),
            };

            info!(
                session_id = %self.script.session_id,
                completed_steps = payload.completed_exercise_count,
                completed_sets = payload.completed_set_count,
                duration_secs = payload.session_duration_seconds,
                "Session completed"
            );

            self.log_event(EventPayload::SessionComplete(payload));
            return TickOutcome::SessionCompleted;
        };

        self.state.remaining_seconds = work;
        debug!(step_no, action_name = %action_name, "Moved to next step");
        TickOutcome::StepAdvanced
    }

    pub fn pause(&mut self) -> bool {
        if !self.permits(Operation::Pause) {
            return false;
        }
        self.state.is_paused = true;
        let snapshot = self.snapshot();
        self.log_event(EventPayload::Pause(snapshot));
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.permits(Operation::Resume) {
            return false;
        }
        self.state.is_paused = false;
        let snapshot = self.snapshot();
        self.log_event(EventPayload::Resume(snapshot));
        true
    }

    /// Abandon every remaining set of the current step
    pub fn skip(&mut self) -> bool {
        if !self.permits(Operation::Skip) {
            return false;
        }
        self.state.has_skip = true;
        let snapshot = self.snapshot();
        self.log_event(EventPayload::Skip(snapshot));
        self.move_to_next_step();
        true
    }

    /// Begin a rest period of `seconds`, replacing any rest in progress
    pub fn start_rest(&mut self, seconds: u32) -> bool {
        if !self.permits(Operation::StartRest) {
            return false;
        }
        self.state.is_resting = true;
        self.state.rest_remaining_seconds = seconds;
        self.state.rest_total_seconds = seconds;

        let snapshot = self.snapshot();
        self.log_event(EventPayload::RestStart(RestStarted {
            snapshot,
            rest_seconds_planned: seconds,
        }));
        true
    }

    /// Lengthen the rest in progress by `extra` seconds
    pub fn extend_rest(&mut self, extra: u32) -> bool {
        if !self.permits(Operation::ExtendRest) {
            return false;
        }
        self.state.rest_remaining_seconds = self.state.rest_remaining_seconds.saturating_add(extra);
        self.state.rest_total_seconds = self.state.rest_total_seconds.saturating_add(extra);

        let snapshot = self.snapshot();
        let rest_seconds_total_after = self.state.rest_total_seconds;
        self.log_event(EventPayload::RestExtend(RestExtended {
            snapshot,
            added_seconds: extra,
            rest_seconds_total_after,
        }));
        true
    }

    /// Terminate the session before all steps are done
    pub fn end_session(&mut self) -> bool {
        if !self.permits(Operation::EndSession) {
            return false;
        }
        self.state.status = SessionStatus::EndedEarly;
        self.state.ended_at = Some(self.clock.now());

        let (step_no, action_name) = match self.current_step() {
            Some(step) => (Some(step.step_no), Some(step.action_name.clone())),
            None => (None, None),
        };
        self.state.ended_on_step_no = step_no;
        self.state.ended_on_action_name = action_name;

        info!(
            session_id = %self.script.session_id,
            ended_on_step_no = ?step_no,
            completed_sets = self.state.completed_sets,
            "Session ended early"
        );

        let snapshot = self.snapshot();
        self.log_event(EventPayload::EndSession(snapshot));
        true
    }

    /// Record the user's post-session feedback in the log
    ///
    /// Not guarded: each call appends another record.
    pub fn submit_feedback(&mut self, feedback: &Feedback) {
        self.log_event(EventPayload::PostFeedbackSubmit(FeedbackSubmitted {
            difficulty_rating: feedback.difficulty,
            fatigue_score_1_10: feedback.fatigue_score,
            pain_text: non_blank(feedback.discomfort_notes.clone()),
            skip_reason_text: non_blank(feedback.skip_reason.clone()),
            end_reason_text: non_blank(feedback.end_reason.clone()),
        }));
    }

    /// Derive the session summary from the current state and `feedback`
    pub fn build_session_result(&self, feedback: &Feedback) -> SessionResult {
        let end_time = self.state.ended_at.unwrap_or_else(|| self.clock.now());
        let ended_early = self.state.status == SessionStatus::EndedEarly;

        SessionResult {
            session_id: self.script.session_id.clone(),
            session_name: self.script.session_name.clone(),
            start_time: self.state.started_at,
            end_time,
            duration_seconds: self.duration_seconds_until(end_time),
            planned_steps: self.script.total_steps,
            completed_steps: self.state.completed_steps.len() as u32,
            planned_sets: self.script.planned_set_count(),
            completed_sets: self.state.completed_sets,
            ended_early,
            ended_on_step_no: if ended_early {
                self.state.ended_on_step_no
            } else {
                None
            },
            ended_on_action_name: if ended_early {
                self.state.ended_on_action_name.clone()
            } else {
                None
            },
            overall_difficulty: feedback.difficulty,
            fatigue_score: feedback.fatigue_score,
            discomfort_notes: non_blank(feedback.discomfort_notes.clone()),
        }
    }

    fn duration_seconds_until(&self, end: DateTime<Local>) -> u64 {
        match self.state.started_at {
            Some(start) => elapsed_seconds(start, end),
            None => 0,
        }
    }

    fn snapshot(&self) -> StepSnapshot {
        let step = self.current_step();
        StepSnapshot {
            phase: self.state.phase(),
            set_index: step.map(|_| self.state.current_set),
            set_total: step.map(|s| s.sets),
            remaining_seconds: self.state.visible_remaining_seconds(),
        }
    }

    fn log_event(&mut self, payload: EventPayload) {
        let step = self.current_step();
        let record = EventRecord {
            event_id: EventId::new(),
            session_id: self.script.session_id.clone(),
            timestamp: self.clock.now(),
            step_no: step.map(|s| s.step_no),
            action_name: step.map(|s| s.action_name.clone()),
            payload,
        };

        debug!(
            session_id = %record.session_id,
            event_code = %record.event_code(),
            step_no = ?record.step_no,
            "Event logged"
        );

        self.log.append(record);
    }
}
