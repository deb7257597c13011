//! Owns the active session and the task that ticks it

use drill_core::{Command, SessionStatus, TickOutcome, TimerEngine};
use drill_script::SessionScript;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What the runner reports back to the driver loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerNotice {
    /// A tick did something worth showing (rest over, next set or step)
    Progress(TickOutcome),
    /// The session became terminal; sent exactly once per engine
    Finished(SessionStatus),
}

/// A notice tagged with the engine generation that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub generation: u64,
    pub event: RunnerNotice,
}

/// At most one running session and at most one ticker
pub struct SessionRunner {
    script: SessionScript,
    engine: Arc<Mutex<TimerEngine>>,
    /// Bumped each time the engine is replaced
    generation: u64,
    ticker: Option<JoinHandle<()>>,
    tick_interval: Duration,
    notices: mpsc::UnboundedSender<Notice>,
}

impl SessionRunner {
    pub fn new(
        script: SessionScript,
        tick_interval: Duration,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        let engine = Arc::new(Mutex::new(TimerEngine::new(script.clone())));
        Self {
            script,
            engine,
            generation: 0,
            ticker: None,
            tick_interval,
            notices,
        }
    }

    /// Shared handle to the current engine
    pub fn engine(&self) -> Arc<Mutex<TimerEngine>> {
        self.engine.clone()
    }

    /// Whether `notice` came from the current engine rather than a replaced one
    pub fn is_current(&self, notice: &Notice) -> bool {
        notice.generation == self.generation
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start the current engine and its ticker
    pub async fn start(&mut self) -> bool {
        let started = self.engine.lock().await.start_session();
        if started {
            self.stop_ticker().await;
            self.spawn_ticker();
        }
        started
    }

    /// Throw away all progress and start the same script from the top
    pub async fn restart(&mut self) {
        self.stop_ticker().await;

        self.engine = Arc::new(Mutex::new(TimerEngine::new(self.script.clone())));
        self.generation += 1;
        info!(
            session_id = %self.script.session_id,
            generation = self.generation,
            "Session restarted"
        );

        self.start().await;
    }

    /// Forward a user command to the engine
    ///
    /// When the command ends the session, the ticker is stopped and
    /// [`RunnerNotice::Finished`] is sent.
    pub async fn dispatch(&mut self, command: Command) -> bool {
        let (applied, status) = {
            let mut engine = self.engine.lock().await;
            let applied = engine.dispatch(command);
            (applied, engine.status())
        };

        if applied && status.is_terminal() {
            self.stop_ticker().await;
            let _ = self.notices.send(Notice {
                generation: self.generation,
                event: RunnerNotice::Finished(status),
            });
        }
        applied
    }

    /// Stop ticking without touching the engine
    pub async fn shutdown(&mut self) {
        self.stop_ticker().await;
    }

    async fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            // Wait so the old task can never tick again
            let _ = ticker.await;
            debug!("Ticker stopped");
        }
    }

    fn spawn_ticker(&mut self) {
        let engine = self.engine.clone();
        let notices = self.notices.clone();
        let period = self.tick_interval;
        let generation = self.generation;
        let notify = move |event| {
            let _ = notices.send(Notice { generation, event });
        };

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of an interval fires immediately
            interval.tick().await;

            loop {
                interval.tick().await;

                let outcome = engine.lock().await.tick();
                match outcome {
                    TickOutcome::Ignored | TickOutcome::Counted | TickOutcome::AwaitingReps => {}
                    TickOutcome::SessionCompleted => {
                        notify(RunnerNotice::Finished(SessionStatus::Completed));
                        break;
                    }
                    other => notify(RunnerNotice::Progress(other)),
                }
            }
            debug!("Ticker finished");
        }));

        debug!(
            interval_ms = period.as_millis() as u64,
            generation,
            "Ticker started"
        );
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_script::{ActionType, Step};
    use drill_util::SessionId;

    const FAST: Duration = Duration::from_millis(5);
    const WAIT: Duration = Duration::from_secs(5);

    fn script(action_type: ActionType, target_seconds: u32, sets: u32) -> SessionScript {
        SessionScript {
            session_id: SessionId::new("runner-test"),
            session_name: "Runner Test".into(),
            total_steps: 1,
            steps: vec![Step {
                step_no: 1,
                action_name: "Hold".into(),
                action_type,
                sets,
                target_seconds,
                target_reps: match action_type {
                    ActionType::Reps => 10,
                    ActionType::Timed => 0,
                },
                rest_seconds: 1,
                safety_tip: None,
                phase: None,
            }],
        }
    }

    async fn next_notice(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Notice {
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for notice")
            .expect("channel closed")
    }

    async fn next_finished(rx: &mut mpsc::UnboundedReceiver<Notice>) -> SessionStatus {
        loop {
            if let RunnerNotice::Finished(status) = next_notice(rx).await.event {
                return status;
            }
        }
    }

    #[tokio::test]
    async fn test_ticker_completes_timed_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = SessionRunner::new(script(ActionType::Timed, 2, 2), FAST, tx);

        assert!(runner.start().await);
        assert_eq!(next_finished(&mut rx).await, SessionStatus::Completed);

        let engine = runner.engine();
        let engine = engine.lock().await;
        assert_eq!(engine.status(), SessionStatus::Completed);
        assert_eq!(engine.state().completed_sets, 2);
        assert!(!runner.is_ticking());
    }

    #[tokio::test]
    async fn test_progress_notices_for_rest() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = SessionRunner::new(script(ActionType::Timed, 1, 2), FAST, tx);
        runner.start().await;

        let mut seen = Vec::new();
        loop {
            let notice = next_notice(&mut rx).await;
            assert!(runner.is_current(&notice));
            seen.push(notice.event);
            if matches!(notice.event, RunnerNotice::Finished(_)) {
                break;
            }
        }

        assert_eq!(
            seen,
            vec![
                RunnerNotice::Progress(TickOutcome::SetFinished),
                RunnerNotice::Progress(TickOutcome::RestEnded),
                RunnerNotice::Finished(SessionStatus::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn test_end_command_notifies_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = SessionRunner::new(script(ActionType::Timed, 600, 1), FAST, tx);
        runner.start().await;

        assert!(runner.dispatch(Command::EndSession).await);
        assert_eq!(next_finished(&mut rx).await, SessionStatus::EndedEarly);
        assert!(!runner.is_ticking());

        assert!(!runner.dispatch(Command::EndSession).await);
        tokio::time::sleep(FAST * 4).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_last_rep_set_finishes_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = SessionRunner::new(script(ActionType::Reps, 0, 1), FAST, tx);
        runner.start().await;

        assert!(runner.dispatch(Command::CompleteRepSet).await);
        assert_eq!(next_finished(&mut rx).await, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_restart_replaces_engine_and_ticker() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut runner = SessionRunner::new(script(ActionType::Timed, 600, 1), FAST, tx);
        runner.start().await;
        runner.dispatch(Command::Pause).await;

        let old_engine = runner.engine();
        runner.restart().await;
        let new_engine = runner.engine();

        assert!(!Arc::ptr_eq(&old_engine, &new_engine));
        assert!(runner.is_ticking());

        let engine = new_engine.lock().await;
        assert_eq!(engine.status(), SessionStatus::Running);
        assert!(!engine.state().is_paused);
        assert!(engine.event_log().is_empty());
        drop(engine);

        // The old engine is no longer ticked
        let frozen = old_engine.lock().await.state().clone();
        tokio::time::sleep(FAST * 4).await;
        assert_eq!(old_engine.lock().await.state(), &frozen);
    }

    #[tokio::test]
    async fn test_start_twice_keeps_one_ticker() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut runner = SessionRunner::new(script(ActionType::Timed, 600, 1), FAST, tx);
        assert!(runner.start().await);
        assert!(!runner.start().await);
        assert!(runner.is_ticking());

        runner.shutdown().await;
        assert!(!runner.is_ticking());
    }

    #[tokio::test]
    async fn test_queued_finish_from_replaced_engine_is_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = SessionRunner::new(script(ActionType::Timed, 1, 1), FAST, tx);
        runner.start().await;

        // Let the first engine finish without reading its notice
        let first = runner.engine();
        tokio::time::timeout(WAIT, async {
            while !first.lock().await.status().is_terminal() {
                tokio::time::sleep(FAST).await;
            }
        })
        .await
        .unwrap();

        runner.restart().await;

        let stale = next_notice(&mut rx).await;
        assert_eq!(stale.event, RunnerNotice::Finished(SessionStatus::Completed));
        assert!(!runner.is_current(&stale));

        // The replacement is untouched by the old notice
        let engine = runner.engine();
        assert_eq!(engine.lock().await.status(), SessionStatus::Running);

        let fresh = next_notice(&mut rx).await;
        assert!(runner.is_current(&fresh));
        assert_eq!(fresh.event, RunnerNotice::Finished(SessionStatus::Completed));
    }
}
