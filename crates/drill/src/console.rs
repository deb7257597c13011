//! Terminal front end: command grammar, status line and feedback prompt

use anyhow::Result;
use drill_core::{Command, Difficulty, Feedback, FeedbackPrompts, SessionStatus, TimerEngine};
use drill_util::format_countdown;
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufRead, Lines};

pub const HELP: &str = "\
Commands:
  p, pause          pause the countdown
  r, resume         resume after a pause
  s, skip           skip the rest of the current step
  rest [secs]       start a rest now
  more [secs]       lengthen the current rest
  d, done           confirm a finished set of reps
  restart           start the session over (progress is lost)
  end               end the session early
  status            show where you are
  q                 quit without saving
  h, help           show this list";

/// One line typed during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Engine(Command),
    Restart,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command '{0}' (type 'help' for the list)")]
    Unknown(String),

    #[error("'{0}' is not a number of seconds")]
    BadSeconds(String),
}

/// Seconds used by `rest` and `more` when none are given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDefaults {
    pub rest_seconds: u32,
    pub extend_seconds: u32,
}

fn seconds_arg(arg: Option<&str>, default: u32) -> Result<u32, CommandError> {
    match arg {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| CommandError::BadSeconds(raw.to_string())),
    }
}

/// Parse a console line; blank lines yield `None`
pub fn parse_command(
    line: &str,
    defaults: CommandDefaults,
) -> Result<Option<ConsoleCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let command = match verb.to_lowercase().as_str() {
        "p" | "pause" => ConsoleCommand::Engine(Command::Pause),
        "r" | "resume" => ConsoleCommand::Engine(Command::Resume),
        "s" | "skip" => ConsoleCommand::Engine(Command::Skip),
        "rest" => ConsoleCommand::Engine(Command::StartRest {
            seconds: seconds_arg(arg, defaults.rest_seconds)?,
        }),
        "more" => ConsoleCommand::Engine(Command::ExtendRest {
            seconds: seconds_arg(arg, defaults.extend_seconds)?,
        }),
        "d" | "done" => ConsoleCommand::Engine(Command::CompleteRepSet),
        "end" => ConsoleCommand::Engine(Command::EndSession),
        "restart" => ConsoleCommand::Restart,
        "status" => ConsoleCommand::Status,
        "h" | "help" | "?" => ConsoleCommand::Help,
        "q" | "quit" => ConsoleCommand::Quit,
        _ => return Err(CommandError::Unknown(verb.to_string())),
    };

    Ok(Some(command))
}

/// One-line description of where the session stands
pub fn status_line(engine: &TimerEngine) -> String {
    let state = engine.state();
    let total = engine.script().total_steps;

    match state.status {
        SessionStatus::Completed => return "Session complete".to_string(),
        SessionStatus::EndedEarly => return "Session ended early".to_string(),
        SessionStatus::Idle | SessionStatus::Running => {}
    }

    let Some(step) = engine.current_step() else {
        return format!("[{}]", state.status);
    };

    let mut line = format!(
        "Step {}/{} {} | set {}/{} | {}",
        state.step_index + 1,
        total,
        step.action_name,
        state.current_set,
        step.sets,
        step.requirement_label()
    );

    if state.is_resting {
        line.push_str(&format!(
            " | REST {}",
            format_countdown(state.rest_remaining_seconds)
        ));
    } else if step.action_type == drill_script::ActionType::Timed {
        line.push_str(&format!(" | {}", format_countdown(state.remaining_seconds)));
    } else {
        line.push_str(" | type 'd' when the set is done");
    }

    if state.current_set == step.sets
        && let Some(next) = engine.next_step()
    {
        line.push_str(&format!(" | next: {}", next.action_name));
    }

    if state.is_paused {
        line.push_str(" | PAUSED");
    }
    line
}

/// Ask until `parse` accepts the answer; `None` on end of input
async fn ask<R, W, T>(
    lines: &mut Lines<R>,
    out: &mut W,
    question: &str,
    mut parse: impl FnMut(&str) -> Result<T, String>,
) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        write!(out, "{} ", question)?;
        out.flush()?;

        let Some(answer) = lines.next_line().await? else {
            return Ok(None);
        };
        match parse(answer.trim()) {
            Ok(value) => return Ok(Some(value)),
            Err(message) => writeln!(out, "  {}", message)?,
        }
    }
}

fn required_text(answer: &str) -> Result<String, String> {
    if answer.is_empty() {
        Err("Please give a short reason".to_string())
    } else {
        Ok(answer.to_string())
    }
}

/// Collect post-session feedback; `None` if input ends first
pub async fn collect_feedback<R, W>(
    lines: &mut Lines<R>,
    out: &mut W,
    prompts: FeedbackPrompts,
) -> Result<Option<Feedback>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "How did it go?")?;

    let Some(difficulty) = ask(lines, out, "Difficulty [easy/ok/hard] (ok):", |answer| {
        if answer.is_empty() {
            return Ok(Difficulty::JustRight);
        }
        answer.parse::<Difficulty>().map_err(|e| e.to_string())
    })
    .await?
    else {
        return Ok(None);
    };

    let Some(fatigue) = ask(lines, out, "Fatigue 1-10 (5):", |answer| {
        if answer.is_empty() {
            return Ok(5);
        }
        match answer.parse::<u8>() {
            Ok(score) if (1..=10).contains(&score) => Ok(score),
            _ => Err("Enter a whole number from 1 to 10".to_string()),
        }
    })
    .await?
    else {
        return Ok(None);
    };

    let Some(notes) = ask(lines, out, "Pain or discomfort (optional):", |answer| {
        Ok(answer.to_string())
    })
    .await?
    else {
        return Ok(None);
    };

    let mut feedback = Feedback::new(difficulty, fatigue).with_discomfort_notes(notes);

    if prompts.skip_reason_required {
        let Some(reason) = ask(lines, out, "Why did you skip?", required_text).await? else {
            return Ok(None);
        };
        feedback = feedback.with_skip_reason(reason);
    }

    if prompts.end_reason_required {
        let Some(reason) = ask(lines, out, "Why did you stop early?", required_text).await? else {
            return Ok(None);
        };
        feedback = feedback.with_end_reason(reason);
    }

    Ok(Some(feedback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_script::{ActionType, SessionScript, Step};
    use drill_util::SessionId;
    use tokio::io::{AsyncBufReadExt, BufReader};

    const DEFAULTS: CommandDefaults = CommandDefaults {
        rest_seconds: 60,
        extend_seconds: 30,
    };

    fn parse(line: &str) -> Result<Option<ConsoleCommand>, CommandError> {
        parse_command(line, DEFAULTS)
    }

    #[test]
    fn test_parse_short_and_long_forms() {
        assert_eq!(parse("p"), Ok(Some(ConsoleCommand::Engine(Command::Pause))));
        assert_eq!(parse(" PAUSE "), Ok(Some(ConsoleCommand::Engine(Command::Pause))));
        assert_eq!(parse("r"), Ok(Some(ConsoleCommand::Engine(Command::Resume))));
        assert_eq!(parse("skip"), Ok(Some(ConsoleCommand::Engine(Command::Skip))));
        assert_eq!(parse("d"), Ok(Some(ConsoleCommand::Engine(Command::CompleteRepSet))));
        assert_eq!(parse("end"), Ok(Some(ConsoleCommand::Engine(Command::EndSession))));
        assert_eq!(parse("restart"), Ok(Some(ConsoleCommand::Restart)));
        assert_eq!(parse("status"), Ok(Some(ConsoleCommand::Status)));
        assert_eq!(parse("q"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(parse(""), Ok(None));
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_rest_seconds() {
        assert_eq!(
            parse("rest"),
            Ok(Some(ConsoleCommand::Engine(Command::StartRest { seconds: 60 })))
        );
        assert_eq!(
            parse("rest 90"),
            Ok(Some(ConsoleCommand::Engine(Command::StartRest { seconds: 90 })))
        );
        assert_eq!(
            parse("more"),
            Ok(Some(ConsoleCommand::Engine(Command::ExtendRest { seconds: 30 })))
        );
        assert_eq!(parse("more -5"), Err(CommandError::BadSeconds("-5".into())));
        assert_eq!(parse("jump"), Err(CommandError::Unknown("jump".into())));
    }

    fn one_step_engine(action_type: ActionType) -> TimerEngine {
        TimerEngine::new(SessionScript {
            session_id: SessionId::new("s"),
            session_name: "S".into(),
            total_steps: 1,
            steps: vec![Step {
                step_no: 1,
                action_name: "Plank".into(),
                action_type,
                sets: 2,
                target_seconds: 45,
                target_reps: 10,
                rest_seconds: 30,
                safety_tip: None,
                phase: None,
            }],
        })
    }

    #[test]
    fn test_status_line() {
        let mut engine = one_step_engine(ActionType::Timed);
        engine.start_session();
        assert_eq!(status_line(&engine), "Step 1/1 Plank | set 1/2 | 45 s | 00:45");

        engine.pause();
        assert!(status_line(&engine).ends_with("| PAUSED"));

        engine.start_rest(90);
        assert!(status_line(&engine).contains("REST 01:30"));

        engine.end_session();
        assert_eq!(status_line(&engine), "Session ended early");
    }

    #[test]
    fn test_status_line_names_next_step_on_last_set() {
        let mut script = one_step_engine(ActionType::Reps).script().clone();
        script.steps[0].sets = 1;
        let mut second = script.steps[0].clone();
        second.step_no = 2;
        second.action_name = "Bridge".into();
        script.steps.push(second);
        script.total_steps = 2;

        let mut engine = TimerEngine::new(script);
        engine.start_session();
        assert!(status_line(&engine).contains("| next: Bridge"));

        engine.complete_rep_set();
        assert!(!status_line(&engine).contains("next:"));
        assert!(status_line(&engine).starts_with("Step 2/2 Bridge"));
    }

    #[test]
    fn test_status_line_for_reps() {
        let mut engine = one_step_engine(ActionType::Reps);
        engine.start_session();
        assert!(status_line(&engine).contains("10 reps"));
        assert!(status_line(&engine).contains("type 'd'"));
    }

    async fn feedback_from(input: &str, prompts: FeedbackPrompts) -> Option<Feedback> {
        let mut lines = BufReader::new(input.as_bytes()).lines();
        let mut out = Vec::new();
        collect_feedback(&mut lines, &mut out, prompts).await.unwrap()
    }

    #[tokio::test]
    async fn test_feedback_defaults() {
        let feedback = feedback_from("\n\n\n", FeedbackPrompts::default())
            .await
            .unwrap();
        assert_eq!(feedback, Feedback::new(Difficulty::JustRight, 5));
    }

    #[tokio::test]
    async fn test_feedback_reprompts_invalid_answers() {
        let feedback = feedback_from("brutal\nhard\n11\nzero\n8\nleft knee\n", FeedbackPrompts::default())
            .await
            .unwrap();
        assert_eq!(feedback.difficulty, Difficulty::TooHard);
        assert_eq!(feedback.fatigue_score, 8);
        assert_eq!(feedback.discomfort_notes.as_deref(), Some("left knee"));
    }

    #[tokio::test]
    async fn test_feedback_requires_reasons() {
        let prompts = FeedbackPrompts {
            skip_reason_required: true,
            end_reason_required: true,
        };
        let feedback = feedback_from("easy\n3\n\n\nno bench\ncall\n", prompts)
            .await
            .unwrap();
        assert_eq!(feedback.skip_reason.as_deref(), Some("no bench"));
        assert_eq!(feedback.end_reason.as_deref(), Some("call"));
        assert_eq!(feedback.discomfort_notes, None);
    }

    #[tokio::test]
    async fn test_feedback_end_of_input() {
        assert_eq!(feedback_from("ok\n", FeedbackPrompts::default()).await, None);
    }
}
