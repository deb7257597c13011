//! Session script validation CLI tool
//!
//! Validates a drill session script and reports the first error found.

use drill_script::{ActionType, ScriptError};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let script_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("Usage: validate-script <script-file>");
            eprintln!();
            eprintln!("Validates a drill session script (JSON).");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-script session_20251229_legs.json");
            return ExitCode::from(2);
        }
    };

    if !script_path.exists() {
        eprintln!("Error: Session script not found: {}", script_path.display());
        return ExitCode::from(1);
    }

    match drill_script::load_script(&script_path) {
        Ok(script) => {
            println!("✓ Session script is valid");
            println!();
            println!("Summary:");
            println!("  Session: {} ({})", script.session_name, script.session_id);
            println!("  Steps: {}", script.total_steps);
            println!("  Planned sets: {}", script.planned_set_count());
            println!();
            println!("Steps:");
            for step in &script.steps {
                let kind_str = match step.action_type {
                    ActionType::Timed => format!("timed, {}", step.requirement_label()),
                    ActionType::Reps => format!("reps, {}", step.requirement_label()),
                };
                println!(
                    "  {}. {} [{}] x{} sets, {}s rest",
                    step.step_no, step.action_name, kind_str, step.sets, step.rest_seconds
                );
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Session script validation failed");
            eprintln!();
            match &e {
                ScriptError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ScriptError::MalformedInput(parse_err) => {
                    eprintln!("JSON parse error (check commas and quotes):");
                    eprintln!("  {}", parse_err);
                }
                ScriptError::Invalid(err) => {
                    eprintln!("Validation error:");
                    eprintln!("  - {}", err);
                }
                ScriptError::Unconvertible(err) => {
                    eprintln!("Unusable field value:");
                    eprintln!("  - {}", err);
                }
            }
            ExitCode::from(1)
        }
    }
}
