//! drill - guided workout sessions in the terminal
//!
//! This is the main entry point for the drill driver.
//! It wires together all the components:
//! - Configuration loading
//! - Session script loading (explicit path or today's scheduled file)
//! - Session runner (engine + ticker)
//! - Feedback collection
//! - Store, file archive and remote upload

mod config;
mod console;
mod runner;
mod uploader;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::{load_config, Config};
use console::{collect_feedback, parse_command, status_line, CommandDefaults, ConsoleCommand, HELP};
use drill_core::{Command, TickOutcome};
use drill_script::{find_today_session, load_script, SessionScript, TodaySession};
use drill_store::{export_json, FileArchive, SessionArchive, SqliteStore, Store};
use drill_util::{
    default_config_path, default_data_dir, file_stamp, format_datetime_full, sessions_dir_in,
    DRILL_DATA_DIR_ENV,
};
use runner::{Notice, RunnerNotice, SessionRunner};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uploader::Uploader;

/// drill - guided workout sessions in the terminal
#[derive(Parser, Debug)]
#[command(name = "drill")]
#[command(about = "Run guided workout sessions with countdowns, rests and feedback", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/drill/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set DRILL_DATA_DIR env var)
    #[arg(short, long, env = DRILL_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run a session script
    Run {
        /// Session script (JSON)
        script: Option<PathBuf>,

        /// Use the script scheduled for today in the sessions directory
        #[arg(long, conflicts_with = "script")]
        today: bool,
    },

    /// Show the most recently saved sessions
    Last {
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Write the last saved session as session_result.json and event_logs.json
    Export {
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// How a session run ended on the driver side
enum RunEnd {
    Terminal,
    Quit,
}

/// Driver state shared by all subcommands
struct App {
    config: Config,
    data_dir: PathBuf,
    store: Arc<dyn Store>,
    archive: FileArchive,
    uploader: Option<Uploader>,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let config = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(config_path = %args.config.display(), "Configuration loaded");

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(default_data_dir);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("drill.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        let uploader = match &config.save.endpoint {
            Some(endpoint) => Some(
                Uploader::new(endpoint.clone(), config.save.timeout)
                    .context("Failed to create HTTP client")?,
            ),
            None => None,
        };

        Ok(Self {
            archive: FileArchive::new(&data_dir),
            config,
            data_dir,
            store,
            uploader,
        })
    }

    fn sessions_dir(&self) -> PathBuf {
        self.config
            .sessions_dir
            .clone()
            .unwrap_or_else(|| sessions_dir_in(&self.data_dir))
    }

    fn resolve_script(
        &self,
        script: Option<PathBuf>,
        today: bool,
    ) -> Result<(SessionScript, PathBuf)> {
        if let Some(path) = script {
            let script = load_script(&path)
                .with_context(|| format!("Failed to load session script {:?}", path))?;
            return Ok((script, path));
        }

        if !today {
            bail!("Pass a session script path, or --today to use today's scheduled session");
        }

        let sessions_dir = self.sessions_dir();
        let day = drill_util::now().date_naive();
        match find_today_session(&sessions_dir, day) {
            TodaySession::Found { path, script } => {
                println!("Today's session: {}", path.display());
                Ok((script, path))
            }
            other => {
                let code = other.status_code().unwrap_or("UNKNOWN");
                match other {
                    TodaySession::InvalidFile(detail) | TodaySession::InvalidContract(detail) => {
                        bail!("{}: {}", code, detail)
                    }
                    _ => bail!("{}: nothing scheduled under {}", code, sessions_dir.display()),
                }
            }
        }
    }

    async fn run_session(&self, script: SessionScript, script_path: PathBuf) -> Result<()> {
        let mut out = std::io::stdout();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!(
            "{} ({} steps, {} sets)",
            script.session_name,
            script.total_steps,
            script.planned_set_count()
        );
        println!("{}", HELP);
        println!();

        let (tx, mut notices) = mpsc::unbounded_channel();
        let mut runner = SessionRunner::new(script, self.config.tick_interval, tx);
        runner.start().await;

        let end = self.drive(&mut runner, &mut notices, &mut lines).await?;
        runner.shutdown().await;

        if let RunEnd::Quit = end {
            println!("Session abandoned; nothing was saved.");
            return Ok(());
        }

        let engine = runner.engine();
        let prompts = engine.lock().await.feedback_prompts();
        println!();
        println!("{}", status_line(&*engine.lock().await));

        let Some(feedback) = collect_feedback(&mut lines, &mut out, prompts).await? else {
            warn!("Input closed before feedback was complete");
            println!("Feedback not completed; nothing was saved.");
            return Ok(());
        };

        let archive = {
            let mut engine = engine.lock().await;
            engine.submit_feedback(&feedback);
            SessionArchive::from_engine(&engine, &feedback, Some(script_path))
        };

        self.save(&archive).await;
        print_result(&archive);
        Ok(())
    }

    /// Feed console commands to the runner until the session is over
    async fn drive<R>(
        &self,
        runner: &mut SessionRunner,
        notices: &mut mpsc::UnboundedReceiver<Notice>,
        lines: &mut Lines<R>,
    ) -> Result<RunEnd>
    where
        R: AsyncBufRead + Unpin,
    {
        let defaults = CommandDefaults {
            rest_seconds: self.config.manual_rest_seconds,
            extend_seconds: self.config.rest_extend_seconds,
        };

        print_status(runner).await;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, ending session early");
                    runner.dispatch(Command::EndSession).await;
                }

                Some(notice) = notices.recv() => {
                    if !runner.is_current(&notice) {
                        debug!(
                            generation = notice.generation,
                            "Dropping notice from a replaced session"
                        );
                        continue;
                    }
                    match notice.event {
                        RunnerNotice::Finished(status) => {
                            info!(status = %status, "Session finished");
                            return Ok(RunEnd::Terminal);
                        }
                        RunnerNotice::Progress(outcome) => {
                            match outcome {
                                TickOutcome::RestEnded => println!("Rest over."),
                                TickOutcome::StepAdvanced => println!("Next step."),
                                TickOutcome::SetFinished => println!("Set done."),
                                _ => {}
                            }
                            print_status(runner).await;
                        }
                    }
                }

                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read from stdin")? else {
                        debug!("Input closed during session");
                        return Ok(RunEnd::Quit);
                    };

                    match parse_command(&line, defaults) {
                        Ok(None) => {}
                        Ok(Some(ConsoleCommand::Engine(command))) => {
                            if runner.dispatch(command).await {
                                print_status(runner).await;
                            } else {
                                println!("(not possible right now)");
                            }
                        }
                        Ok(Some(ConsoleCommand::Restart)) => {
                            runner.restart().await;
                            println!("Restarted from the first step.");
                            print_status(runner).await;
                        }
                        Ok(Some(ConsoleCommand::Status)) => print_status(runner).await,
                        Ok(Some(ConsoleCommand::Help)) => println!("{}", HELP),
                        Ok(Some(ConsoleCommand::Quit)) => return Ok(RunEnd::Quit),
                        Err(e) => println!("{}", e),
                    }
                }
            }
        }
    }

    /// Save locally, archive, then upload; each failure is reported and the rest still run
    async fn save(&self, archive: &SessionArchive) {
        let stamp = file_stamp(&drill_util::now());

        match self.store.save_session(archive) {
            Ok(id) => println!("Saved to history (#{})", id),
            Err(e) => {
                warn!(error = %e, "Failed to save session to history");
                println!("Could not save to history: {}", e);
            }
        }

        let archived = match self.archive.write(archive, &stamp) {
            Ok(files) => {
                println!("Run summary: {}", files.run_file_path.display());
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to write file archive");
                println!("Could not write the file archive: {}", e);
                false
            }
        };

        let Some(uploader) = &self.uploader else {
            return;
        };

        match uploader.upload(archive, &stamp).await {
            Ok(saved) => println!(
                "Remote save succeeded: {}",
                saved.location().unwrap_or(uploader.endpoint())
            ),
            Err(e) => {
                warn!(endpoint = uploader.endpoint(), error = %e, "Remote save failed");
                if archived {
                    println!(
                        "Remote save failed: {}. The JSON files are in {}",
                        e,
                        self.archive.inbox_dir().display()
                    );
                } else {
                    println!("Remote save failed: {}. Use `drill export` to write the JSON.", e);
                }
            }
        }
    }

    fn show_last(&self, limit: usize) -> Result<()> {
        let sessions = self
            .store
            .recent_sessions(limit)
            .context("Failed to read session history")?;

        if sessions.is_empty() {
            println!("No saved sessions yet.");
            return Ok(());
        }

        for s in sessions {
            println!(
                "#{:<4} {}  {}  {}/{} steps  {}s{}",
                s.id,
                format_datetime_full(&s.saved_at),
                s.session_name,
                s.completed_steps,
                s.planned_steps,
                s.duration_seconds,
                if s.ended_early { "  (ended early)" } else { "" }
            );
        }
        Ok(())
    }

    fn export_last(&self, out: PathBuf) -> Result<()> {
        let Some(archive) = self
            .store
            .load_last_session()
            .context("Failed to read session history")?
        else {
            bail!("No saved session to export");
        };

        let files = export_json(&out, &archive.result, &archive.event_logs)
            .with_context(|| format!("Failed to export to {:?}", out))?;

        println!("{}", files.session_result_path.display());
        println!("{}", files.event_logs_path.display());
        Ok(())
    }
}

async fn print_status(runner: &SessionRunner) {
    let engine = runner.engine();
    let line = status_line(&*engine.lock().await);
    println!("{}", line);
    let _ = std::io::stdout().flush();
}

fn print_result(archive: &SessionArchive) {
    let result = &archive.result;
    println!();
    println!("{}", result.session_name);
    println!(
        "  steps {}/{}  sets {}/{}  {}s",
        result.completed_steps,
        result.planned_steps,
        result.completed_sets,
        result.planned_sets,
        result.duration_seconds
    );
    println!(
        "  difficulty {}  fatigue {}/10",
        result.overall_difficulty, result.fatigue_score
    );
    if result.ended_early {
        println!(
            "  ended early at step {}",
            result
                .ended_on_step_no
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into())
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "drill starting");

    if drill_util::is_mock_time_active() {
        warn!(now = %drill_util::now(), "Mock time is active");
    }

    let app = App::new(&args)?;

    match args.command {
        Cmd::Run { script, today } => {
            let (script, path) = app.resolve_script(script, today)?;
            app.run_session(script, path).await
        }
        Cmd::Last { limit } => app.show_last(limit),
        Cmd::Export { out } => app.export_last(out),
    }
}
