//! CLI binary for agenda.

use std::path::PathBuf;
use std::sync::Arc;

use agenda::store::{NewReminder, NewSession, Reminder, ReminderStore, TimerKind};
use agenda::time::{now_minute, parse_minute, to_display};
use agenda::{AgendaConfig, ExportSink, NotificationSink, Poller, app_dirs, export, notify};
use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Agenda: recurring reminders and interval-timer history.
#[derive(Parser)]
#[command(name = "agenda", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the reminder database (overrides the config).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Fire due reminders in the background until Ctrl+C.
    Run,

    /// Run a single poll iteration and print what happened.
    Poll {
        /// Pretend the current time is this (`YYYY-MM-DD HH:MM`).
        #[arg(long)]
        at: Option<String>,
    },

    /// Create a reminder.
    Add(AddArgs),

    /// List all reminders, soonest first.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Enable or disable a reminder (flips it when neither flag is given).
    Toggle {
        id: i64,
        #[arg(long, conflicts_with = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
    },

    /// Delete a reminder.
    Delete { id: i64 },

    /// Show reminders that would fire now, without firing them.
    Due {
        /// Evaluate at this time (`YYYY-MM-DD HH:MM`) instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Export a reminder as calendar files.
    Export {
        id: i64,
        /// Output directory (overrides the config).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Interval-timer session history.
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Args)]
struct AddArgs {
    /// Reminder title, also shown in the alert.
    title: String,

    /// When to fire (`YYYY-MM-DD HH:MM`).
    #[arg(long, required_unless_present = "in_minutes", conflicts_with = "in_minutes")]
    at: Option<String>,

    /// Fire this many minutes from now.
    #[arg(long = "in", value_name = "MINUTES")]
    in_minutes: Option<u32>,

    /// Repeat rule: none, daily, weekly or weekdays.
    #[arg(long, default_value = "none")]
    repeat: String,

    /// Notes kept with the reminder.
    #[arg(long, default_value = "")]
    description: String,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Record a finished timer session.
    Log {
        /// Timer kind: pomodoro or tabata.
        #[arg(long, default_value = "tabata")]
        kind: TimerKind,
        /// Rounds or cycles (default: 8 for tabata, 4 for pomodoro).
        #[arg(long)]
        rounds: Option<u32>,
        /// Work phase length in seconds.
        #[arg(long)]
        work: Option<u32>,
        /// Rest phase length in seconds.
        #[arg(long)]
        rest: Option<u32>,
        /// Start time (`YYYY-MM-DD HH:MM`, default now).
        #[arg(long)]
        at: Option<String>,
        /// Record the session as abandoned.
        #[arg(long)]
        incomplete: bool,
    },

    /// Show sessions recorded on a day.
    Today {
        /// Only count this timer kind.
        #[arg(long)]
        kind: Option<TimerKind>,
        /// Day to show (`YYYY-MM-DD`, default today).
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Only the long-running poller writes a log file.
    let _guard = init_tracing(matches!(cli.command, Command::Run));

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AgendaConfig::default_config_path);
    let config = AgendaConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| config.storage.resolved_database_path());
    let store = Arc::new(
        ReminderStore::open(&db_path)
            .with_context(|| format!("opening {}", db_path.display()))?,
    );

    match cli.command {
        Command::Run => run_poller(store, &config).await,
        Command::Poll { at } => poll_once(store, &config, at.as_deref()),
        Command::Add(args) => add_reminder(&store, args),
        Command::List { json } => list_reminders(&store, json),
        Command::Toggle { id, on, off } => toggle_reminder(&store, id, on, off),
        Command::Delete { id } => {
            store.delete_reminder(id)?;
            println!("Deleted reminder {id}");
            Ok(())
        }
        Command::Due { at } => show_due(&store, &config, at.as_deref()),
        Command::Export { id, dir } => export_reminder(&store, &config, id, dir),
        Command::Session(cmd) => session(&store, cmd),
    }
}

/// Stderr logging filtered by `RUST_LOG`, plus a daily log file when asked.
fn init_tracing(log_to_file: bool) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agenda=info"));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file = if log_to_file {
        let dir = app_dirs::logs_dir();
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("agenda")
            .filename_suffix("log")
            .build(&dir)
        {
            Ok(appender) => Some(tracing_appender::non_blocking(appender)),
            Err(e) => {
                eprintln!("warning: file logging disabled ({}): {e}", dir.display());
                None
            }
        }
    } else {
        None
    };

    match file {
        Some((writer, guard)) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

fn build_poller(store: Arc<ReminderStore>, config: &AgendaConfig) -> Poller {
    let sink: Arc<dyn NotificationSink> = Arc::new(notify::from_config(&config.notifications));
    Poller::new(store, sink)
        .with_poll_interval(config.scheduler.poll_interval())
        .with_horizon(config.scheduler.debounce_horizon())
}

async fn run_poller(store: Arc<ReminderStore>, config: &AgendaConfig) -> anyhow::Result<()> {
    println!("Agenda v{}", env!("CARGO_PKG_VERSION"));

    let mut poller = build_poller(store, config);
    poller.start()?;
    println!(
        "Watching reminders every {}s. Press Ctrl+C to stop.",
        config.scheduler.poll_interval_secs
    );

    tokio::signal::ctrl_c().await?;
    info!("received Ctrl+C, shutting down...");
    poller.shutdown().await;
    Ok(())
}

fn poll_once(
    store: Arc<ReminderStore>,
    config: &AgendaConfig,
    at: Option<&str>,
) -> anyhow::Result<()> {
    let now = match at {
        Some(raw) => parse_minute(raw)?,
        None => now_minute(),
    };
    let report = build_poller(store, config).tick(now);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn add_reminder(store: &ReminderStore, args: AddArgs) -> anyhow::Result<()> {
    let when = match (args.at, args.in_minutes) {
        (Some(at), _) => at,
        (None, Some(minutes)) => {
            to_display(now_minute() + chrono::Duration::minutes(i64::from(minutes)))
        }
        (None, None) => anyhow::bail!("either --at or --in is required"),
    };
    let req = NewReminder::from_input(&args.title, &when, &args.repeat)?
        .with_description(args.description.trim());
    let id = store.add_reminder(&req)?;
    println!(
        "Added reminder {id}: {} at {} ({})",
        req.title,
        to_display(req.scheduled_at),
        req.repeat
    );
    Ok(())
}

fn list_reminders(store: &ReminderStore, json: bool) -> anyhow::Result<()> {
    let reminders = store.list_reminders()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&reminders)?);
        return Ok(());
    }
    if reminders.is_empty() {
        println!("No reminders.");
        return Ok(());
    }
    for r in &reminders {
        print_reminder(r);
    }
    Ok(())
}

fn print_reminder(r: &Reminder) {
    let id = r.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_owned());
    let state = if r.enabled { "on" } else { "off" };
    let last = r
        .last_fired_at
        .map(|t| format!("  (last fired {})", to_display(t)))
        .unwrap_or_default();
    println!(
        "{id:>4}  {}  {:<8}  {state:<3}  {}{last}",
        to_display(r.scheduled_at),
        r.repeat,
        r.title
    );
}

fn toggle_reminder(store: &ReminderStore, id: i64, on: bool, off: bool) -> anyhow::Result<()> {
    let current = store
        .get_reminder(id)?
        .with_context(|| format!("reminder {id} does not exist"))?;
    let enabled = if on {
        true
    } else if off {
        false
    } else {
        !current.enabled
    };
    store.set_enabled(id, enabled)?;
    println!(
        "Reminder {id} {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn show_due(store: &ReminderStore, config: &AgendaConfig, at: Option<&str>) -> anyhow::Result<()> {
    let now = match at {
        Some(raw) => parse_minute(raw)?,
        None => now_minute(),
    };
    let due = store.due_reminders(now, config.scheduler.effective_horizon())?;
    if due.is_empty() {
        println!("Nothing due at {}.", to_display(now));
    }
    for r in &due {
        print_reminder(r);
    }
    Ok(())
}

fn export_reminder(
    store: &ReminderStore,
    config: &AgendaConfig,
    id: i64,
    dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let reminder = store
        .get_reminder(id)?
        .with_context(|| format!("reminder {id} does not exist"))?;

    let mut export_config = config.export.clone();
    if dir.is_some() {
        export_config.ics_dir = dir;
    }
    let exporter = export::from_config(&export_config);
    let report =
        exporter.export_reminder(&reminder.title, reminder.scheduled_at, &reminder.description);

    for (channel, outcome) in &report.channels {
        match outcome {
            Ok(id) => println!("{channel}: {id}"),
            Err(msg) => println!("{channel}: failed: {msg}"),
        }
    }
    report.into_result()?;
    println!("Files written to {}", export_config.resolved_ics_dir().display());
    Ok(())
}

fn session(store: &ReminderStore, cmd: SessionCommand) -> anyhow::Result<()> {
    match cmd {
        SessionCommand::Log {
            kind,
            rounds,
            work,
            rest,
            at,
            incomplete,
        } => {
            let (def_rounds, def_work, def_rest) = match kind {
                TimerKind::Tabata => (8, 20, 10),
                TimerKind::Pomodoro => (4, 25 * 60, 5 * 60),
            };
            let started_at = match at {
                Some(raw) => parse_minute(&raw)?,
                None => now_minute(),
            };
            let mut session = NewSession::completed(
                kind,
                started_at,
                rounds.unwrap_or(def_rounds),
                work.unwrap_or(def_work),
                rest.unwrap_or(def_rest),
            );
            session.completed = !incomplete;
            let id = store.add_session(&session)?;
            println!(
                "Logged {kind} session {id}: {} x {}s/{}s",
                session.rounds, session.work_secs, session.rest_secs
            );
            Ok(())
        }
        SessionCommand::Today { kind, date } => {
            let day = match date {
                Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .with_context(|| format!("invalid date '{raw}' (expected YYYY-MM-DD)"))?,
                None => now_minute().date(),
            };
            let count = store.count_completed_sessions_on(day, kind)?;
            let label = kind.map(|k| k.as_str()).unwrap_or("timer");
            println!("{count} completed {label} session(s) on {day}");
            for s in store.list_sessions_on(day)? {
                if kind.is_some_and(|k| k != s.kind) {
                    continue;
                }
                println!(
                    "{:>4}  {}  {:<8}  {} x {}s/{}s{}",
                    s.id,
                    to_display(s.started_at),
                    s.kind,
                    s.rounds,
                    s.work_secs,
                    s.rest_secs,
                    if s.completed { "" } else { "  (abandoned)" }
                );
            }
            Ok(())
        }
    }
}
