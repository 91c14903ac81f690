//! Operator CLI for the Hive reminder engine.
//!
//! Reads the on-disk state directory and runs engine passes against a
//! detached in-memory copy of it, with the in-process notification and
//! background adapters. Nothing reaches a real device and the persisted
//! handle ledgers are never rewritten. `settings set` and `settings reset`
//! are the only commands that write, and they write preferences only.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hive::platform::NotificationTrigger;
use hive::platform::memory::{InMemoryNotificationScheduler, InMemoryRegistrar};
use hive::state::{FileStateStore, MemoryStateStore};
use hive::{
    ApplyReport, EngineConfig, Preferences, PreferencesPatch, ReminderEngine, SettingsStore, Task,
    hive_dirs,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Hive reminders: inspect and drive the reminder scheduling engine.
#[derive(Parser)]
#[command(name = "hive-reminders", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the durable state slots.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Also write a daily-rotated log file under the logs directory.
    #[arg(long)]
    log_file: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Print the reminders that would be scheduled now.
    Plan {
        /// JSON task list to plan for instead of the cached snapshot.
        #[arg(long)]
        tasks: Option<PathBuf>,
    },

    /// Show or change reminder preferences.
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Preview one full reconciliation pass.
    Apply {
        /// JSON task list to apply instead of the cached snapshot.
        #[arg(long)]
        tasks: Option<PathBuf>,
    },

    /// Preview the background trigger handler.
    Background,

    /// Schedule throwaway test notifications.
    TestBurst {
        /// Number of notifications.
        #[arg(long, default_value_t = 3)]
        count: u32,

        /// Seconds between notifications.
        #[arg(long, default_value_t = 5)]
        spacing: u64,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current preferences.
    Show,

    /// Save preferences and preview the resulting pass.
    Set {
        /// Turn reminders on or off.
        #[arg(long)]
        enabled: Option<bool>,

        /// Background cadence in minutes (clamped to 15..=240).
        #[arg(long)]
        cadence: Option<i64>,
    },

    /// Save default preferences and preview the resulting pass.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file);

    let config = match cli.config {
        Some(ref path) => EngineConfig::from_file(path)?,
        None => EngineConfig::load_or_default(&EngineConfig::default_config_path()),
    };
    let store = match cli.state_dir {
        Some(dir) => FileStateStore::new(dir),
        None => FileStateStore::open_default(),
    };

    match cli.command {
        Command::Plan { tasks } => {
            let engine = dry_engine(&config, &store).await?;
            run_plan(&engine, tasks.as_deref()).await
        }
        Command::Settings { action } => {
            run_settings(&config, &store, action.unwrap_or(SettingsAction::Show)).await
        }
        Command::Apply { tasks } => {
            let tasks = tasks.as_deref().map(read_tasks).transpose()?;
            let engine = dry_engine(&config, &store).await?;
            let report = engine.apply_all(tasks.as_deref()).await;
            print_report(&report);
            Ok(())
        }
        Command::Background => {
            let engine = dry_engine(&config, &store).await?;
            let result = engine.run_background_refresh().await;
            println!("Background refresh: {result}");
            Ok(())
        }
        Command::TestBurst { count, spacing } => {
            let engine = dry_engine(&config, &store).await?;
            let handles = engine.send_test_burst(count, spacing).await?;
            println!("Scheduled {} test notification(s):", handles.len());
            for handle in handles {
                println!("  - {handle}");
            }
            Ok(())
        }
    }
}

/// Engine over a detached copy of `store` and the in-process adapters.
///
/// The in-process scheduler never held the device's notifications, so a
/// pass must not overwrite the real handle ledger.
async fn dry_engine(
    config: &EngineConfig,
    store: &FileStateStore,
) -> anyhow::Result<ReminderEngine> {
    let copy = MemoryStateStore::copy_of(store)
        .await
        .with_context(|| format!("reading state from {}", store.dir().display()))?;
    Ok(ReminderEngine::new(
        config.clone(),
        Arc::new(copy),
        Arc::new(InMemoryNotificationScheduler::new()),
        Arc::new(InMemoryRegistrar::new()),
    ))
}

/// Stderr logging, plus a rolling file when requested.
///
/// The returned guard must live until exit so buffered file output is flushed.
fn init_tracing(log_file: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hive=info"));

    let (file_layer, guard) = if log_file {
        let dir = hive_dirs::logs_dir();
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&dir, "hive-reminders.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("cannot create log directory {}: {e}", dir.display());
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn read_tasks(path: &Path) -> anyhow::Result<Vec<Task>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading task list {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing task list {}", path.display()))
}

async fn run_plan(engine: &ReminderEngine, tasks: Option<&Path>) -> anyhow::Result<()> {
    let tasks = tasks.map(read_tasks).transpose()?;
    let specs = engine.preview(tasks.as_deref()).await;
    if specs.is_empty() {
        println!("No reminders planned.");
        return Ok(());
    }
    println!("{} reminder(s) planned:", specs.len());
    for spec in &specs {
        let trigger = NotificationTrigger::from(&spec.fire_at);
        let task = spec
            .correlation_id
            .as_ref()
            .map_or_else(|| "-".to_owned(), ToString::to_string);
        println!(
            "  {trigger:<32} [{}] task {task}: {}",
            spec.category, spec.body
        );
    }
    Ok(())
}

async fn run_settings(
    config: &EngineConfig,
    store: &FileStateStore,
    action: SettingsAction,
) -> anyhow::Result<()> {
    let settings = SettingsStore::new(Arc::new(store.clone()));
    match action {
        SettingsAction::Show => {
            print_preferences(&settings.get().await);
            return Ok(());
        }
        SettingsAction::Set { enabled, cadence } => {
            if enabled.is_none() && cadence.is_none() {
                anyhow::bail!("nothing to change: pass --enabled and/or --cadence");
            }
            settings
                .update(PreferencesPatch {
                    enabled,
                    cadence_minutes: cadence,
                })
                .await?;
        }
        SettingsAction::Reset => {
            settings.reset().await?;
        }
    }
    // Preferences are saved for real; the app applies them on its next pass.
    let report = dry_engine(config, store).await?.apply_all(None).await;
    print_report(&report);
    Ok(())
}

fn print_preferences(prefs: &Preferences) {
    println!("Reminders: {}", if prefs.enabled { "on" } else { "off" });
    println!("Cadence:   every {} min", prefs.cadence_minutes);
}

fn print_report(report: &ApplyReport) {
    print_preferences(&report.preferences);
    let reminders = &report.reminders;
    println!("Permission: {:?}", reminders.permission);
    println!(
        "Reminders: {} planned, {} scheduled, {} failed, {} cancelled",
        report.planned,
        reminders.scheduled.len(),
        reminders.schedule_failures,
        reminders.cancelled
    );
    if report.legacy_cancelled > 0 {
        println!("Legacy summaries cancelled: {}", report.legacy_cancelled);
    }
    if !reminders.persisted {
        println!("Warning: handle ledger could not be saved");
    }
    match (&report.cadence, &report.cadence_error) {
        (Some(state), _) => println!("Background: {state}"),
        (None, Some(e)) => println!("Background: not updated ({e})"),
        (None, None) => println!("Background: unknown"),
    }
}
