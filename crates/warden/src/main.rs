//! Warden: convergence daemon for a managed Prometheus unit.
//!
//! Subcommands:
//! - `daemon`: watch the settings file and trigger spool, converging on
//!   every change
//! - `trigger`: run a single convergence pass for one hook
//! - `status`: print the last recorded status and pending actions

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden_engine::{PendingActions, Status};
use warden_host::JsonDashboard;
use warden_store::{FactStore, FileKv};

mod daemon;
mod hooks;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Convergence daemon for a managed Prometheus unit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the convergence daemon (settings watcher, trigger spool)
    Daemon {
        /// Settings file
        #[arg(long, env = "WARDEN_SETTINGS", default_value = "/etc/warden/settings.yaml")]
        settings: PathBuf,

        /// Persistent state directory
        #[arg(long, env = "WARDEN_STATE_DIR", default_value = "/var/lib/warden")]
        state_dir: PathBuf,

        /// Trigger spool directory (defaults to <state-dir>/spool)
        #[arg(long, env = "WARDEN_SPOOL_DIR")]
        spool_dir: Option<PathBuf>,

        /// Poll interval in seconds
        #[arg(long, default_value = "5")]
        poll_interval: u64,
    },

    /// Run a single convergence pass for one hook
    Trigger {
        /// Hook name, e.g. config-changed or targets-changed
        hook: String,

        /// Inline JSON payload for the hook
        #[arg(long)]
        payload: Option<String>,

        /// Read the JSON payload from a file
        #[arg(long, conflicts_with = "payload")]
        payload_file: Option<PathBuf>,

        /// Settings file
        #[arg(long, env = "WARDEN_SETTINGS", default_value = "/etc/warden/settings.yaml")]
        settings: PathBuf,

        /// Persistent state directory
        #[arg(long, env = "WARDEN_STATE_DIR", default_value = "/var/lib/warden")]
        state_dir: PathBuf,
    },

    /// Print the last recorded status and pending actions as JSON
    Status {
        /// Persistent state directory
        #[arg(long, env = "WARDEN_STATE_DIR", default_value = "/var/lib/warden")]
        state_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warden=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            settings,
            state_dir,
            spool_dir,
            poll_interval,
        } => {
            let spool_dir = spool_dir.unwrap_or_else(|| state_dir.join("spool"));
            daemon::run(daemon::DaemonConfig {
                settings_path: settings,
                state_dir,
                spool_dir,
                poll_interval,
            })
            .await
        }

        Commands::Trigger {
            hook,
            payload,
            payload_file,
            settings,
            state_dir,
        } => run_trigger(&hook, payload, payload_file, &settings, &state_dir),

        Commands::Status { state_dir } => print_status(&state_dir),
    }
}

fn run_trigger(
    hook: &str,
    payload: Option<String>,
    payload_file: Option<PathBuf>,
    settings_path: &Path,
    state_dir: &Path,
) -> Result<()> {
    let payload = match (payload, payload_file) {
        (Some(text), _) => Some(serde_json::from_str(&text).into_diagnostic()?),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(&path).into_diagnostic()?;
            Some(serde_json::from_str(&text).into_diagnostic()?)
        }
        (None, None) => None,
    };
    let trigger = hooks::parse(hook, payload)?;

    let settings = Settings::load(settings_path)?;
    std::fs::create_dir_all(state_dir).into_diagnostic()?;
    let mut engine = settings.build_engine(state_dir)?;

    let status = engine.run_pass(&trigger).into_diagnostic()?;
    if let Some(path) = &settings.dashboard {
        let sink = JsonDashboard::new(path.clone());
        engine.publish_dashboard(&sink).into_diagnostic()?;
    }

    println!("{}", status);
    Ok(())
}

fn print_status(state_dir: &Path) -> Result<()> {
    let kv = FileKv::open(state_dir.join("facts.json")).into_diagnostic()?;
    let facts = FactStore::new(Box::new(kv));

    let status: Option<Status> = facts.get("status").into_diagnostic()?;
    let pending: Option<PendingActions> = facts.get("pending_actions").into_diagnostic()?;

    let report = serde_json::json!({
        "status": status,
        "pending_actions": pending.unwrap_or_default(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).into_diagnostic()?
    );
    Ok(())
}
