//! Long-running convergence daemon.
//!
//! One loop drives everything: each tick re-checks the settings file and
//! drains the trigger spool directory, running passes strictly in order.
//! The engine is single-writer state, so no trigger ever runs
//! concurrently with another.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use miette::{IntoDiagnostic, Result};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use warden_engine::{Engine, Trigger};
use warden_host::JsonDashboard;

use crate::hooks;
use crate::settings::Settings;

/// Configuration for the daemon loop.
pub struct DaemonConfig {
    pub settings_path: PathBuf,
    pub state_dir: PathBuf,
    pub spool_dir: PathBuf,
    pub poll_interval: u64,
}

/// Run the daemon until interrupted.
pub async fn run(config: DaemonConfig) -> Result<()> {
    info!(
        settings = %config.settings_path.display(),
        state_dir = %config.state_dir.display(),
        spool_dir = %config.spool_dir.display(),
        poll_interval_secs = config.poll_interval,
        "starting warden daemon"
    );

    std::fs::create_dir_all(&config.state_dir).into_diagnostic()?;
    std::fs::create_dir_all(&config.spool_dir).into_diagnostic()?;

    let mut settings = Settings::load(&config.settings_path)?;
    let mut engine = settings.build_engine(&config.state_dir)?;
    let mut settings_mtime = mtime(&config.settings_path);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    // Converge once at startup; with nothing changed since the last run
    // this is a no-op against the persisted fingerprints.
    run_one(&mut engine, &Trigger::ConfigChanged, &settings);

    let mut interval = tokio::time::interval(Duration::from_secs(config.poll_interval));
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }

            _ = interval.tick() => {
                let current_mtime = mtime(&config.settings_path);
                if current_mtime != settings_mtime {
                    settings_mtime = current_mtime;
                    match Settings::load(&config.settings_path) {
                        Ok(reloaded) => {
                            info!("settings file changed, reloading");
                            engine.set_options(reloaded.options.clone());
                            settings = reloaded;
                            run_one(&mut engine, &Trigger::ConfigChanged, &settings);
                        }
                        Err(e) => {
                            warn!(error = %e, "settings reload failed, keeping previous options");
                        }
                    }
                }

                for (path, trigger) in drain_spool(&config.spool_dir) {
                    debug!(path = %path.display(), trigger = trigger.name(), "spool file picked up");
                    run_one(&mut engine, &trigger, &settings);
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %e, "failed to remove spool file");
                    }
                }
            }
        }
    }

    info!("daemon shut down");
    Ok(())
}

fn run_one(engine: &mut Engine, trigger: &Trigger, settings: &Settings) {
    match engine.run_pass(trigger) {
        Ok(status) => {
            debug!(status = %status, "pass complete");
            if let Some(path) = &settings.dashboard {
                let sink = JsonDashboard::new(path.clone());
                if let Err(e) = engine.publish_dashboard(&sink) {
                    warn!(error = %e, "dashboard publish failed");
                }
            }
        }
        Err(e) => {
            // Status is already blocked; pending actions persist and
            // retry on the next trigger.
            error!(error = %e, trigger = trigger.name(), "pass failed");
        }
    }
}

/// Spool files in filename order, parsed as serialized triggers.
/// Malformed files are discarded with a warning so they cannot wedge the
/// queue.
fn drain_spool(dir: &Path) -> Vec<(PathBuf, Trigger)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to read spool directory");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut triggers = Vec::new();
    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(text) => match hooks::parse_spool(&text) {
                Ok(trigger) => triggers.push((path, trigger)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding malformed spool file");
                    let _ = std::fs::remove_file(&path);
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read spool file");
            }
        }
    }
    triggers
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
