//! File watching for hot config reloading.
//!
//! The config directory is watched non-recursively (editors often replace
//! files instead of writing them in place) and every change touching
//! `hydrated.toml` sends one debounced reload event to the daemon loop.

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use crate::common::constants::{CONFIG_DEBOUNCE_MS, CONFIG_FILE_NAME};
use crate::common::utils::private_path;
use crate::io::signals::SignalMessage;

/// Whether a filesystem event concerns the config file (including editor temp names).
fn affects_config(event: &Event, config_path: &Path) -> bool {
    event.paths.iter().any(|event_path| {
        event_path == config_path
            || (event_path.parent() == config_path.parent()
                && event_path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(CONFIG_FILE_NAME)))
    })
}

/// Start the configuration file watcher on a background thread.
pub fn start_config_watcher(signal_sender: Sender<SignalMessage>, config_path: PathBuf) -> Result<()> {
    let Some(config_dir) = config_path.parent().map(Path::to_path_buf) else {
        log_debug!("Config path has no parent directory, hot reload disabled");
        return Ok(());
    };
    if !config_dir.is_dir() {
        log_debug!("Config directory missing, hot reload disabled");
        return Ok(());
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res
                && matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                )
            {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(&config_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch directory: {}", private_path(&config_dir)))?;
    log_debug!("Watching {} for changes", private_path(&config_path));

    thread::spawn(move || {
        // The watcher stops when dropped
        let _watcher = watcher;
        let mut last_reload: Option<Instant> = None;

        for event in rx {
            if !affects_config(&event, &config_path) {
                continue;
            }
            if last_reload.is_some_and(|at| at.elapsed() < Duration::from_millis(CONFIG_DEBOUNCE_MS)) {
                continue;
            }

            log_pipe!();
            log_info!("Configuration file change detected");
            if signal_sender.send(SignalMessage::Reload).is_err() {
                break;
            }
            last_reload = Some(Instant::now());
        }
    });

    Ok(())
}
