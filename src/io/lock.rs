//! Lock file management for single-instance enforcement.
//!
//! The daemon holds an exclusive `fs2` lock on `$XDG_RUNTIME_DIR/hydrated.lock`
//! for its whole lifetime. The file records its PID and config directory so
//! one-shot commands can find the daemon and signal it after changing state.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::constants::APP_NAME;
use crate::common::utils;
use crate::config;

/// Contents of the lock file: PID, then the config directory (empty for default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub pid: u32,
    pub config_dir: Option<PathBuf>,
}

impl LockInfo {
    pub fn parse(contents: &str) -> Result<Self> {
        let mut lines = contents.lines();
        let pid = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .context("Lock file is empty")?
            .parse::<u32>()
            .context("Invalid PID format in lock file")?;
        let config_dir = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from);
        Ok(Self { pid, config_dir })
    }

    pub fn to_contents(&self) -> String {
        let dir = self
            .config_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        format!("{}\n{}\n", self.pid, dir)
    }
}

pub fn get_lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join(format!("{APP_NAME}.lock"))
}

/// Exclusive daemon lock, released (and the file removed) on drop.
pub struct DaemonLock {
    file: File,
    path: PathBuf,
}

impl DaemonLock {
    /// Take the lock at the default path. `Ok(None)` when a live daemon holds it.
    pub fn acquire() -> Result<Option<Self>> {
        Self::acquire_at(&get_lock_path())
    }

    pub fn acquire_at(path: &Path) -> Result<Option<Self>> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }

        let info = LockInfo {
            pid: std::process::id(),
            config_dir: config::get_custom_config_dir(),
        };
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(info.to_contents().as_bytes())?;
        file.flush()?;

        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

/// The running daemon recorded at `path`, if its process is still alive.
pub fn running_daemon_at(path: &Path) -> Option<LockInfo> {
    let contents = std::fs::read_to_string(path).ok()?;
    let info = LockInfo::parse(&contents).ok()?;
    if info.pid == std::process::id() || !utils::is_process_running(info.pid) {
        return None;
    }
    Some(info)
}

pub fn running_daemon() -> Option<LockInfo> {
    running_daemon_at(&get_lock_path())
}

/// Tell a running daemon that the stored state changed. Returns whether one was signalled.
pub fn notify_daemon() -> bool {
    match running_daemon() {
        Some(info) => {
            let sent = utils::signal_refresh(info.pid);
            if !sent {
                log_debug!("Failed to signal daemon (PID {})", info.pid);
            }
            sent
        }
        None => false,
    }
}
