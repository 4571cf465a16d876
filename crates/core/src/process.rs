//! Process registry for lifecycle scripts
//!
//! The launcher needs exactly two facts about each lifecycle script: is a
//! process currently running for it, and (for the start script) what endpoint
//! has it published. This module provides the [`ProcessRegistry`] trait the
//! menu machinery consumes, plus the pid-file based [`RunDir`] implementation
//! used by the CLI commands.
//!
//! Pid files alone are not trusted: a crashed run leaves its file behind, so
//! liveness is double-checked against the OS process table. A stale pid file
//! counts as not-running, which is what makes the menu self-healing after a
//! failed or killed script.

use crate::errors::{ProcessError, Result};
use crate::state::ScriptName;
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Name of the file holding the published start endpoint
const START_URL_FILE: &str = "start.url";

/// Default run directory for a workspace
///
/// Prefers the platform runtime/cache directory so pid files survive
/// workspace deletion no worse than the processes they describe; falls back
/// to a `.run` directory inside the workspace.
pub fn default_run_dir(workspace: &Path) -> PathBuf {
    directories_next::ProjectDirs::from("", "", "fusionctl")
        .map(|dirs| {
            dirs.runtime_dir()
                .unwrap_or_else(|| dirs.cache_dir())
                .to_path_buf()
        })
        .unwrap_or_else(|| workspace.join(".run"))
}

/// Query interface over lifecycle script processes
///
/// Implementations must be cheap to call: the menu is re-derived on every
/// render tick and must never block.
pub trait ProcessRegistry {
    /// Whether an active process exists for the given script
    fn is_running(&self, script: ScriptName) -> bool;

    /// The endpoint the script has published, if any
    fn published_endpoint(&self, script: ScriptName) -> Option<String>;
}

/// Pid-file registry rooted at a run directory
///
/// Layout: `<run_dir>/<script>.pid` holds the process id as decimal text;
/// `<run_dir>/start.url` holds the published web endpoint.
#[derive(Debug, Clone)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    /// Create a registry over the given directory, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ProcessError::RunDir {
            message: format!("cannot create {}: {}", root.display(), e),
        })?;
        Ok(Self { root })
    }

    /// Path of the pid file for a script
    pub fn pid_file(&self, script: ScriptName) -> PathBuf {
        self.root.join(format!("{}.pid", script.as_str()))
    }

    /// Path of the published-endpoint file
    pub fn url_file(&self) -> PathBuf {
        self.root.join(START_URL_FILE)
    }

    /// Read and parse the pid file for a script, if present
    fn read_pid(&self, script: ScriptName) -> Option<u32> {
        let path = self.pid_file(script);
        let content = fs::read_to_string(&path).ok()?;
        match content.trim().parse::<u32>() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(
                    script = script.as_str(),
                    path = %path.display(),
                    "Ignoring malformed pid file: {}",
                    e
                );
                None
            }
        }
    }

    /// Record the current process as the active run of `script`
    ///
    /// Returns a guard that removes the pid file (and, for start, the
    /// published endpoint) when dropped, including on error paths.
    pub fn acquire(&self, script: ScriptName) -> Result<PidGuard> {
        let path = self.pid_file(script);
        fs::write(&path, std::process::id().to_string()).map_err(|e| ProcessError::RunDir {
            message: format!("cannot write {}: {}", path.display(), e),
        })?;
        debug!(script = script.as_str(), pid = std::process::id(), "Acquired run slot");
        Ok(PidGuard {
            pid_file: path,
            url_file: (script == ScriptName::Start).then(|| self.url_file()),
        })
    }

    /// Publish the start script's endpoint for the menu to pick up
    pub fn publish_endpoint(&self, url: &str) -> Result<()> {
        fs::write(self.url_file(), url).map_err(|e| ProcessError::RunDir {
            message: format!("cannot publish endpoint: {}", e),
        })?;
        Ok(())
    }
}

impl ProcessRegistry for RunDir {
    fn is_running(&self, script: ScriptName) -> bool {
        let Some(pid) = self.read_pid(script) else {
            return false;
        };
        let mut sys = System::new();
        let target = Pid::from_u32(pid);
        sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        let alive = sys.process(target).is_some();
        if !alive {
            debug!(
                script = script.as_str(),
                pid, "Stale pid file, treating as not running"
            );
        }
        alive
    }

    fn published_endpoint(&self, script: ScriptName) -> Option<String> {
        if script != ScriptName::Start {
            return None;
        }
        let url = fs::read_to_string(self.url_file()).ok()?;
        let url = url.trim();
        (!url.is_empty()).then(|| url.to_string())
    }
}

/// RAII marker for an in-flight lifecycle script
///
/// Dropping the guard clears the on-disk running state so the next menu
/// evaluation reverts to the idle action set even when the run failed.
#[derive(Debug)]
pub struct PidGuard {
    pid_file: PathBuf,
    url_file: Option<PathBuf>,
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        remove_quiet(&self.pid_file);
        if let Some(url_file) = &self.url_file {
            remove_quiet(url_file);
        }
    }
}

fn remove_quiet(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove run file: {}", e);
        }
    }
}
