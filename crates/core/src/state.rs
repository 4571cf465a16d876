//! Installation/runtime state snapshot
//!
//! The launcher never stores state of its own: everything is derived fresh on
//! each query from filesystem and process-table facts left behind by pipeline
//! runs. This module defines the lifecycle script names and the immutable
//! [`InstallState`] snapshot that the menu state machine consumes.
//!
//! The snapshot is gathered by the caller and passed in explicitly so that
//! menu derivation stays a pure function with no hidden global reads.

use crate::process::ProcessRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Independently invokable lifecycle scripts
///
/// In a correctly functioning launcher at most one of these runs at a time;
/// the menu machine still resolves contradictory flags deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptName {
    /// Full provisioning run
    Install,
    /// Launch the wrapped application
    Start,
    /// Pull + dependency reinstall + re-bootstrap
    Update,
    /// Pull-only update
    QuickUpdate,
    /// Destructive environment reset
    Reset,
}

impl ScriptName {
    /// Get the script name as string (used for pid file names and targets)
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptName::Install => "install",
            ScriptName::Start => "start",
            ScriptName::Update => "update",
            ScriptName::QuickUpdate => "quick-update",
            ScriptName::Reset => "reset",
        }
    }

    /// All lifecycle scripts, in menu priority order
    pub fn all() -> &'static [ScriptName] {
        &[
            ScriptName::Install,
            ScriptName::Start,
            ScriptName::Update,
            ScriptName::QuickUpdate,
            ScriptName::Reset,
        ]
    }
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScriptName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(ScriptName::Install),
            "start" => Ok(ScriptName::Start),
            "update" => Ok(ScriptName::Update),
            "quick-update" | "quickUpdate" => Ok(ScriptName::QuickUpdate),
            "reset" => Ok(ScriptName::Reset),
            _ => Err(format!(
                "Invalid script name: '{}'. Valid values are: install, start, update, quick-update, reset",
                s
            )),
        }
    }
}

/// Immutable snapshot of install/runtime facts
///
/// Recomputed on every query; never cached or persisted. "Installed" is
/// derived solely from the presence of the environment-marker path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallState {
    /// True iff the environment marker exists on disk
    pub installed: bool,
    /// One running flag per lifecycle script, in priority order
    pub running: IndexMap<ScriptName, bool>,
    /// Published web endpoint, present only while the start script runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
}

impl InstallState {
    /// Build a snapshot with nothing running
    pub fn idle(installed: bool) -> Self {
        let mut running = IndexMap::new();
        for script in ScriptName::all() {
            running.insert(*script, false);
        }
        Self {
            installed,
            running,
            start_url: None,
        }
    }

    /// Build a snapshot with a single script marked running
    pub fn with_running(installed: bool, script: ScriptName) -> Self {
        let mut state = Self::idle(installed);
        state.running.insert(script, true);
        state
    }

    /// Whether the given script is reported running
    pub fn is_running(&self, script: ScriptName) -> bool {
        self.running.get(&script).copied().unwrap_or(false)
    }

    /// Gather a fresh snapshot from the environment marker and the process
    /// registry
    ///
    /// This is the only place the raw facts are read; callers pass the result
    /// into `derive_menu` so the state machine itself stays side-effect free.
    pub fn gather(env_marker: &Path, registry: &dyn ProcessRegistry) -> Self {
        let installed = env_marker.exists();
        let mut running = IndexMap::new();
        for script in ScriptName::all() {
            running.insert(*script, registry.is_running(*script));
        }
        let start_url = if running
            .get(&ScriptName::Start)
            .copied()
            .unwrap_or(false)
        {
            registry.published_endpoint(ScriptName::Start)
        } else {
            None
        };

        debug!(
            installed,
            start_url = start_url.as_deref(),
            "Gathered install state snapshot"
        );

        Self {
            installed,
            running,
            start_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessRegistry;

    struct StubRegistry {
        running: Vec<ScriptName>,
        endpoint: Option<String>,
    }

    impl ProcessRegistry for StubRegistry {
        fn is_running(&self, script: ScriptName) -> bool {
            self.running.contains(&script)
        }

        fn published_endpoint(&self, _script: ScriptName) -> Option<String> {
            self.endpoint.clone()
        }
    }

    #[test]
    fn test_script_name_round_trip() {
        for script in ScriptName::all() {
            let parsed: ScriptName = script.as_str().parse().unwrap();
            assert_eq!(parsed, *script);
        }
        assert!("bogus".parse::<ScriptName>().is_err());
    }

    #[test]
    fn test_quick_update_accepts_camel_case() {
        assert_eq!(
            "quickUpdate".parse::<ScriptName>().unwrap(),
            ScriptName::QuickUpdate
        );
    }

    #[test]
    fn test_idle_snapshot_has_all_scripts() {
        let state = InstallState::idle(true);
        assert_eq!(state.running.len(), ScriptName::all().len());
        assert!(state.running.values().all(|r| !r));
        assert!(state.start_url.is_none());
    }

    #[test]
    fn test_gather_reads_marker_and_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("venv");
        let registry = StubRegistry {
            running: vec![ScriptName::Start],
            endpoint: Some("http://localhost:7860".to_string()),
        };

        // Marker absent: not installed, but running flags still gathered
        let state = InstallState::gather(&marker, &registry);
        assert!(!state.installed);
        assert!(state.is_running(ScriptName::Start));
        assert_eq!(state.start_url.as_deref(), Some("http://localhost:7860"));

        std::fs::create_dir_all(&marker).unwrap();
        let state = InstallState::gather(&marker, &registry);
        assert!(state.installed);
    }

    #[test]
    fn test_gather_skips_endpoint_when_start_not_running() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = StubRegistry {
            running: vec![],
            endpoint: Some("http://localhost:7860".to_string()),
        };
        let state = InstallState::gather(&tmp.path().join("venv"), &registry);
        assert!(state.start_url.is_none());
    }
}
