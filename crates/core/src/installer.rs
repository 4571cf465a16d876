//! Dependency installation inside the isolated environment
//!
//! Dependency sets are installed in a fixed order: later sets may re-assert
//! or widen version constraints declared by earlier ones, so ordering is part
//! of the contract. The first failing set aborts the whole run; there is no
//! partial-success continuation, and a later re-run is safe because the
//! package installer is itself idempotent.

use crate::errors::{InstallError, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Package installer abstraction
///
/// Implementations install one named dependency set into the isolated
/// environment and report plain success/failure.
#[allow(async_fn_in_trait)]
pub trait PackageInstaller {
    /// Ensure the isolated environment exists (idempotent)
    async fn ensure_env(&self) -> Result<()>;

    /// Install a single requirement source (a requirements file path,
    /// relative paths resolved against the workspace)
    async fn install(&self, workspace: &Path, source: &str) -> Result<()>;
}

/// uv-based pip installer operating inside a named virtual environment
#[derive(Debug, Clone)]
pub struct UvPip {
    env_dir: std::path::PathBuf,
    uv_path: String,
}

impl UvPip {
    /// Create an installer for the environment at `env_dir`
    pub fn new(env_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            env_dir: env_dir.into(),
            uv_path: "uv".to_string(),
        }
    }

    /// Use a custom uv binary path
    pub fn with_uv_path(mut self, uv_path: String) -> Self {
        self.uv_path = uv_path;
        self
    }

    async fn run_uv(&self, args: &[&str], cwd: &Path) -> Result<std::process::Output> {
        let mut cmd = Command::new(&self.uv_path);
        cmd.args(args)
            .env("VIRTUAL_ENV", &self.env_dir)
            .current_dir(cwd);
        debug!(args = ?args, env = %self.env_dir.display(), "Running uv");
        cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InstallError::InstallerNotFound.into()
            } else {
                InstallError::DependencyInstallFailure {
                    requirement: args.join(" "),
                    message: e.to_string(),
                }
                .into()
            }
        })
    }
}

impl PackageInstaller for UvPip {
    #[instrument(skip(self), fields(env = %self.env_dir.display()))]
    async fn ensure_env(&self) -> Result<()> {
        if self.env_dir.join("pyvenv.cfg").exists() {
            debug!("Isolated environment already present");
            return Ok(());
        }
        let parent = self
            .env_dir
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        std::fs::create_dir_all(&parent)?;
        let output = self
            .run_uv(&["venv", &self.env_dir.display().to_string()], &parent)
            .await?;
        if output.status.success() {
            info!(env = %self.env_dir.display(), "Created isolated environment");
            Ok(())
        } else {
            Err(InstallError::EnvironmentCreation {
                path: self.env_dir.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into())
        }
    }

    #[instrument(skip(self, workspace), fields(source))]
    async fn install(&self, workspace: &Path, source: &str) -> Result<()> {
        let output = self
            .run_uv(&["pip", "install", "-r", source], workspace)
            .await?;
        if output.status.success() {
            info!(source, "Installed dependency set");
            Ok(())
        } else {
            Err(InstallError::DependencyInstallFailure {
                requirement: source.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into())
        }
    }
}

/// Install the given dependency sets in order, aborting on the first failure
#[instrument(skip(installer, workspace, sources), fields(count = sources.len()))]
pub async fn install_all<I: PackageInstaller>(
    installer: &I,
    workspace: &Path,
    sources: &[String],
) -> Result<()> {
    installer.ensure_env().await?;
    for source in sources {
        installer.install(workspace, source).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LauncherError;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct StubInstaller {
        fail_on: Option<String>,
        installed: Mutex<Vec<String>>,
    }

    impl PackageInstaller for StubInstaller {
        async fn ensure_env(&self) -> Result<()> {
            Ok(())
        }

        async fn install(&self, _workspace: &Path, source: &str) -> Result<()> {
            if self.fail_on.as_deref() == Some(source) {
                return Err(InstallError::DependencyInstallFailure {
                    requirement: source.to_string(),
                    message: "resolution failed".to_string(),
                }
                .into());
            }
            self.installed.lock().unwrap().push(source.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_install_all_preserves_order() {
        let installer = StubInstaller {
            fail_on: None,
            installed: Mutex::new(Vec::new()),
        };
        let sources = vec!["base.txt".to_string(), "extra.txt".to_string()];
        install_all(&installer, &PathBuf::from("/tmp"), &sources)
            .await
            .unwrap();
        assert_eq!(*installer.installed.lock().unwrap(), sources);
    }

    #[tokio::test]
    async fn test_install_all_aborts_on_first_failure() {
        let installer = StubInstaller {
            fail_on: Some("extra.txt".to_string()),
            installed: Mutex::new(Vec::new()),
        };
        let sources = vec![
            "base.txt".to_string(),
            "extra.txt".to_string(),
            "never.txt".to_string(),
        ];
        let err = install_all(&installer, &PathBuf::from("/tmp"), &sources)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LauncherError::Install(InstallError::DependencyInstallFailure { .. })
        ));
        // The set after the failing one was never attempted
        assert_eq!(*installer.installed.lock().unwrap(), vec!["base.txt"]);
    }

    #[tokio::test]
    async fn test_uv_env_marker_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let env_dir = tmp.path().join("env");
        std::fs::create_dir_all(&env_dir).unwrap();
        std::fs::write(env_dir.join("pyvenv.cfg"), "home = /usr\n").unwrap();

        // The uv binary is never invoked when the marker exists, so this
        // passes even on hosts without uv.
        let installer = UvPip::new(&env_dir).with_uv_path("definitely-not-a-real-uv".to_string());
        installer.ensure_env().await.unwrap();
    }
}
