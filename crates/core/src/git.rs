//! Repository source-control client
//!
//! Abstraction over the git CLI for the idempotent-bootstrap pattern: every
//! managed repository (the app, each extension module, the companion tool) is
//! brought up to date with [`clone_or_pull`] — try a pull on an existing
//! checkout, fall back to a fresh clone on any failure. Only when both the
//! pull and the clone fail does the operation error, and then the pipeline
//! aborts.
//!
//! Git transport itself is out of scope; this module only shells out and
//! reads exit status, the same way the container runtime is wrapped in a
//! CLI-based client elsewhere in this codebase's ancestry.

use crate::errors::{GitError, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Repository source-control abstraction
#[allow(async_fn_in_trait)]
pub trait RepoClient {
    /// Pull the checkout at `path`; errors if there is no healthy checkout
    async fn pull(&self, path: &Path) -> Result<()>;

    /// Clone `url` into `path` (which may not exist yet)
    async fn clone_repo(&self, url: &str, path: &Path) -> Result<()>;
}

impl<T: RepoClient> RepoClient for &T {
    async fn pull(&self, path: &Path) -> Result<()> {
        (*self).pull(path).await
    }

    async fn clone_repo(&self, url: &str, path: &Path) -> Result<()> {
        (*self).clone_repo(url, path).await
    }
}

/// CLI-based git client
#[derive(Debug, Clone)]
pub struct CliGit {
    git_path: String,
}

impl CliGit {
    /// Create a client using `git` from PATH
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }

    /// Create a client with a custom git binary path
    pub fn with_git_path(git_path: String) -> Self {
        Self { git_path }
    }

    async fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<std::process::Output> {
        let mut cmd = Command::new(&self.git_path);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        debug!(args = ?args, cwd = ?cwd, "Running git");
        cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::NotInstalled.into()
            } else {
                GitError::CLIError(e.to_string()).into()
            }
        })
    }
}

impl Default for CliGit {
    fn default() -> Self {
        Self::new()
    }
}

impl RepoClient for CliGit {
    #[instrument(skip(self))]
    async fn pull(&self, path: &Path) -> Result<()> {
        if !path.join(".git").exists() {
            return Err(GitError::PullFailed {
                path: path.display().to_string(),
                message: "not a git checkout".to_string(),
            }
            .into());
        }
        let output = self.run(&["pull", "--ff-only"], Some(path)).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(GitError::PullFailed {
                path: path.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into())
        }
    }

    #[instrument(skip(self))]
    async fn clone_repo(&self, url: &str, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let output = self
            .run(&["clone", url, &path.display().to_string()], None)
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(GitError::CloneFailed {
                url: url.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into())
        }
    }
}

/// Bring a managed repository to an up-to-date checkout, idempotently
///
/// Attempt a pull first; on any failure (including the absence of a checkout)
/// fall back to a fresh clone. Succeeding twice in a row on the same path is
/// the expected mode of operation: re-runs just pull.
#[instrument(skip(client))]
pub async fn clone_or_pull<C: RepoClient>(client: &C, url: &str, dest: &Path) -> Result<()> {
    let pull_error = match client.pull(dest).await {
        Ok(()) => {
            info!(dest = %dest.display(), "Repository updated via pull");
            return Ok(());
        }
        Err(e) => e,
    };

    warn!(
        dest = %dest.display(),
        "Pull failed ({}), falling back to clone",
        pull_error
    );
    match client.clone_repo(url, dest).await {
        Ok(()) => {
            info!(dest = %dest.display(), url, "Repository cloned");
            Ok(())
        }
        Err(clone_error) => Err(GitError::CloneOrPullFailure {
            url: url.to_string(),
            pull_error: pull_error.to_string(),
            clone_error: clone_error.to_string(),
        }
        .into()),
    }
}
