//! Provisioning pipeline model and executor
//!
//! A pipeline is an immutable, ordered sequence of steps executed strictly
//! top-to-bottom with no backtracking. Steps are declarative: a repository
//! sync (pull, or else clone — the only step with built-in fallback
//! tolerance), a dependency install, a runtime bootstrap, a shared-resource
//! link stage, a generic multi-command shell stage, or a delegated invocation
//! of another named pipeline. Every other failure mode is fail-fast: a step
//! failing fails the whole invocation.
//!
//! A run moves `Pending -> Running -> {Succeeded, Failed}`. `Failed` is
//! terminal for that invocation only: every step is individually idempotent,
//! so the user re-invokes the pipeline rather than resuming it.

use crate::bootstrap::{BootstrapOptions, BootstrapService};
use crate::errors::{PipelineError, Result};
use crate::git::{clone_or_pull, RepoClient};
use crate::installer::{install_all, PackageInstaller};
use crate::links;
use crate::progress::{current_timestamp_ms, next_event_id, ProgressEvent, ProgressTracker};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Delegation nesting limit; configs deeper than this are cyclic mistakes
const MAX_DELEGATION_DEPTH: usize = 8;

/// A single provisioning step, immutable once defined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum PipelineStep {
    /// Repository sync with pull-or-clone fallback
    Sync {
        /// Clone URL
        url: String,
        /// Destination relative to the workspace
        dest: PathBuf,
    },
    /// Ordered dependency-set installation into the isolated environment
    #[serde(rename = "installdeps")]
    InstallDeps {
        /// Requirement sources, installed in order, fail-fast
        requirements: Vec<String>,
    },
    /// Runtime acceleration bootstrap
    Bootstrap {
        /// Declarative kernel selection
        options: BootstrapOptions,
    },
    /// Shared model-resource link stage
    Link {
        /// Ordered (category, relative pool path) mapping
        mapping: IndexMap<String, String>,
        /// Peer roots in precedence order
        peers: Vec<PathBuf>,
        /// Local base directory for category dirs, relative to the workspace
        local_base: PathBuf,
    },
    /// Multi-command shell stage; commands run in order inside one step
    Shell {
        /// Commands executed sequentially, each via the platform shell
        commands: Vec<String>,
        /// Working directory relative to the workspace
        #[serde(skip_serializing_if = "Option::is_none")]
        working_dir: Option<PathBuf>,
        /// Run with the isolated environment activated
        #[serde(default)]
        isolated_env: bool,
    },
    /// Delegated invocation of another named pipeline
    Delegate {
        /// Name of the target pipeline in the registry
        target: String,
        /// Config values exported into the delegated run's shell stages
        #[serde(default)]
        params: IndexMap<String, String>,
    },
}

impl PipelineStep {
    /// Short human description for progress reporting
    pub fn describe(&self) -> String {
        match self {
            PipelineStep::Sync { url, .. } => format!("sync {}", url),
            PipelineStep::InstallDeps { requirements } => {
                format!("install {} dependency sets", requirements.len())
            }
            PipelineStep::Bootstrap { .. } => "bootstrap runtime".to_string(),
            PipelineStep::Link { mapping, .. } => {
                format!("link {} resource categories", mapping.len())
            }
            PipelineStep::Shell { commands, .. } => match commands.first() {
                Some(first) if commands.len() == 1 => first.clone(),
                Some(first) => format!("{} (+{} more)", first, commands.len() - 1),
                None => "empty shell stage".to_string(),
            },
            PipelineStep::Delegate { target, .. } => format!("delegate to '{}'", target),
        }
    }
}

/// An ordered sequence of steps with a name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Registry name, also used in progress events and errors
    pub name: String,
    /// Steps in execution order
    pub steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Create a pipeline from parts
    pub fn new(name: impl Into<String>, steps: Vec<PipelineStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

/// Named pipelines available for delegation
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    pipelines: IndexMap<String, Pipeline>,
}

impl PipelineRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline under its own name
    pub fn register(&mut self, pipeline: Pipeline) {
        self.pipelines.insert(pipeline.name.clone(), pipeline);
    }

    /// Look up a pipeline by name
    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }
}

/// State of one pipeline invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Not yet started
    Pending,
    /// Steps executing
    Running,
    /// All steps completed
    Succeeded,
    /// A step failed; terminal for this invocation
    Failed,
}

impl RunState {
    /// Whether the run has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// Record of a single pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Pipeline name
    pub pipeline: String,
    /// Current state
    pub state: RunState,
    /// Index of the failing step, when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
}

impl PipelineRun {
    /// New pending run for the named pipeline
    pub fn pending(pipeline: &str) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            state: RunState::Pending,
            failed_step: None,
        }
    }

    fn start(&mut self) {
        debug_assert_eq!(self.state, RunState::Pending);
        self.state = RunState::Running;
    }

    fn succeed(&mut self) {
        debug_assert_eq!(self.state, RunState::Running);
        self.state = RunState::Succeeded;
    }

    fn fail(&mut self, step: usize) {
        debug_assert_eq!(self.state, RunState::Running);
        self.state = RunState::Failed;
        self.failed_step = Some(step);
    }
}

/// External command execution seam
///
/// The executor only needs a way to run one shell command and read its exit
/// status; tests script this, production shells out.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a single command, returning its exit code
    async fn run(&self, command: &str, cwd: &Path, env: &[(String, String)]) -> Result<i32>;
}

impl<T: CommandRunner> CommandRunner for &T {
    async fn run(&self, command: &str, cwd: &Path, env: &[(String, String)]) -> Result<i32> {
        (*self).run(command, cwd, env).await
    }
}

/// Runs commands through the platform shell, inheriting stdio so the user
/// sees tool output directly
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: &Path, env: &[(String, String)]) -> Result<i32> {
        #[cfg(unix)]
        let (shell, flag) = ("sh", "-c");
        #[cfg(windows)]
        let (shell, flag) = ("cmd", "/C");

        debug!(command, cwd = %cwd.display(), "Running shell command");
        let mut cmd = tokio::process::Command::new(shell);
        cmd.arg(flag).arg(command).current_dir(cwd);
        for (key, value) in env {
            cmd.env(key, value);
        }
        let status = cmd
            .status()
            .await
            .map_err(|e| crate::errors::ProcessError::Spawn {
                message: format!("`{}`: {}", command, e),
            })?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// The external collaborators the executor drives
pub struct Collaborators<'a, R, G, I, B>
where
    R: CommandRunner,
    G: RepoClient,
    I: PackageInstaller,
    B: BootstrapService,
{
    /// Shell command execution
    pub runner: &'a R,
    /// Repository source control
    pub repos: &'a G,
    /// Package installer for the isolated environment
    pub installer: &'a I,
    /// Runtime acceleration bootstrap
    pub bootstrap: &'a B,
}

/// Sequential pipeline executor
///
/// Steps execute one at a time, each awaiting the previous operation's exit
/// status; the orchestrator never runs pipeline steps concurrently.
pub struct Executor<'a, R, G, I, B>
where
    R: CommandRunner,
    G: RepoClient,
    I: PackageInstaller,
    B: BootstrapService,
{
    collab: Collaborators<'a, R, G, I, B>,
    workspace: &'a Path,
    env_dir: &'a Path,
    registry: &'a PipelineRegistry,
}

impl<'a, R, G, I, B> Executor<'a, R, G, I, B>
where
    R: CommandRunner,
    G: RepoClient,
    I: PackageInstaller,
    B: BootstrapService,
{
    /// Create an executor over the given workspace
    pub fn new(
        collab: Collaborators<'a, R, G, I, B>,
        workspace: &'a Path,
        env_dir: &'a Path,
        registry: &'a PipelineRegistry,
    ) -> Self {
        Self {
            collab,
            workspace,
            env_dir,
            registry,
        }
    }

    /// Run a pipeline to completion, returning the finished run record
    ///
    /// The returned record is `Succeeded` exactly when the result is `Ok`.
    /// On failure the on-disk state is left such that a fresh invocation can
    /// succeed: every step is idempotent and nothing is reported as done
    /// that did not complete.
    #[instrument(skip(self, pipeline, tracker), fields(pipeline = %pipeline.name))]
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        tracker: &mut ProgressTracker,
    ) -> (PipelineRun, Result<()>) {
        let mut run = PipelineRun::pending(&pipeline.name);
        run.start();
        let started = Instant::now();
        tracker.emit(ProgressEvent::PipelineBegin {
            id: next_event_id(),
            timestamp: current_timestamp_ms(),
            pipeline: pipeline.name.clone(),
            steps: pipeline.steps.len(),
        });

        let mut result = Ok(());
        for (index, step) in pipeline.steps.iter().enumerate() {
            let step_started = Instant::now();
            tracker.emit(ProgressEvent::StepBegin {
                id: next_event_id(),
                timestamp: current_timestamp_ms(),
                pipeline: pipeline.name.clone(),
                step: index,
                description: step.describe(),
            });

            let step_result = self
                .run_step(&pipeline.name, index, step, &mut *tracker, 0)
                .await;
            let success = step_result.is_ok();
            tracker.emit(ProgressEvent::StepEnd {
                id: next_event_id(),
                timestamp: current_timestamp_ms(),
                pipeline: pipeline.name.clone(),
                step: index,
                duration_ms: step_started.elapsed().as_millis() as u64,
                success,
            });

            if let Err(e) = step_result {
                warn!(
                    pipeline = %pipeline.name,
                    step = index,
                    "Pipeline step failed: {}",
                    e
                );
                run.fail(index);
                result = Err(e);
                break;
            }
        }

        if result.is_ok() {
            run.succeed();
            info!(pipeline = %pipeline.name, "Pipeline succeeded");
        }
        tracker.emit(ProgressEvent::PipelineEnd {
            id: next_event_id(),
            timestamp: current_timestamp_ms(),
            pipeline: pipeline.name.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            success: result.is_ok(),
        });
        (run, result)
    }

    fn run_step<'f>(
        &'f self,
        pipeline: &'f str,
        index: usize,
        step: &'f PipelineStep,
        tracker: &'f mut ProgressTracker,
        depth: usize,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'f>> {
        Box::pin(async move {
            match step {
                PipelineStep::Sync { url, dest } => {
                    let dest_path = self.workspace.join(dest);
                    let started = Instant::now();
                    tracker.emit(ProgressEvent::RepoSyncBegin {
                        id: next_event_id(),
                        timestamp: current_timestamp_ms(),
                        url: url.clone(),
                        dest: dest.display().to_string(),
                    });
                    let result = clone_or_pull(self.collab.repos, url, &dest_path).await;
                    tracker.emit(ProgressEvent::RepoSyncEnd {
                        id: next_event_id(),
                        timestamp: current_timestamp_ms(),
                        url: url.clone(),
                        dest: dest.display().to_string(),
                        duration_ms: started.elapsed().as_millis() as u64,
                        success: result.is_ok(),
                    });
                    result
                }
                PipelineStep::InstallDeps { requirements } => {
                    install_all(self.collab.installer, self.workspace, requirements).await
                }
                PipelineStep::Bootstrap { options } => {
                    self.collab.bootstrap.bootstrap(self.env_dir, options).await
                }
                PipelineStep::Link {
                    mapping,
                    peers,
                    local_base,
                } => {
                    let base = self.workspace.join(local_base);
                    links::link_shared_resources(&base, mapping, peers)?;
                    Ok(())
                }
                PipelineStep::Shell {
                    commands,
                    working_dir,
                    isolated_env,
                } => {
                    let cwd = match working_dir {
                        Some(dir) => self.workspace.join(dir),
                        None => self.workspace.to_path_buf(),
                    };
                    let env = if *isolated_env {
                        self.isolated_env_vars()
                    } else {
                        Vec::new()
                    };
                    for command in commands {
                        let code = self.collab.runner.run(command, &cwd, &env).await?;
                        if code != 0 {
                            return Err(PipelineError::CommandFailed {
                                pipeline: pipeline.to_string(),
                                step: index,
                                command: command.clone(),
                                code,
                            }
                            .into());
                        }
                    }
                    Ok(())
                }
                PipelineStep::Delegate { target, params } => {
                    if depth >= MAX_DELEGATION_DEPTH {
                        return Err(PipelineError::DelegationTooDeep {
                            pipeline: pipeline.to_string(),
                        }
                        .into());
                    }
                    let delegated =
                        self.registry
                            .get(target)
                            .ok_or_else(|| PipelineError::UnknownDelegate {
                                pipeline: pipeline.to_string(),
                                target: target.clone(),
                            })?;
                    debug!(from = pipeline, to = target, "Delegating");
                    for (sub_index, sub_step) in delegated.steps.iter().enumerate() {
                        let sub_step = overlay_params(sub_step, params);
                        self.run_step(
                            &delegated.name,
                            sub_index,
                            &sub_step,
                            &mut *tracker,
                            depth + 1,
                        )
                        .await?;
                    }
                    Ok(())
                }
            }
        })
    }

    fn isolated_env_vars(&self) -> Vec<(String, String)> {
        let bin = self
            .env_dir
            .join(if cfg!(windows) { "Scripts" } else { "bin" });
        let path = match std::env::var_os("PATH") {
            Some(current) => {
                let mut parts = vec![bin.clone()];
                parts.extend(std::env::split_paths(&current));
                std::env::join_paths(parts)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| bin.display().to_string())
            }
            None => bin.display().to_string(),
        };
        vec![
            (
                "VIRTUAL_ENV".to_string(),
                self.env_dir.display().to_string(),
            ),
            ("PATH".to_string(), path),
        ]
    }
}

/// Push delegation params into a shell stage's environment by prefixing
/// variable assignments; other step kinds pass through unchanged
fn overlay_params(step: &PipelineStep, params: &IndexMap<String, String>) -> PipelineStep {
    if params.is_empty() {
        return step.clone();
    }
    match step {
        PipelineStep::Shell {
            commands,
            working_dir,
            isolated_env,
        } => {
            let exports: String = params
                .iter()
                .map(|(k, v)| format!("{}={} ", k, shell_quote(v)))
                .collect();
            PipelineStep::Shell {
                commands: commands
                    .iter()
                    .map(|c| format!("{}{}", exports, c))
                    .collect(),
                working_dir: working_dir.clone(),
                isolated_env: *isolated_env,
            }
        }
        other => other.clone(),
    }
}

fn shell_quote(value: &str) -> String {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '='))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
