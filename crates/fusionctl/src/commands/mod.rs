//! Subcommand implementations

pub mod install;
pub mod menu;
pub mod reset;
pub mod start;
pub mod status;
pub mod update;

use crate::cli::ProgressFormat;
use crate::ui::spinner::SpinnerEmitter;
use anyhow::{Context, Result};
use fusionctl_core::config::LauncherConfig;
use fusionctl_core::pipeline::{Collaborators, Executor, PipelineRegistry, ShellRunner};
use fusionctl_core::plan::standard_registry;
use fusionctl_core::process::RunDir;
use fusionctl_core::progress::{
    JsonFileEmitter, NullEmitter, ProgressEmitter, ProgressEvent, ProgressTracker,
};
use fusionctl_core::state::ScriptName;
use std::io::Write;
use std::path::PathBuf;

/// Global options shared by all subcommands
#[derive(Debug)]
pub struct CommandContext {
    /// Application workspace directory
    pub workspace: PathBuf,
    /// Run directory for pid files and the published endpoint
    pub run_dir: PathBuf,
    /// Explicit configuration file path
    pub config_path: Option<PathBuf>,
    /// Progress format selection
    pub progress: ProgressFormat,
    /// Progress file path for JSON events
    pub progress_file: Option<PathBuf>,
    /// Whether the session qualifies for a TTY spinner
    pub spinner_eligible: bool,
}

impl CommandContext {
    /// Load the launcher configuration for this invocation
    pub fn load_config(&self) -> Result<LauncherConfig> {
        let config = match &self.config_path {
            Some(path) => LauncherConfig::load_from_path(path)?,
            None => LauncherConfig::load_or_default(&self.workspace)?,
        };
        Ok(config)
    }

    /// Open the run directory registry
    pub fn run_dir(&self) -> Result<RunDir> {
        Ok(RunDir::new(&self.run_dir)?)
    }

    /// Build the progress tracker for a pipeline run
    pub fn build_tracker(&self) -> Result<ProgressTracker> {
        let emitter: Box<dyn ProgressEmitter> = match (self.progress, &self.progress_file) {
            (ProgressFormat::None, _) => Box::new(NullEmitter),
            (_, Some(path)) => Box::new(JsonFileEmitter::new(path)?),
            (ProgressFormat::Json, None) => Box::new(JsonStdoutEmitter),
            (ProgressFormat::Auto, None) => {
                if self.spinner_eligible {
                    Box::new(SpinnerEmitter::new())
                } else {
                    Box::new(NullEmitter)
                }
            }
        };
        Ok(ProgressTracker::new(emitter))
    }
}

/// Emitter writing newline-delimited JSON progress events to stdout
struct JsonStdoutEmitter;

impl ProgressEmitter for JsonStdoutEmitter {
    fn emit(&mut self, event: &ProgressEvent) -> fusionctl_core::errors::Result<()> {
        let line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Run one named pipeline under the given script's run slot
///
/// Acquires the pid file for `script` so concurrent menu evaluations see the
/// operation as running, executes the pipeline with the production
/// collaborators, and releases the slot on completion (including failure).
pub async fn run_named_pipeline(
    context: &CommandContext,
    config: &LauncherConfig,
    registry: &PipelineRegistry,
    name: &str,
    script: ScriptName,
) -> Result<()> {
    let run_dir = context.run_dir()?;
    let _guard = run_dir.acquire(script)?;

    let runner = ShellRunner;
    let git = fusionctl_core::git::CliGit::new();
    let env_dir = config.env_marker(&context.workspace);
    let installer = fusionctl_core::installer::UvPip::new(&env_dir);
    let bootstrap = fusionctl_core::bootstrap::UvBootstrap::new();
    let collab = Collaborators {
        runner: &runner,
        repos: &git,
        installer: &installer,
        bootstrap: &bootstrap,
    };
    let executor = Executor::new(collab, &context.workspace, &env_dir, registry);

    let pipeline = registry
        .get(name)
        .with_context(|| format!("pipeline '{}' is not defined", name))?;
    let mut tracker = context.build_tracker()?;
    let (_run, result) = executor.run(pipeline, &mut tracker).await;
    result?;
    Ok(())
}

/// Build the standard pipeline registry for the loaded configuration
pub fn build_registry(config: &LauncherConfig) -> PipelineRegistry {
    standard_registry(config)
}

/// Print a pipeline's steps, expanding delegations inline
pub fn print_plan(registry: &PipelineRegistry, name: &str, indent: usize) {
    use fusionctl_core::pipeline::PipelineStep;

    let Some(pipeline) = registry.get(name) else {
        return;
    };
    let pad = "  ".repeat(indent);
    println!("{}{}:", pad, pipeline.name);
    for step in &pipeline.steps {
        match step {
            PipelineStep::Delegate { target, .. } => print_plan(registry, target, indent + 1),
            other => println!("{}  - {}", pad, other.describe()),
        }
    }
}
