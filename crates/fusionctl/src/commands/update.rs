//! Update command implementation
//!
//! Full update re-runs sync, dependency installation, and the runtime
//! bootstrap; quick update only syncs repositories. Both reuse the same
//! idempotent stages the install pipeline is built from.

use super::CommandContext;
use anyhow::{bail, Result};
use fusionctl_core::state::ScriptName;
use tracing::{info, instrument};

/// Update command arguments
#[derive(Debug)]
pub struct UpdateArgs {
    /// Quick mode: repository sync only
    pub quick: bool,
    /// Print the update plan without executing it
    pub dry_run: bool,
    /// Shared global options
    pub context: CommandContext,
}

/// Execute the update command
#[instrument(skip(args))]
pub async fn execute_update(args: UpdateArgs) -> Result<()> {
    let config = args.context.load_config()?;
    let registry = super::build_registry(&config);
    let (pipeline, script) = if args.quick {
        ("quick-update", ScriptName::QuickUpdate)
    } else {
        ("update", ScriptName::Update)
    };

    if args.dry_run {
        super::print_plan(&registry, pipeline, 0);
        return Ok(());
    }
    if !config.env_marker(&args.context.workspace).exists() {
        bail!("Nothing to update: run `fusionctl install` first");
    }

    info!(pipeline, "Starting update");
    super::run_named_pipeline(&args.context, &config, &registry, pipeline, script).await?;
    println!("Update complete.");
    Ok(())
}
