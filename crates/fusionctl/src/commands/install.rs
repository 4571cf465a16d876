//! Install command implementation
//!
//! Runs the full provisioning pipeline: repository sync, workspace
//! preparation, dependency installation, runtime bootstrap, and shared
//! model-resource linking. Every stage is idempotent, so a failed install is
//! recovered by running the command again.

use super::CommandContext;
use anyhow::Result;
use fusionctl_core::state::ScriptName;
use tracing::{info, instrument};

/// Install command arguments
#[derive(Debug)]
pub struct InstallArgs {
    /// Print the provisioning plan without executing it
    pub dry_run: bool,
    /// Shared global options
    pub context: CommandContext,
}

/// Execute the install command
#[instrument(skip(args))]
pub async fn execute_install(args: InstallArgs) -> Result<()> {
    let config = args.context.load_config()?;
    let registry = super::build_registry(&config);

    if args.dry_run {
        super::print_plan(&registry, "install", 0);
        return Ok(());
    }

    info!(workspace = %args.context.workspace.display(), "Starting install");
    super::run_named_pipeline(
        &args.context,
        &config,
        &registry,
        "install",
        ScriptName::Install,
    )
    .await?;
    println!("Install complete. Run `fusionctl start` to launch.");
    Ok(())
}
