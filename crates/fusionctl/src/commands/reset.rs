//! Reset command implementation
//!
//! Removes the isolated environment so the next menu evaluation reports
//! not-installed. Repository checkouts and model directories are deliberately
//! kept: a follow-up install reuses them via the idempotent sync and link
//! stages instead of re-downloading everything.

use super::CommandContext;
use anyhow::{bail, Context, Result};
use fusionctl_core::state::ScriptName;
use std::io::{BufRead, Write};
use tracing::{info, instrument};

/// Reset command arguments
#[derive(Debug)]
pub struct ResetArgs {
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Shared global options
    pub context: CommandContext,
}

/// Execute the reset command
#[instrument(skip(args))]
pub async fn execute_reset(args: ResetArgs) -> Result<()> {
    let config = args.context.load_config()?;
    let env_dir = config.env_marker(&args.context.workspace);
    if !env_dir.exists() {
        println!("Nothing to reset: no installed environment found.");
        return Ok(());
    }

    if !args.yes && !confirm(&env_dir.display().to_string())? {
        bail!("Reset aborted");
    }

    let run_dir = args.context.run_dir()?;
    let _guard = run_dir.acquire(ScriptName::Reset)?;

    std::fs::remove_dir_all(&env_dir)
        .with_context(|| format!("failed to remove {}", env_dir.display()))?;
    info!(env = %env_dir.display(), "Environment removed");
    println!("Environment removed. Checkouts and models were kept.");
    Ok(())
}

/// Ask for confirmation on stderr, reading the answer from stdin
fn confirm(target: &str) -> Result<bool> {
    let mut stderr = std::io::stderr().lock();
    write!(
        stderr,
        "This removes the installed environment at {}. Continue? [y/N] ",
        target
    )?;
    stderr.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
