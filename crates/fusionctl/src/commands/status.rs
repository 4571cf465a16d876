//! Status command implementation
//!
//! Reports the raw state snapshot the menu is derived from: installed or
//! not, which lifecycle scripts are running, and the published endpoint.
//! JSON output goes to stdout with nothing else mixed in.

use super::CommandContext;
use crate::cli::OutputFormat;
use anyhow::Result;
use fusionctl_core::state::InstallState;
use tracing::instrument;

/// Execute the status command
#[instrument(skip(context))]
pub fn execute_status(output: OutputFormat, context: &CommandContext) -> Result<()> {
    let config = context.load_config()?;
    let run_dir = context.run_dir()?;
    let state = InstallState::gather(&config.env_marker(&context.workspace), &run_dir);

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text => {
            println!(
                "Installed: {}",
                if state.installed { "yes" } else { "no" }
            );
            let running: Vec<&str> = state
                .running
                .iter()
                .filter(|(_, r)| **r)
                .map(|(s, _)| s.as_str())
                .collect();
            if running.is_empty() {
                println!("Running:   none");
            } else {
                println!("Running:   {}", running.join(", "));
            }
            match &state.start_url {
                Some(url) => println!("Web UI:    {}", url),
                None => println!("Web UI:    not published"),
            }
        }
    }
    Ok(())
}
