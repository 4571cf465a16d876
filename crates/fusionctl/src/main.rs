use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod ui;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            // Launcher-domain failures carry user-facing messages already;
            // print them without the anyhow backtrace noise.
            if let Some(launcher_error) =
                err.downcast_ref::<fusionctl_core::errors::LauncherError>()
            {
                eprintln!("Error: {}", launcher_error);
                std::process::exit(1);
            }
            Err(err)
        }
    }
}
