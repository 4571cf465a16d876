//! Start command implementation
//!
//! Launches the wrapped application inside the isolated environment,
//! publishes its web endpoint for the menu, and holds the run slot until the
//! application exits. The pid file and endpoint are cleared on any exit path
//! so the menu reverts to its idle action set.

use super::CommandContext;
use anyhow::{bail, Context, Result};
use fusionctl_core::state::ScriptName;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Start command arguments
#[derive(Debug)]
pub struct StartArgs {
    /// Launch with the SageAttention2 kernel
    pub sage_attention: bool,
    /// Launch with the FlashAttention2 kernel
    pub flash_attention: bool,
    /// Extra arguments passed through to the application
    pub extra_args: Option<String>,
    /// Shared global options
    pub context: CommandContext,
}

/// Execute the start command
#[instrument(skip(args))]
pub async fn execute_start(args: StartArgs) -> Result<()> {
    let config = args.context.load_config()?;
    let env_dir = config.env_marker(&args.context.workspace);
    if !env_dir.exists() {
        bail!("Not installed: run `fusionctl install` first");
    }
    let app_path = config.app_path(&args.context.workspace);
    if !app_path.join("main.py").exists() {
        bail!(
            "Application entrypoint not found at {}: run `fusionctl install` to repair",
            app_path.join("main.py").display()
        );
    }

    let run_dir = args.context.run_dir()?;
    let _guard = run_dir.acquire(ScriptName::Start)?;

    let mut app_args: Vec<String> = vec![
        "main.py".to_string(),
        "--port".to_string(),
        config.web_port.to_string(),
    ];
    if args.sage_attention {
        app_args.push("--use-sage-attention".to_string());
    }
    if args.flash_attention {
        app_args.push("--use-flash-attention".to_string());
    }
    if let Some(extra) = &args.extra_args {
        let extra = shell_words::split(extra)
            .with_context(|| format!("invalid --extra-args value: '{}'", extra))?;
        app_args.extend(extra);
    }

    let python = env_python(&env_dir);
    debug!(python = %python.display(), args = ?app_args, "Launching application");
    let mut child = tokio::process::Command::new(&python)
        .args(&app_args)
        .current_dir(&app_path)
        .env("VIRTUAL_ENV", &env_dir)
        .spawn()
        .with_context(|| format!("failed to launch {}", python.display()))?;

    // Publish after a successful spawn so the menu offers "Open Web UI"
    run_dir.publish_endpoint(&config.web_url())?;
    info!(url = config.web_url(), "Application started");

    let status = child.wait().await?;
    if !status.success() {
        bail!(
            "Application exited with {}",
            status.code().map_or("signal".to_string(), |c| c.to_string())
        );
    }
    Ok(())
}

fn env_python(env_dir: &Path) -> std::path::PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts").join("python.exe")
    } else {
        env_dir.join("bin").join("python")
    }
}
