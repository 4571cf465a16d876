use crate::commands;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

/// Progress format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProgressFormat {
    /// No progress output
    None,
    /// JSON structured progress events
    Json,
    /// Auto mode: TTY spinner on stderr, silent otherwise
    Auto,
}

/// Launcher subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Provision the application: sync repositories, create the isolated
    /// environment, install dependencies, bootstrap the runtime, link shared
    /// model resources
    ///
    /// Safe to re-run: every stage is idempotent, so a failed install is
    /// retried by simply invoking it again.
    Install {
        /// Print the provisioning plan without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Launch the application and publish its web endpoint
    Start {
        /// Launch with the SageAttention2 kernel
        #[arg(long, conflicts_with = "flash_attention")]
        sage_attention: bool,
        /// Launch with the FlashAttention2 kernel
        #[arg(long)]
        flash_attention: bool,
        /// Extra arguments passed through to the application (shell-quoted)
        #[arg(long, value_name = "ARGS")]
        extra_args: Option<String>,
    },

    /// Update the installation: sync repositories, reinstall dependencies,
    /// re-bootstrap the runtime
    Update {
        /// Quick mode: sync repositories only
        #[arg(long)]
        quick: bool,
        /// Print the update plan without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove the isolated environment (checkouts and models are kept)
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Derive and print the current launcher menu
    Menu {
        /// Output format (text or json)
        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Report the current install/runtime state
    Status {
        /// Output format (text or json)
        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Launcher for a locally provisioned generative-image application",
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Log format (text or json, defaults to text, can be set via FUSIONCTL_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Application workspace directory (default: current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub app_dir: Option<PathBuf>,

    /// Run directory for pid files and the published endpoint
    #[arg(long, global = true, value_name = "PATH")]
    pub run_dir: Option<PathBuf>,

    /// Configuration file path (default: <app-dir>/launcher.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Progress format (json|none|auto). Auto shows a spinner on a TTY.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub progress: ProgressFormat,

    /// Progress file path (for JSON progress events)
    #[arg(long, global = true, value_name = "PATH")]
    pub progress_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch the parsed subcommand
    ///
    /// Initializes logging according to the global options, builds the shared
    /// command context, and executes the selected subcommand. All logs go to
    /// stderr; `menu` and `status` keep stdout machine-readable.
    pub async fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None, // Let the logging module check the environment
        };

        let mut log_level = match self.log_level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        // Spinner-friendly session: progress auto, no progress file, stderr
        // is a TTY, and logs are not JSON
        let stderr_is_tty = std::io::stderr().is_terminal();
        let json_format = matches!(log_format, Some("json"));
        let spinner_eligible = self.progress == ProgressFormat::Auto
            && self.progress_file.is_none()
            && stderr_is_tty
            && !json_format;

        if std::env::var_os("FUSIONCTL_LOG").is_none() && std::env::var_os("RUST_LOG").is_none() {
            // Spinner sessions default quieter unless overridden via flag/env
            if spinner_eligible {
                log_level = "warn";
            }
            std::env::set_var(
                "RUST_LOG",
                format!("fusionctl={},fusionctl_core={}", log_level, log_level),
            );
        }
        fusionctl_core::logging::init(log_format)?;
        tracing::debug!("CLI initialized with log level: {}", log_level);

        let workspace = match self.app_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let run_dir = self
            .run_dir
            .unwrap_or_else(|| fusionctl_core::process::default_run_dir(&workspace));
        let context = commands::CommandContext {
            workspace,
            run_dir,
            config_path: self.config,
            progress: self.progress,
            progress_file: self.progress_file,
            spinner_eligible,
        };

        match self.command {
            Commands::Install { dry_run } => {
                commands::install::execute_install(commands::install::InstallArgs {
                    dry_run,
                    context,
                })
                .await
            }
            Commands::Start {
                sage_attention,
                flash_attention,
                extra_args,
            } => {
                commands::start::execute_start(commands::start::StartArgs {
                    sage_attention,
                    flash_attention,
                    extra_args,
                    context,
                })
                .await
            }
            Commands::Update { quick, dry_run } => {
                commands::update::execute_update(commands::update::UpdateArgs {
                    quick,
                    dry_run,
                    context,
                })
                .await
            }
            Commands::Reset { yes } => {
                commands::reset::execute_reset(commands::reset::ResetArgs { yes, context }).await
            }
            Commands::Menu { output } => commands::menu::execute_menu(output, &context),
            Commands::Status { output } => commands::status::execute_status(output, &context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_accel_flags_conflict() {
        let result = Cli::try_parse_from([
            "fusionctl",
            "start",
            "--sage-attention",
            "--flash-attention",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fusionctl", "menu", "--output", "json", "--app-dir", "/x"])
            .unwrap();
        assert_eq!(cli.app_dir, Some(PathBuf::from("/x")));
        assert!(matches!(
            cli.command,
            Commands::Menu {
                output: OutputFormat::Json
            }
        ));
    }
}
