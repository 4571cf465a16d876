//! Error types and handling
//!
//! This module provides domain-specific error types for the launcher. The
//! taxonomy is structured with specific error enums for each domain
//! (Configuration, Git, Install, etc.) that are then wrapped in the main
//! LauncherError enum for unified error handling.
//!
//! Every provisioning-pipeline failure is fatal to that pipeline invocation;
//! there is no partial-success state. The menu state machine never raises —
//! contradictory inputs are resolved by priority ordering, not by erroring.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file parsing error
    #[error("Failed to parse launcher configuration: {message}")]
    Parsing { message: String },

    /// Configuration validation error
    #[error("Configuration validation error: {message}")]
    Validation { message: String },

    /// Configuration file I/O error
    #[error("Failed to read launcher configuration file")]
    Io(#[from] std::io::Error),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },
}

/// Git-related errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Git is not installed or not accessible
    #[error("Git is not installed or not accessible")]
    NotInstalled,

    /// Git CLI command error
    #[error("Git CLI error: {0}")]
    CLIError(String),

    /// Repository pull failed
    #[error("Failed to pull repository at {path}: {message}")]
    PullFailed { path: String, message: String },

    /// Repository clone failed
    #[error("Failed to clone {url}: {message}")]
    CloneFailed { url: String, message: String },

    /// Both the pull attempt and the clone fallback failed
    #[error("Repository sync failed for {url}: pull failed ({pull_error}), clone failed ({clone_error})")]
    CloneOrPullFailure {
        url: String,
        pull_error: String,
        clone_error: String,
    },
}

/// Dependency installation errors
#[derive(Error, Debug)]
pub enum InstallError {
    /// Package installer is not installed or not accessible
    #[error("Package installer is not installed or not accessible")]
    InstallerNotFound,

    /// A dependency set failed to install; remaining sets are not attempted
    #[error("Dependency installation failed for '{requirement}': {message}")]
    DependencyInstallFailure { requirement: String, message: String },

    /// Isolated environment creation failed
    #[error("Failed to create isolated environment at {path}: {message}")]
    EnvironmentCreation { path: String, message: String },
}

/// Runtime acceleration bootstrap errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Bootstrap command exited non-zero
    #[error("Runtime bootstrap failed: {message}")]
    Failed { message: String },

    /// Bootstrap tooling missing from the environment
    #[error("Bootstrap tool not found: {tool}")]
    ToolNotFound { tool: String },
}

/// Shared model-resource linking errors
///
/// Linking is fatal when it fails: a missing model directory silently breaks
/// downstream generation, so it must not be swallowed.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Link creation failed
    #[error("Failed to link '{category}' to {target}: {message}")]
    LinkFailed {
        category: String,
        target: String,
        message: String,
    },

    /// Local directory creation failed
    #[error("Failed to create resource directory '{category}': {message}")]
    DirCreation { category: String, message: String },
}

/// Process registry errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Run directory could not be created or read
    #[error("Run directory error: {message}")]
    RunDir { message: String },

    /// Pid file exists but could not be parsed
    #[error("Malformed pid file for '{script}': {message}")]
    MalformedPidFile { script: String, message: String },

    /// Failed to launch an external process
    #[error("Failed to spawn process: {message}")]
    Spawn { message: String },
}

/// Pipeline execution errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A shell stage command exited non-zero
    #[error("Pipeline '{pipeline}' step {step} failed: command `{command}` exited with {code}")]
    CommandFailed {
        pipeline: String,
        step: usize,
        command: String,
        code: i32,
    },

    /// A delegated sub-pipeline reference could not be resolved
    #[error("Pipeline '{pipeline}' references unknown pipeline '{target}'")]
    UnknownDelegate { pipeline: String, target: String },

    /// Delegation chain exceeded the nesting limit (misconfigured cycle)
    #[error("Pipeline '{pipeline}' exceeds the delegation depth limit")]
    DelegationTooDeep { pipeline: String },
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum LauncherError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Dependency installation errors
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// Runtime bootstrap errors
    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Resource linking errors
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Process registry errors
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Pipeline execution errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O errors not attributable to a more specific domain
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with LauncherError
pub type Result<T> = std::result::Result<T, LauncherError>;
