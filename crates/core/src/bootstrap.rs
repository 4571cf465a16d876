//! Runtime acceleration bootstrap
//!
//! After dependencies land, the runtime stack is bootstrapped from a
//! declarative option set: the torch runtime plus optionally one or both
//! attention-acceleration kernels. The routine is idempotent (the package
//! installer re-resolves to the already-installed versions), so update runs
//! re-invoke it freely.

use crate::config::BootstrapDefaults;
use crate::errors::{BootstrapError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Declarative bootstrap configuration
///
/// The kernels are mutually exclusive at start time, but both may be
/// provisioned so either can be selected per launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapOptions {
    /// Provision the SageAttention2 kernel
    pub sage_attention: bool,
    /// Provision the FlashAttention2 kernel
    pub flash_attention: bool,
}

impl From<BootstrapDefaults> for BootstrapOptions {
    fn from(defaults: BootstrapDefaults) -> Self {
        Self {
            sage_attention: defaults.sage_attention,
            flash_attention: defaults.flash_attention,
        }
    }
}

impl BootstrapOptions {
    /// The package specs to install for this option set, in order
    pub fn package_specs(&self) -> Vec<Vec<String>> {
        let mut specs = vec![vec![
            "torch".to_string(),
            "torchvision".to_string(),
            "torchaudio".to_string(),
        ]];
        if self.sage_attention {
            specs.push(vec!["sageattention".to_string()]);
        }
        if self.flash_attention {
            specs.push(vec![
                "flash-attn".to_string(),
                "--no-build-isolation".to_string(),
            ]);
        }
        specs
    }
}

/// Runtime bootstrap abstraction
#[allow(async_fn_in_trait)]
pub trait BootstrapService {
    /// Run the bootstrap routine against the isolated environment
    async fn bootstrap(&self, env_dir: &Path, options: &BootstrapOptions) -> Result<()>;
}

impl<T: BootstrapService> BootstrapService for &T {
    async fn bootstrap(&self, env_dir: &Path, options: &BootstrapOptions) -> Result<()> {
        (*self).bootstrap(env_dir, options).await
    }
}

/// uv-backed bootstrap installing the torch stack and selected kernels
#[derive(Debug, Clone)]
pub struct UvBootstrap {
    uv_path: PathBuf,
}

impl UvBootstrap {
    /// Use `uv` from PATH
    pub fn new() -> Self {
        Self {
            uv_path: PathBuf::from("uv"),
        }
    }

    /// Use a custom uv binary
    pub fn with_uv_path(uv_path: impl Into<PathBuf>) -> Self {
        Self {
            uv_path: uv_path.into(),
        }
    }
}

impl Default for UvBootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapService for UvBootstrap {
    #[instrument(skip(self, env_dir))]
    async fn bootstrap(&self, env_dir: &Path, options: &BootstrapOptions) -> Result<()> {
        for spec in options.package_specs() {
            debug!(spec = ?spec, "Bootstrapping runtime package set");
            let output = Command::new(&self.uv_path)
                .arg("pip")
                .arg("install")
                .args(&spec)
                .env("VIRTUAL_ENV", env_dir)
                .output()
                .await
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        BootstrapError::ToolNotFound {
                            tool: self.uv_path.display().to_string(),
                        }
                    } else {
                        BootstrapError::Failed {
                            message: e.to_string(),
                        }
                    }
                })?;
            if !output.status.success() {
                return Err(BootstrapError::Failed {
                    message: format!(
                        "installing {:?}: {}",
                        spec,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                }
                .into());
            }
        }
        info!(?options, "Runtime bootstrap complete");
        Ok(())
    }
}
