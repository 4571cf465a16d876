//! Launcher configuration
//!
//! Configuration lives in a `launcher.json` file at the workspace root. It is
//! parsed as JSON-with-comments via the json5 crate so hand-edited files with
//! comments and trailing commas load cleanly. When no file exists the stock
//! deployment defaults apply, so a bare `fusionctl install` works out of the
//! box.
//!
//! Everything here is defined statically at configuration time; pipelines and
//! link mappings built from it are immutable for the duration of a run.

use crate::errors::{ConfigError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// A managed external repository: where it comes from and where it lands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSpec {
    /// Clone URL
    pub url: String,
    /// Destination path, relative to the application workspace
    pub dest: String,
}

impl RepoSpec {
    /// Short display name derived from the destination
    pub fn name(&self) -> &str {
        self.dest
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.dest)
    }
}

/// Default state of the acceleration flags passed to the runtime bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BootstrapDefaults {
    /// Enable the SageAttention2 kernel
    pub sage_attention: bool,
    /// Enable the FlashAttention2 kernel
    pub flash_attention: bool,
}

/// Launcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherConfig {
    /// The wrapped generative-image application
    pub app: RepoSpec,
    /// Extension-module repositories cloned alongside the app
    pub modules: Vec<RepoSpec>,
    /// Optional auxiliary companion tool
    pub companion: Option<RepoSpec>,
    /// Isolated environment directory, relative to the workspace. Its
    /// existence is the environment marker: present means installed.
    pub env_dir: String,
    /// Ordered dependency sets; later sets may widen constraints declared by
    /// earlier ones, so order matters
    pub requirements: Vec<String>,
    /// Port the app publishes its web UI on
    pub web_port: u16,
    /// Model-resource categories to link: local name under `models/` mapped
    /// to the relative path looked up inside each peer root
    pub model_links: IndexMap<String, String>,
    /// Peer application roots that may own a shared model pool, in
    /// precedence order (first peer with the path wins)
    pub peers: Vec<PathBuf>,
    /// Default acceleration flags for the runtime bootstrap
    pub bootstrap: BootstrapDefaults,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let mut model_links = IndexMap::new();
        for category in [
            "checkpoints",
            "diffusion_models",
            "loras",
            "vae",
            "clip",
            "controlnet",
            "upscale_models",
            "embeddings",
        ] {
            model_links.insert(category.to_string(), format!("models/{}", category));
        }
        Self {
            app: RepoSpec {
                url: "https://github.com/comfyanonymous/ComfyUI".to_string(),
                dest: "app".to_string(),
            },
            modules: vec![RepoSpec {
                url: "https://github.com/ltdrdata/ComfyUI-Manager".to_string(),
                dest: "app/custom_nodes/ComfyUI-Manager".to_string(),
            }],
            companion: None,
            env_dir: "env".to_string(),
            requirements: vec![
                "app/requirements.txt".to_string(),
                "app/custom_nodes/ComfyUI-Manager/requirements.txt".to_string(),
            ],
            web_port: 8188,
            model_links,
            peers: Vec::new(),
            bootstrap: BootstrapDefaults::default(),
        }
    }
}

impl LauncherConfig {
    /// Load configuration from an explicit path
    ///
    /// Parses JSON-with-comments and validates the result.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_from_path(path: &Path) -> Result<LauncherConfig> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: LauncherConfig =
            json5::from_str(&content).map_err(|e| ConfigError::Parsing {
                message: e.to_string(),
            })?;
        config.validate()?;
        debug!(
            modules = config.modules.len(),
            requirements = config.requirements.len(),
            "Loaded launcher configuration"
        );
        Ok(config)
    }

    /// Load `launcher.json` from the workspace if present, otherwise defaults
    pub fn load_or_default(workspace: &Path) -> Result<LauncherConfig> {
        let candidate = workspace.join("launcher.json");
        if candidate.exists() {
            Self::load_from_path(&candidate)
        } else {
            debug!("No launcher.json found, using stock configuration");
            Ok(LauncherConfig::default())
        }
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> Result<()> {
        if self.app.url.is_empty() {
            return Err(ConfigError::Validation {
                message: "app repository URL must not be empty".to_string(),
            }
            .into());
        }
        if self.web_port == 0 {
            return Err(ConfigError::Validation {
                message: "webPort must be non-zero".to_string(),
            }
            .into());
        }
        for repo in std::iter::once(&self.app)
            .chain(self.modules.iter())
            .chain(self.companion.iter())
        {
            Self::check_relative(&repo.dest, "repository dest")?;
        }
        Self::check_relative(&self.env_dir, "envDir")?;
        for source in &self.requirements {
            Self::check_relative(source, "requirement source")?;
        }
        Ok(())
    }

    fn check_relative(path: &str, what: &str) -> Result<()> {
        let p = Path::new(path);
        if path.is_empty()
            || p.is_absolute()
            || p.components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ConfigError::Validation {
                message: format!(
                    "{} must be a workspace-relative path without '..': '{}'",
                    what, path
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Absolute path of the environment marker under the given workspace
    pub fn env_marker(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.env_dir)
    }

    /// Absolute path of the app checkout under the given workspace
    pub fn app_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.app.dest)
    }

    /// Local URL of the published web UI
    pub fn web_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.web_port)
    }

    /// All managed repositories in sync order: app first, then extension
    /// modules, then the companion tool
    pub fn managed_repos(&self) -> Vec<&RepoSpec> {
        std::iter::once(&self.app)
            .chain(self.modules.iter())
            .chain(self.companion.iter())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = LauncherConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.model_links.is_empty());
        assert_eq!(config.managed_repos().len(), 2);
        assert_eq!(config.web_url(), "http://127.0.0.1:8188");
    }

    #[test]
    fn test_load_json5_with_comments() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("launcher.json");
        std::fs::write(
            &path,
            r#"{
                // the main application
                "app": { "url": "https://example.com/app.git", "dest": "app" },
                "webPort": 7860,
                "peers": ["/opt/peer-ui"],
            }"#,
        )
        .unwrap();

        let config = LauncherConfig::load_from_path(&path).unwrap();
        assert_eq!(config.app.url, "https://example.com/app.git");
        assert_eq!(config.web_port, 7860);
        assert_eq!(config.peers, vec![PathBuf::from("/opt/peer-ui")]);
        // Unspecified fields fall back to defaults
        assert_eq!(config.env_dir, "env");
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = LauncherConfig::load_from_path(&tmp.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let tmp = TempDir::new().unwrap();
        let config = LauncherConfig::load_or_default(tmp.path()).unwrap();
        assert_eq!(config, LauncherConfig::default());
    }

    #[test]
    fn test_validation_rejects_escaping_paths() {
        let mut config = LauncherConfig::default();
        config.env_dir = "../outside".to_string();
        assert!(config.validate().is_err());

        let mut config = LauncherConfig::default();
        config.app.dest = "/absolute".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut config = LauncherConfig::default();
        config.web_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_repo_spec_name() {
        let repo = RepoSpec {
            url: "https://example.com/x.git".to_string(),
            dest: "app/custom_nodes/Manager".to_string(),
        };
        assert_eq!(repo.name(), "Manager");
        let repo = RepoSpec {
            url: "https://example.com/x.git".to_string(),
            dest: "app".to_string(),
        };
        assert_eq!(repo.name(), "app");
    }

    #[test]
    fn test_parse_error_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("launcher.json");
        std::fs::write(&path, "{ not json at all").unwrap();
        let err = LauncherConfig::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
