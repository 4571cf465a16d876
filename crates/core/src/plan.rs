//! Standard provisioning pipelines
//!
//! The launcher ships a fixed set of named pipelines built from the loaded
//! configuration. The composite scripts are thin delegation chains over the
//! single-purpose ones, so each stage exists exactly once and every composite
//! inherits its idempotence.
//!
//! - `sync`: clone-or-pull every managed repository
//! - `workspace`: create the working directories the app expects
//! - `deps`: ensure the isolated environment and install dependency sets
//! - `bootstrap`: provision the torch runtime and acceleration kernels
//! - `links`: resolve shared model-resource categories
//! - `install`: full provisioning (sync, workspace, deps, bootstrap, links)
//! - `update`: sync, deps, bootstrap
//! - `quick-update`: sync only

use crate::bootstrap::BootstrapOptions;
use crate::config::LauncherConfig;
use crate::pipeline::{Pipeline, PipelineRegistry, PipelineStep};
use indexmap::IndexMap;
use std::path::PathBuf;

fn delegate(target: &str) -> PipelineStep {
    PipelineStep::Delegate {
        target: target.to_string(),
        params: IndexMap::new(),
    }
}

/// Build the standard pipeline registry for a configuration
pub fn standard_registry(config: &LauncherConfig) -> PipelineRegistry {
    let mut registry = PipelineRegistry::new();

    let sync_steps = config
        .managed_repos()
        .into_iter()
        .map(|repo| PipelineStep::Sync {
            url: repo.url.clone(),
            dest: PathBuf::from(&repo.dest),
        })
        .collect();
    registry.register(Pipeline::new("sync", sync_steps));

    // The app reads these relative to its own checkout and does not create
    // them itself
    registry.register(Pipeline::new(
        "workspace",
        vec![PipelineStep::Shell {
            commands: vec!["mkdir -p outputs workflows".to_string()],
            working_dir: Some(PathBuf::from(&config.app.dest)),
            isolated_env: false,
        }],
    ));

    registry.register(Pipeline::new(
        "deps",
        vec![PipelineStep::InstallDeps {
            requirements: config.requirements.clone(),
        }],
    ));

    registry.register(Pipeline::new(
        "bootstrap",
        vec![PipelineStep::Bootstrap {
            options: BootstrapOptions::from(config.bootstrap),
        }],
    ));

    registry.register(Pipeline::new(
        "links",
        vec![PipelineStep::Link {
            mapping: config.model_links.clone(),
            peers: config.peers.clone(),
            local_base: PathBuf::from(&config.app.dest).join("models"),
        }],
    ));

    registry.register(Pipeline::new(
        "install",
        vec![
            delegate("sync"),
            delegate("workspace"),
            delegate("deps"),
            delegate("bootstrap"),
            delegate("links"),
        ],
    ));
    registry.register(Pipeline::new(
        "update",
        vec![delegate("sync"), delegate("deps"), delegate("bootstrap")],
    ));
    registry.register(Pipeline::new("quick-update", vec![delegate("sync")]));

    registry
}
