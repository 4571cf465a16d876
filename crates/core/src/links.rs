//! Shared model-resource linking
//!
//! Model weight categories are large and commonly already present on disk,
//! owned by a peer application (another locally installed UI with its own
//! model pool). Instead of duplicating storage, each category directory is
//! either linked into the first peer that has it or created empty locally.
//!
//! Re-running is a no-op for every already-resolved category, so the link
//! step can appear in every provisioning run. Failures are fatal: a missing
//! model path silently breaks generation later, which is worse than failing
//! the pipeline now.

use crate::errors::{LinkError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// How a single category was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum LinkOutcome {
    /// The local path already existed (directory or link); nothing done
    AlreadyPresent,
    /// Linked into a peer's pool
    Linked { target: PathBuf },
    /// No peer had the path; an empty local directory was created
    Created,
}

/// Per-category result of a linking pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    /// Category name (local directory name)
    pub category: String,
    /// Resolution outcome
    pub outcome: LinkOutcome,
}

/// Ensure every category under `local_base` exists, linking into peers where
/// possible
///
/// `mapping` is ordered: (category, relative pool path). For each category
/// the first peer root containing the pool path wins; with no peer match an
/// empty directory is created. Existing paths are left untouched.
#[instrument(skip(mapping, peers), fields(local_base = %local_base.display(), categories = mapping.len()))]
pub fn link_shared_resources(
    local_base: &Path,
    mapping: &IndexMap<String, String>,
    peers: &[PathBuf],
) -> Result<Vec<LinkReport>> {
    std::fs::create_dir_all(local_base).map_err(|e| LinkError::DirCreation {
        category: local_base.display().to_string(),
        message: e.to_string(),
    })?;

    let mut reports = Vec::with_capacity(mapping.len());
    for (category, pool_path) in mapping {
        let local = local_base.join(category);
        let outcome = ensure_link(category, &local, pool_path, peers)?;
        debug!(category, ?outcome, "Resolved resource category");
        reports.push(LinkReport {
            category: category.clone(),
            outcome,
        });
    }
    info!(
        linked = reports
            .iter()
            .filter(|r| matches!(r.outcome, LinkOutcome::Linked { .. }))
            .count(),
        created = reports
            .iter()
            .filter(|r| r.outcome == LinkOutcome::Created)
            .count(),
        "Shared resource linking complete"
    );
    Ok(reports)
}

fn ensure_link(
    category: &str,
    local: &Path,
    pool_path: &str,
    peers: &[PathBuf],
) -> Result<LinkOutcome> {
    // symlink_metadata also sees dangling symlinks, which must count as
    // present rather than be silently replaced
    if local.symlink_metadata().is_ok() {
        return Ok(LinkOutcome::AlreadyPresent);
    }

    for peer in peers {
        let candidate = peer.join(pool_path);
        if candidate.is_dir() {
            symlink_dir(&candidate, local).map_err(|e| LinkError::LinkFailed {
                category: category.to_string(),
                target: candidate.display().to_string(),
                message: e.to_string(),
            })?;
            return Ok(LinkOutcome::Linked { target: candidate });
        }
    }

    std::fs::create_dir_all(local).map_err(|e| LinkError::DirCreation {
        category: category.to_string(),
        message: e.to_string(),
    })?;
    Ok(LinkOutcome::Created)
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}
