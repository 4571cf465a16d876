//! Core library for the fusionctl launcher
//!
//! This crate contains shared logic for menu state derivation, provisioning
//! pipelines, repository syncing, dependency installation, resource linking,
//! process tracking, logging, and error handling.

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod git;
pub mod installer;
pub mod links;
pub mod logging;
pub mod menu;
pub mod pipeline;
pub mod plan;
pub mod process;
pub mod progress;
pub mod state;

// Re-export IndexMap for use by dependent crates (preserves insertion order for ordered maps)
pub use indexmap::IndexMap;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
        assert!(version.contains('.'));
    }
}
