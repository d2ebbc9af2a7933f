//! Command implementations

pub mod audit;
pub mod build;
pub mod clean;
pub mod completions;
pub mod flags;
pub mod units;

use anyhow::{Context, Result};

use crate::cli::GlobalOptions;
use extbuild::core::Manifest;
use extbuild::util::config::{global_config_path, load_config, project_config_path};
use extbuild::Config;

/// Find and load the manifest for this invocation.
pub fn load_manifest(global: &GlobalOptions) -> Result<Manifest> {
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    Manifest::discover(global.manifest_path.as_deref(), &cwd)
}

/// Global config merged with the project's config.
pub fn load_project_config(manifest: &Manifest) -> Config {
    load_config(
        global_config_path().as_deref(),
        &project_config_path(manifest.root()),
    )
}
