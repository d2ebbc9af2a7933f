//! Configuration file support for extbuild.
//!
//! extbuild supports two configuration file locations:
//! - Global: `~/.extbuild/config.toml` - User-wide defaults
//! - Project: `.extbuild/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config; CLI flags and
//! environment variables take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::query::DEFAULT_QUERY_TIMEOUT;

/// extbuild configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Number of parallel unit builds (capped at available cores)
    pub jobs: Option<usize>,

    /// Source translator program
    pub translator: Option<String>,

    /// C compiler driver
    pub cc: Option<String>,

    /// Additional compiler flags
    pub cflags: Vec<String>,

    /// Additional linker flags
    pub ldflags: Vec<String>,

    /// Seconds to wait for a flag query before giving up
    pub query_timeout_secs: Option<u64>,

    /// Always retranslate, ignoring timestamps
    pub force: bool,
}

impl BuildConfig {
    /// Timeout for flag queries.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_QUERY_TIMEOUT)
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing
    /// or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let build = other.build;
        if build.jobs.is_some() {
            self.build.jobs = build.jobs;
        }
        if build.translator.is_some() {
            self.build.translator = build.translator;
        }
        if build.cc.is_some() {
            self.build.cc = build.cc;
        }
        if !build.cflags.is_empty() {
            self.build.cflags = build.cflags;
        }
        if !build.ldflags.is_empty() {
            self.build.ldflags = build.ldflags;
        }
        if build.query_timeout_secs.is_some() {
            self.build.query_timeout_secs = build.query_timeout_secs;
        }
        self.build.force |= build.force;
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.extbuild/config.toml)
/// 2. Global config (~/.extbuild/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global) = global_path {
        config.merge(Config::load_or_default(global));
    }

    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global extbuild config directory (~/.extbuild).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".extbuild"))
}

/// Get the global config path (~/.extbuild/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.extbuild/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".extbuild").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.build.jobs, None);
        assert_eq!(config.build.query_timeout(), DEFAULT_QUERY_TIMEOUT);
        assert!(!config.build.force);
    }

    #[test]
    fn test_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");

        std::fs::write(
            &global,
            "[build]\njobs = 2\ntranslator = \"cython3\"\ncflags = [\"-O2\"]\n",
        )
        .unwrap();
        std::fs::write(&project, "[build]\njobs = 8\nquery_timeout_secs = 5\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.build.jobs, Some(8));
        assert_eq!(config.build.translator.as_deref(), Some("cython3"));
        assert_eq!(config.build.cflags, vec!["-O2".to_string()]);
        assert_eq!(config.build.query_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_and_broken_files_fall_back() {
        let tmp = TempDir::new().unwrap();
        let broken = tmp.path().join("broken.toml");
        std::fs::write(&broken, "[build\njobs = ").unwrap();

        let config = load_config(Some(&tmp.path().join("absent.toml")), &broken);
        assert_eq!(config.build.jobs, None);
    }

    #[test]
    fn test_project_config_path() {
        assert_eq!(
            project_config_path(Path::new("/proj")),
            Path::new("/proj").join(".extbuild").join("config.toml")
        );
    }
}
