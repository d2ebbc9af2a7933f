//! `extbuild.toml` manifest parsing and schema.
//!
//! The manifest is the declarative list of units plus the paths, flag
//! queries and toolchain settings used to build them. Units are registered
//! in the order they appear in the file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::query::FlagQuery;
use crate::core::errors::BuildError;
use crate::core::flags::LibraryReference;
use crate::core::registry::UnitRegistry;
use crate::core::unit::UnitKind;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "extbuild.toml";

/// Package metadata from `[package]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Project layout from `[paths]`, relative to the manifest directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Unit sources (`.pyx` / `.py`)
    pub source: PathBuf,
    /// Shared declaration files and headers
    pub include: PathBuf,
    /// Translator output
    pub generated: PathBuf,
    /// Loadable artifacts and exported headers
    pub build: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            source: PathBuf::from("src"),
            include: PathBuf::from("include"),
            generated: PathBuf::from("gen"),
            build: PathBuf::from("build"),
        }
    }
}

/// Native library flag acquisition from `[native]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NativeConfig {
    /// Desktop query printing compiler flags
    pub cflags_query: FlagQuery,
    /// Desktop query printing linker flags and libraries
    pub libs_query: FlagQuery,
    /// Fixed base libraries for embedded targets
    pub embedded_libs: Vec<LibraryReference>,
}

impl Default for NativeConfig {
    fn default() -> Self {
        NativeConfig {
            cflags_query: FlagQuery::shell("sdl2-config --cflags"),
            libs_query: FlagQuery::shell("sdl2-config --libs"),
            embedded_libs: vec![LibraryReference::new("SDL2")],
        }
    }
}

/// Toolchain overrides from `[toolchain]`.
///
/// Environment variables and `.extbuild/config.toml` take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSection {
    /// Source translator (defaults to `cython`)
    pub translator: Option<String>,
    /// C compiler driver
    pub cc: Option<String>,
    /// Extra compiler flags appended after the base flags
    pub cflags: Vec<String>,
    /// Extra linker flags appended after the base flags
    pub ldflags: Vec<String>,
}

/// Public headers from `[headers]`, exported only when requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadersConfig {
    pub files: Vec<PathBuf>,
}

/// A `[[unit]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub kind: UnitKind,
    #[serde(default)]
    pub libs: Vec<LibraryReference>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    package: PackageMetadata,
    #[serde(default)]
    paths: PathsConfig,
    #[serde(default)]
    native: NativeConfig,
    #[serde(default)]
    toolchain: ToolchainSection,
    #[serde(default)]
    headers: HeadersConfig,
    #[serde(default, rename = "unit")]
    units: Vec<UnitSpec>,
}

/// The parsed `extbuild.toml`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub package: PackageMetadata,
    pub paths: PathsConfig,
    pub native: NativeConfig,
    pub toolchain: ToolchainSection,
    pub headers: HeadersConfig,
    pub units: Vec<UnitSpec>,

    /// Path to the manifest file
    path: PathBuf,
}

impl Manifest {
    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::parse(&content, path)
    }

    /// Parse manifest content; `path` is used for the project root and errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))?;

        for unit in &raw.units {
            if unit.kind == UnitKind::Interpreted && !unit.libs.is_empty() {
                bail!(
                    "unit `{}` is interpreted but declares libraries\n\
                     hint: set `kind = \"compiled\"` or remove `libs`",
                    unit.name
                );
            }
        }

        Ok(Manifest {
            package: raw.package,
            paths: raw.paths,
            native: raw.native,
            toolchain: raw.toolchain,
            headers: raw.headers,
            units: raw.units,
            path: path.to_path_buf(),
        })
    }

    /// Locate and load the manifest, either from an explicit path or by
    /// searching upwards from `cwd`.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_manifest(cwd).with_context(|| {
                format!(
                    "could not find `{}` in `{}` or any parent directory",
                    MANIFEST_NAME,
                    cwd.display()
                )
            })?,
        };
        Self::load(&path)
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Path to the manifest file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Project root (the manifest's directory).
    pub fn root(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Register every declared unit, in file order.
    pub fn registry(&self) -> Result<UnitRegistry, BuildError> {
        let mut registry = UnitRegistry::new();
        for unit in &self.units {
            match unit.kind {
                UnitKind::Interpreted => registry.register_interpreted(&unit.name)?,
                UnitKind::Compiled => {
                    registry.register_compiled(&unit.name, unit.libs.iter().cloned())?
                }
            }
        }
        Ok(registry)
    }
}

/// Search `start` and its ancestors for `extbuild.toml`.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_NAME))
        .find(|candidate| candidate.is_file())
}
