//! Build context - the value threaded through configure, build and audit.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::platform::{BaseFlags, PlatformTarget};
use crate::builder::toolchain::Toolchain;
use crate::core::manifest::Manifest;
use crate::core::registry::FrozenRegistry;
use crate::util::cancel::CancellationToken;

/// Absolute project directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Manifest directory
    pub root: PathBuf,
    /// Unit sources
    pub source_dir: PathBuf,
    /// Shared declarations and headers
    pub include_dir: PathBuf,
    /// Translator output
    pub generated_dir: PathBuf,
    /// Loadable artifacts
    pub build_dir: PathBuf,
}

impl ProjectLayout {
    /// Resolve the manifest's `[paths]` against its directory.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let root = manifest.root().to_path_buf();
        let paths = &manifest.paths;
        ProjectLayout {
            source_dir: root.join(&paths.source),
            include_dir: root.join(&paths.include),
            generated_dir: root.join(&paths.generated),
            build_dir: root.join(&paths.build),
            root,
        }
    }

    /// Search paths for the translator and the C compiler.
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.include_dir.clone(),
            self.generated_dir.clone(),
            self.source_dir.clone(),
        ]
    }

    /// Where public headers are exported.
    pub fn header_export_dir(&self, package: &str) -> PathBuf {
        self.build_dir.join("include").join(package)
    }
}

/// Everything the driver needs, frozen before compilation starts.
#[derive(Clone)]
pub struct BuildContext {
    /// Package name
    pub package: String,

    /// Project directories
    pub layout: ProjectLayout,

    /// Platform target
    pub target: PlatformTarget,

    /// Base flags and libraries, shared read-only by all units
    pub base: Arc<BaseFlags>,

    /// Toolchain implementation
    pub toolchain: Arc<dyn Toolchain>,

    /// The frozen unit registry
    pub registry: FrozenRegistry,

    /// Worker pool size
    pub jobs: usize,

    /// Retranslate regardless of timestamps
    pub force: bool,

    /// Cancellation shared with the CLI
    pub cancel: CancellationToken,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("package", &self.package)
            .field("layout", &self.layout)
            .field("target", &self.target)
            .field("base", &self.base)
            .field("units", &self.registry.len())
            .field("jobs", &self.jobs)
            .field("force", &self.force)
            .finish()
    }
}

impl BuildContext {
    /// Create a build context with one worker per core.
    pub fn new(
        package: impl Into<String>,
        layout: ProjectLayout,
        target: PlatformTarget,
        base: BaseFlags,
        toolchain: Arc<dyn Toolchain>,
        registry: FrozenRegistry,
    ) -> Self {
        BuildContext {
            package: package.into(),
            layout,
            target,
            base: Arc::new(base),
            toolchain,
            registry,
            jobs: effective_jobs(None),
            force: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the requested worker count (capped at available cores).
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = effective_jobs(jobs);
        self
    }

    /// Retranslate every unit.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Generated-sources directory.
    pub fn generated_dir(&self) -> &Path {
        &self.layout.generated_dir
    }
}

/// Worker count: the request capped at available cores, at least one.
pub fn effective_jobs(requested: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.unwrap_or(cores).clamp(1, cores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_jobs_bounds() {
        let cores = effective_jobs(None);
        assert!(cores >= 1);
        assert_eq!(effective_jobs(Some(0)), 1);
        assert_eq!(effective_jobs(Some(1)), 1);
        assert_eq!(effective_jobs(Some(usize::MAX)), cores);
    }

    #[test]
    fn test_layout_from_manifest() {
        let content = r#"
[package]
name = "pkg"

[paths]
generated = "gen-static"
"#;
        let manifest = Manifest::parse(content, Path::new("/proj/extbuild.toml")).unwrap();
        let layout = ProjectLayout::from_manifest(&manifest);

        assert_eq!(layout.source_dir, PathBuf::from("/proj/src"));
        assert_eq!(layout.generated_dir, PathBuf::from("/proj/gen-static"));
        assert_eq!(
            layout.header_export_dir("pkg"),
            PathBuf::from("/proj/build/include/pkg")
        );
        assert_eq!(layout.include_dirs()[0], PathBuf::from("/proj/include"));
    }
}
