//! Implementation of `extbuild build`.
//!
//! A build walks `Configuring → ResolvingFlags → Compiling → Auditing → Done`,
//! with `ExportingHeaders` before the audit when requested. Configuration
//! errors abort before any unit compiles. Once compilation has started the
//! audit always runs, even if units or the header export failed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::builder::audit::{audit, AuditReport};
use crate::builder::context::{BuildContext, ProjectLayout};
use crate::builder::events::MessageFormat;
use crate::builder::executor::BuildExecutor;
use crate::builder::headers::export_headers;
use crate::builder::platform::{BaseFlags, FlagStrategy, PlatformTarget};
use crate::builder::report::{BuildPhase, BuildReport};
use crate::builder::toolchain::CythonToolchain;
use crate::core::errors::BuildError;
use crate::core::manifest::Manifest;
use crate::core::registry::FrozenRegistry;
use crate::util::cancel::CancellationToken;
use crate::util::config::Config;
use crate::util::fs::remove_dir_all_if_exists;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Platform target; detected from the environment when `None`
    pub target: Option<PlatformTarget>,

    /// Number of parallel unit builds
    pub jobs: Option<usize>,

    /// Retranslate every unit
    pub force: bool,

    /// Output format
    pub message_format: MessageFormat,

    /// Delete orphaned generated files
    pub remove_orphans: bool,

    /// Export public headers
    pub install_headers: bool,

    /// Verbose output
    pub verbose: bool,
}

/// The result of the configuring phase.
#[derive(Debug, Clone)]
pub struct Configured {
    pub layout: ProjectLayout,
    pub registry: FrozenRegistry,
    pub target: PlatformTarget,
    pub strategy: FlagStrategy,
}

/// Register units, freeze the registry and pick the flag strategy.
pub fn configure(manifest: &Manifest, target: Option<PlatformTarget>) -> Result<Configured> {
    let registry = manifest.registry()?.freeze();

    let target = match target {
        Some(target) => target,
        None => PlatformTarget::detect()?,
    };

    let strategy = FlagStrategy::for_target(target, &manifest.native);

    tracing::debug!(
        "configured {} unit(s) ({} compiled) for {}",
        registry.len(),
        registry.compiled().count(),
        target
    );

    Ok(Configured {
        layout: ProjectLayout::from_manifest(manifest),
        registry,
        target,
        strategy,
    })
}

/// Resolve the base flags once for the whole build.
pub fn resolve_flags(configured: &Configured, config: &Config) -> Result<BaseFlags, BuildError> {
    tracing::debug!("resolving flags: {}", configured.strategy.describe());
    configured.strategy.resolve(config.build.query_timeout())
}

/// Build every compiled unit of `manifest`.
///
/// Unit failures do not make this return `Err`; check
/// [`BuildReport::error`] for the aggregate outcome.
pub fn build(
    manifest: &Manifest,
    config: &Config,
    opts: &BuildOptions,
    cancel: CancellationToken,
) -> Result<BuildReport> {
    let start = Instant::now();
    let mut phases = vec![BuildPhase::Configuring];

    let configured = configure(manifest, opts.target)?;

    phases.push(BuildPhase::ResolvingFlags);
    let base = resolve_flags(&configured, config)?;

    let toolchain = CythonToolchain::resolve(&manifest.toolchain, &config.build);
    let Configured {
        layout,
        registry,
        target,
        ..
    } = configured;

    let ctx = BuildContext::new(
        manifest.name(),
        layout,
        target,
        base,
        Arc::new(toolchain),
        registry,
    )
    .with_jobs(opts.jobs.or(config.build.jobs))
    .with_force(opts.force || config.build.force)
    .with_cancellation(cancel);

    phases.push(BuildPhase::Compiling);
    let results = BuildExecutor::new(&ctx)
        .verbose(opts.verbose)
        .message_format(opts.message_format)
        .execute()?;

    let mut headers = Vec::new();
    let mut header_error = None;
    if opts.install_headers {
        phases.push(BuildPhase::ExportingHeaders);
        let dest = ctx.layout.header_export_dir(&ctx.package);
        match export_headers(&ctx.layout.root, &manifest.headers.files, &dest) {
            Ok(exported) => headers = exported,
            Err(e) => {
                tracing::error!("could not export headers: {:#}", e);
                header_error = Some(format!("{:#}", e));
            }
        }
    }

    phases.push(BuildPhase::Auditing);
    let audit = audit_generated(&ctx, opts.remove_orphans);

    phases.push(BuildPhase::Done);

    Ok(BuildReport {
        target,
        results,
        headers,
        header_error,
        audit,
        phases,
        duration: start.elapsed(),
    })
}

/// The audit is advisory: an unreadable directory is logged, not returned.
fn audit_generated(ctx: &BuildContext, remove: bool) -> AuditReport {
    let expected = ctx.registry.expected_generated();
    audit(ctx.generated_dir(), &expected, remove).unwrap_or_else(|e| {
        tracing::warn!("could not audit {}: {:#}", ctx.generated_dir().display(), e);
        AuditReport {
            generated_dir: ctx.generated_dir().to_path_buf(),
            ..AuditReport::default()
        }
    })
}

/// Audit the generated-sources directory without building.
pub fn audit_only(manifest: &Manifest, remove: bool) -> Result<AuditReport> {
    let registry = manifest.registry()?.freeze();
    let layout = ProjectLayout::from_manifest(manifest);
    audit(&layout.generated_dir, &registry.expected_generated(), remove)
}

/// Remove build output, and generated sources when `generated` is set.
/// Returns the directories that were removed.
pub fn clean(manifest: &Manifest, generated: bool) -> Result<Vec<PathBuf>> {
    let layout = ProjectLayout::from_manifest(manifest);
    let mut dirs = vec![layout.build_dir];
    if generated {
        dirs.push(layout.generated_dir);
    }

    let mut removed = Vec::new();
    for dir in dirs {
        if dir.exists() {
            remove_dir_all_if_exists(&dir)?;
            removed.push(dir);
        }
    }
    Ok(removed)
}
