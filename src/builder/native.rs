//! Extension module driver.
//!
//! Turns every compiled unit of the frozen registry into a loadable artifact
//! with two supervised tool runs: translate, then compile and link. Units are
//! independent, so they run in parallel and a failure only affects its own
//! unit.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::builder::context::BuildContext;
use crate::builder::report::{UnitOutcome, UnitResult};
use crate::builder::scan::needs_translation;
use crate::builder::toolchain::{CommandSpec, ExtensionInput, TranslateInput};
use crate::core::errors::FailureStage;
use crate::core::flags::LibraryReference;
use crate::core::registry::link_libraries;
use crate::core::unit::{CompilationUnit, UnitName};
use crate::util::fs::{ensure_dir, partial_path, remove_file_if_exists, rename_into_place};
use crate::util::process::{ProcessBuilder, Termination};

/// Everything needed to build one unit. Each invocation owns its own copy of
/// the flags and libraries.
#[derive(Debug, Clone)]
pub struct UnitInvocation {
    pub unit: UnitName,
    /// Located source, `None` if no candidate exists
    pub source: Option<PathBuf>,
    /// Candidates that were looked for
    pub candidates: Vec<PathBuf>,
    /// Generated C file
    pub generated: PathBuf,
    /// Loadable artifact
    pub artifact: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Base libraries followed by the unit's own
    pub libs: Vec<LibraryReference>,
}

/// Outcome of a failed or interrupted step.
enum StepError {
    Failed(FailureStage, String),
    Cancelled,
}

impl From<StepError> for UnitOutcome {
    fn from(err: StepError) -> Self {
        match err {
            StepError::Failed(stage, output) => UnitOutcome::Failed { stage, output },
            StepError::Cancelled => UnitOutcome::Cancelled,
        }
    }
}

/// Builds extension modules for a build context.
pub struct ExtensionDriver<'a> {
    ctx: &'a BuildContext,
}

impl<'a> ExtensionDriver<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        ExtensionDriver { ctx }
    }

    /// One invocation per compiled unit, in registration order.
    pub fn plan(&self) -> Vec<UnitInvocation> {
        self.ctx
            .registry
            .compiled()
            .map(|unit| self.invocation(unit))
            .collect()
    }

    fn invocation(&self, unit: &CompilationUnit) -> UnitInvocation {
        let layout = &self.ctx.layout;
        let generated_name = unit
            .generated_file_name()
            .unwrap_or_else(|| format!("{}.c", unit.name()));
        let artifact = layout
            .build_dir
            .join(unit.artifact_path(self.ctx.toolchain.artifact_extension()));

        UnitInvocation {
            unit: unit.name().clone(),
            source: unit.find_source(&layout.source_dir),
            candidates: unit.source_candidates(&layout.source_dir),
            generated: layout.generated_dir.join(generated_name),
            artifact,
            include_dirs: layout.include_dirs(),
            cflags: self.ctx.base.flags.compile().to_vec(),
            ldflags: self.ctx.base.flags.link().to_vec(),
            libs: link_libraries(&self.ctx.base.libs, unit),
        }
    }

    /// Build every compiled unit on a pool of `ctx.jobs` threads.
    ///
    /// `observer` is called from worker threads as each unit finishes.
    /// Results come back in registration order.
    pub fn execute(&self, observer: &(dyn Fn(&UnitResult) + Sync)) -> Result<Vec<UnitResult>> {
        let invocations = self.plan();
        if invocations.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.ctx.jobs)
            .thread_name(|i| format!("extbuild-worker-{}", i))
            .build()
            .context("failed to start the build worker pool")?;

        tracing::debug!(
            "building {} unit(s) on {} worker(s)",
            invocations.len(),
            self.ctx.jobs
        );

        let results: Vec<UnitResult> = pool.install(|| {
            invocations
                .par_iter()
                .map(|inv| {
                    let result = self.run_unit(inv);
                    observer(&result);
                    result
                })
                .collect()
        });

        Ok(results)
    }

    fn run_unit(&self, inv: &UnitInvocation) -> UnitResult {
        let start = Instant::now();

        let outcome = if self.ctx.cancel.is_cancelled() {
            UnitOutcome::Cancelled
        } else {
            match self.build_unit(inv) {
                Ok(translated) => UnitOutcome::Built {
                    artifact: inv.artifact.clone(),
                    translated,
                },
                Err(err) => err.into(),
            }
        };

        match &outcome {
            UnitOutcome::Built { translated, .. } => {
                let how = if *translated { "translated and compiled" } else { "compiled" };
                tracing::info!("{}: {}", inv.unit, how);
            }
            UnitOutcome::Failed { stage, .. } => {
                tracing::error!("{}: failed to {}", inv.unit, stage);
            }
            UnitOutcome::Cancelled => tracing::debug!("{}: cancelled", inv.unit),
        }

        UnitResult {
            unit: inv.unit.clone(),
            outcome,
            duration: start.elapsed(),
        }
    }

    /// Returns whether the translate step ran.
    fn build_unit(&self, inv: &UnitInvocation) -> std::result::Result<bool, StepError> {
        let Some(source) = &inv.source else {
            let looked: Vec<String> = inv
                .candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            return Err(StepError::Failed(
                FailureStage::Source,
                format!("no source for `{}`; looked for {}", inv.unit, looked.join(", ")),
            ));
        };

        let translate = if self.ctx.force {
            true
        } else {
            needs_translation(source, &inv.generated, &inv.include_dirs)
                .map_err(|e| StepError::Failed(FailureStage::Translate, format!("{:#}", e)))?
        };

        if translate {
            let input = TranslateInput {
                source: source.clone(),
                output: partial_path(&inv.generated),
                include_dirs: inv.include_dirs.clone(),
            };
            let spec = self.ctx.toolchain.translate_command(&input);
            self.run_step(inv, FailureStage::Translate, &spec, &input.output, &inv.generated)?;
        } else {
            tracing::debug!("{}: {} is up to date", inv.unit, inv.generated.display());
        }

        if self.ctx.cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let input = ExtensionInput {
            source: inv.generated.clone(),
            output: partial_path(&inv.artifact),
            include_dirs: inv.include_dirs.clone(),
            cflags: inv.cflags.clone(),
            ldflags: inv.ldflags.clone(),
            libs: inv.libs.clone(),
        };
        let spec = self.ctx.toolchain.extension_command(&input);
        self.run_step(inv, FailureStage::Compile, &spec, &input.output, &inv.artifact)?;

        Ok(translate)
    }

    /// Run one tool writing to `partial`, then move it to `dest`.
    ///
    /// The partial file is removed on every failure path.
    fn run_step(
        &self,
        inv: &UnitInvocation,
        stage: FailureStage,
        spec: &CommandSpec,
        partial: &Path,
        dest: &Path,
    ) -> std::result::Result<(), StepError> {
        let fail = |output: String| {
            let _ = remove_file_if_exists(partial);
            StepError::Failed(stage, output)
        };

        if let Some(parent) = dest.parent() {
            ensure_dir(parent).map_err(|e| fail(format!("{:#}", e)))?;
        }
        remove_file_if_exists(partial).map_err(|e| fail(format!("{:#}", e)))?;

        let cmd = ProcessBuilder::from_spec(spec).cwd(&self.ctx.layout.root);
        tracing::debug!("{}: {}", inv.unit, cmd.display_command());

        let output = cmd
            .exec_supervised(Some(&self.ctx.cancel), None)
            .map_err(|e| fail(format!("{:#}", e)))?;

        if output.termination == Termination::Cancelled {
            let _ = remove_file_if_exists(partial);
            return Err(StepError::Cancelled);
        }

        if !output.success() {
            return Err(fail(output.combined_output()));
        }

        if !partial.is_file() {
            return Err(fail(format!(
                "`{}` exited successfully but did not write {}",
                spec.program.display(),
                partial.display()
            )));
        }

        rename_into_place(partial, dest).map_err(|e| fail(format!("{:#}", e)))
    }
}
