//! Build executor with progress reporting.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::context::BuildContext;
use crate::builder::events::{BuildEvent, MessageFormat};
use crate::builder::native::ExtensionDriver;
use crate::builder::report::{UnitOutcome, UnitResult};

/// Runs the extension driver and reports per-unit results.
pub struct BuildExecutor<'a> {
    ctx: &'a BuildContext,
    verbose: bool,
    format: MessageFormat,
}

impl<'a> BuildExecutor<'a> {
    /// Create a new build executor.
    pub fn new(ctx: &'a BuildContext) -> Self {
        BuildExecutor {
            ctx,
            verbose: false,
            format: MessageFormat::Human,
        }
    }

    /// Enable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the output format.
    pub fn message_format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }

    /// Build every compiled unit.
    ///
    /// Results are reported in registration order once all units are done,
    /// so output from parallel workers never interleaves.
    pub fn execute(&self) -> Result<Vec<UnitResult>> {
        let total = self.ctx.registry.compiled().count();

        match self.format {
            MessageFormat::Json => {
                BuildEvent::started(&self.ctx.package, self.ctx.target.as_str(), total).emit();
            }
            MessageFormat::Human if self.verbose => {
                eprintln!(
                    "   Compiling {} unit(s) for {} with {} job(s)",
                    total, self.ctx.target, self.ctx.jobs
                );
            }
            MessageFormat::Human => {}
        }

        let pb = if self.format == MessageFormat::Human && !self.verbose && total > 1 {
            let pb = ProgressBar::new(total as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        let observer = |result: &UnitResult| {
            if let Some(pb) = &pb {
                pb.set_message(result.unit.to_string());
                pb.inc(1);
            }
        };

        let results = ExtensionDriver::new(self.ctx).execute(&observer)?;

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        for result in &results {
            self.report(result);
        }

        Ok(results)
    }

    fn report(&self, result: &UnitResult) {
        if self.format == MessageFormat::Json {
            BuildEvent::unit(result).emit();
            return;
        }

        match &result.outcome {
            UnitOutcome::Built { artifact, translated } => {
                if self.verbose {
                    let fresh = if *translated { "" } else { " (generated C reused)" };
                    eprintln!(
                        "    Compiled {} -> {}{} in {:.2}s",
                        result.unit,
                        artifact.display(),
                        fresh,
                        result.duration.as_secs_f64()
                    );
                } else {
                    eprintln!("    Compiled {}", result.unit);
                }
            }
            UnitOutcome::Failed { stage, output } => {
                eprintln!("      Failed {} (could not {})", result.unit, stage);
                for line in output.lines() {
                    eprintln!("             | {}", line);
                }
            }
            UnitOutcome::Cancelled => eprintln!("   Cancelled {}", result.unit),
        }
    }
}
