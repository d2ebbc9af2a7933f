//! `extbuild build` command

use std::io::IsTerminal;

use anyhow::Result;

use crate::cli::{BuildArgs, GlobalOptions};
use crate::commands::{load_manifest, load_project_config};
use extbuild::builder::headers::headers_enabled;
use extbuild::builder::{BuildEvent, BuildReport, MessageFormat, PlatformTarget};
use extbuild::ops::{build, BuildOptions};
use extbuild::util::diagnostic::{emit, suggestions, Diagnostic};
use extbuild::util::CancellationToken;
use extbuild::BuildError;

pub fn execute(args: BuildArgs, global: &GlobalOptions) -> Result<()> {
    let manifest = load_manifest(global)?;
    let config = load_project_config(&manifest);

    let target = args
        .target
        .as_deref()
        .map(str::parse::<PlatformTarget>)
        .transpose()?;
    let message_format: MessageFormat = args.message_format.parse()?;

    // Ctrl-C stops in-flight tools and skips units that have not started
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        handler_token.cancel();
    })
    .ok();

    let opts = BuildOptions {
        target,
        jobs: args.jobs,
        force: args.force,
        message_format,
        remove_orphans: args.remove_orphans,
        install_headers: headers_enabled(),
        verbose: global.verbose,
    };

    let report = build(&manifest, &config, &opts, cancel)?;

    match message_format {
        MessageFormat::Json => {
            for event in BuildEvent::orphans(&report) {
                event.emit();
            }
            BuildEvent::finished(&report).emit();
        }
        MessageFormat::Human => print_summary(&report),
    }

    match report.error() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn print_summary(report: &BuildReport) {
    for header in &report.headers {
        eprintln!("    Exported {}", header.display());
    }

    // Reported here only when unit failures take over the final error
    if let Some(reason) = &report.header_error {
        if !matches!(report.error(), Some(BuildError::HeaderExport { .. })) {
            let err = BuildError::HeaderExport {
                reason: reason.clone(),
            };
            emit(&err.to_diagnostic(), std::io::stderr().is_terminal());
        }
    }

    let audit = &report.audit;
    if !audit.is_clean() {
        let mut diag = Diagnostic::warning(format!(
            "{} generated file(s) are not produced by any unit",
            audit.orphans.len()
        ))
        .with_location(&audit.generated_dir);
        for orphan in &audit.orphans {
            diag = diag.with_context(orphan.clone());
        }
        diag = if audit.removed.is_empty() {
            diag.with_suggestion(suggestions::ORPHANS)
        } else {
            diag.with_context(format!("removed {} file(s)", audit.removed.len()))
        };
        emit(&diag, std::io::stderr().is_terminal());
    }

    if report.is_success() {
        eprintln!(
            "    Finished {} unit(s) for {} in {:.2}s",
            report.built_count(),
            report.target,
            report.duration.as_secs_f64()
        );
    }
}
