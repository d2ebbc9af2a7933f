//! `extbuild audit` command

use anyhow::Result;

use crate::cli::{AuditArgs, GlobalOptions};
use crate::commands::load_manifest;
use extbuild::ops::audit_only;

pub fn execute(args: AuditArgs, global: &GlobalOptions) -> Result<()> {
    let manifest = load_manifest(global)?;
    let report = audit_only(&manifest, args.remove)?;

    if report.is_clean() {
        eprintln!("       Clean {}", report.generated_dir.display());
        return Ok(());
    }

    // Orphans go to stdout so they can be piped
    for orphan in &report.orphans {
        println!("{}", orphan);
    }

    if args.remove {
        eprintln!("     Removed {} orphaned file(s)", report.removed.len());
    } else {
        eprintln!(
            "       Found {} orphaned file(s) in {}",
            report.orphans.len(),
            report.generated_dir.display()
        );
    }

    Ok(())
}
