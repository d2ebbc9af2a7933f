//! `extbuild clean` command

use anyhow::Result;

use crate::cli::{CleanArgs, GlobalOptions};
use crate::commands::load_manifest;
use extbuild::ops::clean;

pub fn execute(args: CleanArgs, global: &GlobalOptions) -> Result<()> {
    let manifest = load_manifest(global)?;
    let removed = clean(&manifest, args.generated)?;

    if removed.is_empty() {
        eprintln!("Nothing to clean");
    }
    for dir in removed {
        eprintln!("     Removed {}", dir.display());
    }

    Ok(())
}
