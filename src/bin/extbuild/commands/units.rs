//! `extbuild units` command

use anyhow::Result;

use crate::cli::GlobalOptions;
use crate::commands::load_manifest;

pub fn execute(global: &GlobalOptions) -> Result<()> {
    let manifest = load_manifest(global)?;
    let registry = manifest.registry()?.freeze();

    for unit in registry.units() {
        let generated = unit.generated_file_name().unwrap_or_else(|| "-".to_string());
        let libs: Vec<&str> = unit.libs().iter().map(|l| l.name()).collect();
        println!(
            "{:<32} {:<12} {:<36} {}",
            unit.name().to_string(),
            unit.kind().to_string(),
            generated,
            libs.join(" ")
        );
    }

    if global.verbose {
        eprintln!(
            "{} unit(s), {} compiled",
            registry.len(),
            registry.compiled().count()
        );
    }

    Ok(())
}
