//! `extbuild flags` command

use anyhow::Result;

use crate::cli::{FlagsArgs, GlobalOptions};
use crate::commands::{load_manifest, load_project_config};
use extbuild::builder::PlatformTarget;
use extbuild::ops::{configure, resolve_flags};

pub fn execute(args: FlagsArgs, global: &GlobalOptions) -> Result<()> {
    let manifest = load_manifest(global)?;
    let config = load_project_config(&manifest);

    let target = args
        .target
        .as_deref()
        .map(str::parse::<PlatformTarget>)
        .transpose()?;

    let configured = configure(&manifest, target)?;
    let base = resolve_flags(&configured, &config)?;

    let libs: Vec<String> = base.libs.iter().map(|l| l.link_arg()).collect();
    let compile = base.flags.compile().join(" ");
    let link = base
        .flags
        .link()
        .iter()
        .cloned()
        .chain(libs)
        .collect::<Vec<_>>()
        .join(" ");

    if args.compile {
        println!("{}", compile);
    } else if args.link {
        println!("{}", link);
    } else {
        println!("target:  {}", configured.target);
        println!("cflags:  {}", compile);
        println!("ldflags: {}", link);
    }

    Ok(())
}
