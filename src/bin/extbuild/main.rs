//! extbuild CLI - builds native extension modules

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use extbuild::util::diagnostic::emit;
use extbuild::BuildError;

mod cli;
mod commands;

use cli::{Cli, Commands, GlobalOptions};

fn main() {
    if let Err(e) = run() {
        match e.downcast_ref::<BuildError>() {
            Some(err) => emit(&err.to_diagnostic(), std::io::stderr().is_terminal()),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging; stdout is reserved for command output
    let filter = if cli.verbose {
        EnvFilter::new("extbuild=debug")
    } else {
        EnvFilter::new("extbuild=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = GlobalOptions {
        verbose: cli.verbose,
        manifest_path: cli.manifest_path,
    };

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &global),
        Commands::Audit(args) => commands::audit::execute(args, &global),
        Commands::Flags(args) => commands::flags::execute(args, &global),
        Commands::Units => commands::units::execute(&global),
        Commands::Clean(args) => commands::clean::execute(args, &global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
