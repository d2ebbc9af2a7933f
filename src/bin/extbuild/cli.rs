//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// extbuild - build native extension modules from a declarative unit list
#[derive(Parser)]
#[command(name = "extbuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to extbuild.toml (defaults to searching upwards from the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every compiled unit
    Build(BuildArgs),

    /// List generated sources that no unit produces
    Audit(AuditArgs),

    /// Show the resolved base compile/link flags
    Flags(FlagsArgs),

    /// List registered units
    Units,

    /// Remove build output
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub verbose: bool,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Platform target (desktop, android, ios); detected from the environment by default
    #[arg(long)]
    pub target: Option<String>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Retranslate every unit even if its generated C is up to date
    #[arg(long)]
    pub force: bool,

    /// Output format (human, json)
    #[arg(long, default_value = "human")]
    pub message_format: String,

    /// Delete generated sources that no unit produces
    #[arg(long)]
    pub remove_orphans: bool,
}

#[derive(Args)]
pub struct AuditArgs {
    /// Delete the orphaned files
    #[arg(long)]
    pub remove: bool,
}

#[derive(Args)]
pub struct FlagsArgs {
    /// Platform target (desktop, android, ios)
    #[arg(long)]
    pub target: Option<String>,

    /// Show only compile flags
    #[arg(long, conflicts_with = "link")]
    pub compile: bool,

    /// Show only link flags and libraries
    #[arg(long)]
    pub link: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Also remove generated sources
    #[arg(long)]
    pub generated: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
