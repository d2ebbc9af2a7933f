//! extbuild - a declarative build orchestrator for native extension libraries
//!
//! This crate provides the core library functionality for extbuild:
//! platform flag resolution, the compilation unit registry, the parallel
//! extension compiler driver, and the generated-artifact auditor.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

pub use crate::core::{
    errors::BuildError,
    flags::{FlagSet, LibraryReference},
    manifest::Manifest,
    registry::{FrozenRegistry, UnitRegistry},
    unit::{CompilationUnit, UnitKind, UnitName},
};

pub use builder::{BuildContext, BuildReport, PlatformTarget};
pub use util::config::Config;
