//! Core data structures for extbuild.
//!
//! This module contains the foundational types used throughout extbuild:
//! - Flag sets and library references
//! - Compilation units and their registry
//! - The `extbuild.toml` manifest
//! - The build error taxonomy

pub mod errors;
pub mod flags;
pub mod manifest;
pub mod registry;
pub mod unit;

pub use errors::{BuildError, FailureStage};
pub use flags::{split_flags, FlagSet, LibraryReference};
pub use manifest::{find_manifest, Manifest, MANIFEST_NAME};
pub use registry::{link_libraries, FrozenRegistry, UnitRegistry};
pub use unit::{CompilationUnit, UnitKind, UnitName};
