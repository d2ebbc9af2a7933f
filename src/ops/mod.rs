//! High-level operations.
//!
//! This module contains the implementation of extbuild commands.

pub mod build;

pub use build::{audit_only, build, clean, configure, resolve_flags, BuildOptions, Configured};
