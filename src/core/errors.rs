//! Build error types and diagnostics.

use std::fmt;

use miette::Diagnostic as MietteDiagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// The step of a compiled unit's build that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// The unit's source file could not be located.
    Source,
    /// Translating the extension source to C failed.
    Translate,
    /// Compiling and linking the generated C failed.
    Compile,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Source => write!(f, "locate source"),
            FailureStage::Translate => write!(f, "translate"),
            FailureStage::Compile => write!(f, "compile"),
        }
    }
}

/// Error raised while configuring or running a build.
///
/// `ToolUnavailable`, `DuplicateUnit` and `InvalidUnitName` are configuration
/// errors and abort before any unit compiles. `UnitCompileFailure` is recorded
/// per unit; the aggregate surfaces as `BuildFailed`.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error("flag query `{command}` failed")]
    #[diagnostic(
        code(extbuild::config::tool_unavailable),
        help("Install the native library's development package so its config tool is on PATH")
    )]
    ToolUnavailable { command: String, stderr: String },

    #[error("unit `{name}` is registered more than once")]
    #[diagnostic(
        code(extbuild::config::duplicate_unit),
        help("Remove one of the `[[unit]]` entries named `{name}`")
    )]
    DuplicateUnit { name: String },

    #[error("invalid unit name `{name}`: {reason}")]
    #[diagnostic(code(extbuild::config::invalid_unit))]
    InvalidUnitName { name: String, reason: String },

    #[error("unit `{unit}` failed to {stage}")]
    #[diagnostic(code(extbuild::build::unit_failed))]
    UnitCompileFailure {
        unit: String,
        stage: FailureStage,
        output: String,
    },

    #[error("{} unit(s) failed to build: {}", .failed.len(), .failed.join(", "))]
    #[diagnostic(code(extbuild::build::failed))]
    BuildFailed { failed: Vec<String> },

    #[error("could not export headers: {reason}")]
    #[diagnostic(
        code(extbuild::build::headers),
        help("Check the `[headers] files` list in extbuild.toml")
    )]
    HeaderExport { reason: String },

    #[error("build cancelled")]
    #[diagnostic(code(extbuild::build::cancelled))]
    Cancelled,
}

impl BuildError {
    /// Whether this error is raised before any unit is compiled.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BuildError::ToolUnavailable { .. }
                | BuildError::DuplicateUnit { .. }
                | BuildError::InvalidUnitName { .. }
        )
    }

    /// Convert to a user-friendly diagnostic.
    ///
    /// The code and the first suggestion come from the `miette` metadata.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = self.describe();
        if let Some(code) = MietteDiagnostic::code(self) {
            diag = diag.with_code(code.to_string());
        }
        if let Some(help) = MietteDiagnostic::help(self) {
            diag.suggestions.insert(0, help.to_string());
        }
        diag
    }

    fn describe(&self) -> Diagnostic {
        match self {
            BuildError::ToolUnavailable { command, stderr } => {
                let mut diag = Diagnostic::error(format!("flag query `{}` failed", command));
                for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                    diag = diag.with_context(line.to_string());
                }
                diag.with_suggestion(suggestions::EMBEDDED_TARGET)
            }

            BuildError::DuplicateUnit { name } => {
                Diagnostic::error(format!("unit `{}` is registered more than once", name))
            }

            BuildError::InvalidUnitName { name, reason } => {
                Diagnostic::error(format!("invalid unit name `{}`", name))
                    .with_context(reason.clone())
                    .with_suggestion("Unit names are dotted module paths such as `pkg.module`")
            }

            BuildError::UnitCompileFailure {
                unit,
                stage,
                output,
            } => {
                let mut diag = Diagnostic::error(format!("unit `{}` failed to {}", unit, stage));
                for line in output.lines() {
                    diag = diag.with_context(line.to_string());
                }
                diag
            }

            BuildError::BuildFailed { failed } => {
                let mut diag = Diagnostic::error(format!(
                    "{} unit(s) failed to build",
                    failed.len()
                ));
                for unit in failed {
                    diag = diag.with_context(format!("`{}`", unit));
                }
                diag.with_suggestion(suggestions::BUILD_FAILED)
            }

            BuildError::HeaderExport { reason } => {
                Diagnostic::error("could not export headers").with_context(reason.clone())
            }

            BuildError::Cancelled => Diagnostic::error("build cancelled")
                .with_context("completed units were kept; interrupted units left no output"),
        }
    }
}
