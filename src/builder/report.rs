//! Per-unit outcomes and the aggregate build report.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::builder::audit::AuditReport;
use crate::builder::platform::PlatformTarget;
use crate::core::errors::{BuildError, FailureStage};
use crate::core::unit::UnitName;

/// Phases of a build invocation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildPhase {
    Configuring,
    ResolvingFlags,
    Compiling,
    ExportingHeaders,
    Auditing,
    Done,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildPhase::Configuring => "configuring",
            BuildPhase::ResolvingFlags => "resolving flags",
            BuildPhase::Compiling => "compiling",
            BuildPhase::ExportingHeaders => "exporting headers",
            BuildPhase::Auditing => "auditing",
            BuildPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happened to one compiled unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The artifact was produced. `translated` is false when the generated C
    /// was up to date and reused.
    Built { artifact: PathBuf, translated: bool },
    /// A step failed; `output` is the tool's raw diagnostic text.
    Failed { stage: FailureStage, output: String },
    /// The unit was interrupted or never started.
    Cancelled,
}

/// Outcome of one compiled unit.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub unit: UnitName,
    pub outcome: UnitOutcome,
    pub duration: Duration,
}

impl UnitResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Built { .. })
    }

    /// The per-unit error, if the unit failed.
    pub fn to_error(&self) -> Option<BuildError> {
        match &self.outcome {
            UnitOutcome::Failed { stage, output } => Some(BuildError::UnitCompileFailure {
                unit: self.unit.to_string(),
                stage: *stage,
                output: output.clone(),
            }),
            _ => None,
        }
    }
}

/// Everything a build invocation produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Target the build ran for
    pub target: PlatformTarget,
    /// Compiled unit results in registration order
    pub results: Vec<UnitResult>,
    /// Header files exported, if requested
    pub headers: Vec<PathBuf>,
    /// Why header export failed, if it did
    pub header_error: Option<String>,
    /// Orphaned generated files
    pub audit: AuditReport,
    /// Phases visited, in order
    pub phases: Vec<BuildPhase>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl BuildReport {
    /// Results of units that failed.
    pub fn failures(&self) -> impl Iterator<Item = &UnitResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, UnitOutcome::Failed { .. }))
    }

    /// Number of units built.
    pub fn built_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Whether any unit was cancelled.
    pub fn was_cancelled(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.outcome == UnitOutcome::Cancelled)
    }

    /// Every compiled unit was built and requested headers were exported.
    pub fn is_success(&self) -> bool {
        self.header_error.is_none() && self.results.iter().all(UnitResult::is_success)
    }

    /// The aggregate error for an unsuccessful build.
    ///
    /// Cancellation wins over unit failures, which win over a header export
    /// failure.
    pub fn error(&self) -> Option<BuildError> {
        if self.was_cancelled() {
            return Some(BuildError::Cancelled);
        }
        let failed: Vec<String> = self.failures().map(|r| r.unit.to_string()).collect();
        if !failed.is_empty() {
            return Some(BuildError::BuildFailed { failed });
        }
        self.header_error
            .clone()
            .map(|reason| BuildError::HeaderExport { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, outcome: UnitOutcome) -> UnitResult {
        UnitResult {
            unit: UnitName::parse(name).unwrap(),
            outcome,
            duration: Duration::ZERO,
        }
    }

    fn report(results: Vec<UnitResult>) -> BuildReport {
        BuildReport {
            target: PlatformTarget::Desktop,
            results,
            headers: vec![],
            header_error: None,
            audit: AuditReport::default(),
            phases: vec![],
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_report_success() {
        let report = report(vec![result(
            "pkg.color",
            UnitOutcome::Built {
                artifact: PathBuf::from("build/pkg/color.so"),
                translated: true,
            },
        )]);
        assert!(report.is_success());
        assert_eq!(report.built_count(), 1);
        assert!(report.error().is_none());
    }

    #[test]
    fn test_report_aggregates_failures() {
        let report = report(vec![
            result(
                "pkg.color",
                UnitOutcome::Built {
                    artifact: PathBuf::from("build/pkg/color.so"),
                    translated: false,
                },
            ),
            result(
                "pkg.font",
                UnitOutcome::Failed {
                    stage: FailureStage::Compile,
                    output: "undefined reference to `TTF_Init'".to_string(),
                },
            ),
        ]);

        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        match report.error() {
            Some(BuildError::BuildFailed { failed }) => assert_eq!(failed, ["pkg.font"]),
            other => panic!("unexpected: {other:?}"),
        }

        let unit_error = report.results[1].to_error().unwrap();
        assert!(unit_error.to_string().contains("pkg.font"));
    }

    #[test]
    fn test_cancellation_takes_precedence() {
        let report = report(vec![
            result(
                "pkg.a",
                UnitOutcome::Failed {
                    stage: FailureStage::Translate,
                    output: String::new(),
                },
            ),
            result("pkg.b", UnitOutcome::Cancelled),
        ]);
        assert!(matches!(report.error(), Some(BuildError::Cancelled)));
    }

    #[test]
    fn test_header_failure_fails_the_report() {
        let mut report = report(vec![result(
            "pkg.color",
            UnitOutcome::Built {
                artifact: PathBuf::from("build/pkg/color.so"),
                translated: true,
            },
        )]);
        report.header_error = Some("header `include/pkg.h` does not exist".to_string());

        assert!(!report.is_success());
        assert!(matches!(report.error(), Some(BuildError::HeaderExport { .. })));

        report.results.push(result(
            "pkg.font",
            UnitOutcome::Failed {
                stage: FailureStage::Compile,
                output: String::new(),
            },
        ));
        assert!(matches!(report.error(), Some(BuildError::BuildFailed { .. })));
    }
}
