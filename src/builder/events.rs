//! Build event types for JSON output.
//!
//! These events are emitted one JSON object per line on stdout when using
//! `--message-format=json`.
//!
//! # Event Types
//!
//! - `build-started`: The build began compiling units
//! - `unit-finished`: A unit's artifact was produced
//! - `unit-failed`: A unit failed; carries the raw tool output
//! - `unit-cancelled`: A unit was interrupted or never started
//! - `orphan-artifact`: A generated file no unit produces
//! - `build-finished`: Build completed (success or failure)
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::bail;
use serde::Serialize;

use crate::builder::report::{BuildReport, UnitOutcome, UnitResult};
use crate::core::errors::FailureStage;

/// Output format for build results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    /// Status lines and a progress bar on stderr
    #[default]
    Human,
    /// JSON events on stdout
    Json,
}

impl FromStr for MessageFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "human" => Ok(MessageFormat::Human),
            "json" => Ok(MessageFormat::Json),
            other => bail!("invalid message format `{}`; expected 'human' or 'json'", other),
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageFormat::Human => f.write_str("human"),
            MessageFormat::Json => f.write_str("json"),
        }
    }
}

/// A build event emitted during the build process.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// Compilation is about to start.
    #[serde(rename = "build-started")]
    BuildStarted {
        /// Package name
        package: String,
        /// Platform target ("desktop", "android", "ios")
        target: String,
        /// Number of compiled units
        units: usize,
    },

    /// A unit's artifact was produced.
    #[serde(rename = "unit-finished")]
    UnitFinished {
        unit: String,
        artifact: PathBuf,
        /// Whether the translate step ran (vs. reused generated C)
        translated: bool,
        duration_ms: u64,
    },

    /// A unit failed.
    #[serde(rename = "unit-failed")]
    UnitFailed {
        unit: String,
        stage: FailureStage,
        /// Raw tool stderr and stdout
        output: String,
    },

    /// A unit was cancelled.
    #[serde(rename = "unit-cancelled")]
    UnitCancelled { unit: String },

    /// A generated file that no registered unit produces.
    #[serde(rename = "orphan-artifact")]
    OrphanArtifact {
        file: String,
        generated_dir: PathBuf,
        removed: bool,
    },

    /// Build completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        duration_ms: u64,
        built: usize,
        failed: Vec<String>,
        /// Why header export failed, when it was requested and did
        #[serde(skip_serializing_if = "Option::is_none")]
        header_error: Option<String>,
    },
}

impl BuildEvent {
    /// Create a build started event.
    pub fn started(package: impl Into<String>, target: impl Into<String>, units: usize) -> Self {
        BuildEvent::BuildStarted {
            package: package.into(),
            target: target.into(),
            units,
        }
    }

    /// The event describing a unit result.
    pub fn unit(result: &UnitResult) -> Self {
        let unit = result.unit.to_string();
        match &result.outcome {
            UnitOutcome::Built { artifact, translated } => BuildEvent::UnitFinished {
                unit,
                artifact: artifact.clone(),
                translated: *translated,
                duration_ms: result.duration.as_millis() as u64,
            },
            UnitOutcome::Failed { stage, output } => BuildEvent::UnitFailed {
                unit,
                stage: *stage,
                output: output.clone(),
            },
            UnitOutcome::Cancelled => BuildEvent::UnitCancelled { unit },
        }
    }

    /// One event per orphaned generated file.
    pub fn orphans(report: &BuildReport) -> Vec<Self> {
        let audit = &report.audit;
        audit
            .orphans
            .iter()
            .map(|file| BuildEvent::OrphanArtifact {
                file: file.clone(),
                generated_dir: audit.generated_dir.clone(),
                removed: audit.removed.contains(&audit.generated_dir.join(file)),
            })
            .collect()
    }

    /// Create a build finished event.
    pub fn finished(report: &BuildReport) -> Self {
        BuildEvent::BuildFinished {
            success: report.is_success(),
            duration_ms: report.duration.as_millis() as u64,
            built: report.built_count(),
            failed: report.failures().map(|r| r.unit.to_string()).collect(),
            header_error: report.header_error.clone(),
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Print this event as one line on stdout.
    pub fn emit(&self) {
        println!("{}", self.to_json());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::audit::AuditReport;
    use crate::builder::platform::PlatformTarget;
    use crate::core::unit::UnitName;
    use std::time::Duration;

    fn unit_result(outcome: UnitOutcome) -> UnitResult {
        UnitResult {
            unit: UnitName::parse("pkg.color").unwrap(),
            outcome,
            duration: Duration::from_millis(42),
        }
    }

    #[test]
    fn test_message_format_parse() {
        assert_eq!("json".parse::<MessageFormat>().unwrap(), MessageFormat::Json);
        assert_eq!("human".parse::<MessageFormat>().unwrap(), MessageFormat::Human);
        assert!("xml".parse::<MessageFormat>().is_err());
    }

    #[test]
    fn test_unit_finished_serialization() {
        let event = BuildEvent::unit(&unit_result(UnitOutcome::Built {
            artifact: PathBuf::from("build/pkg/color.so"),
            translated: true,
        }));
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"unit-finished\""));
        assert!(json.contains("\"unit\":\"pkg.color\""));
        assert!(json.contains("\"duration_ms\":42"));
    }

    #[test]
    fn test_unit_failed_serialization() {
        let event = BuildEvent::unit(&unit_result(UnitOutcome::Failed {
            stage: FailureStage::Translate,
            output: "color.pyx:3:0: undeclared name".to_string(),
        }));
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"unit-failed\""));
        assert!(json.contains("\"stage\":\"translate\""));
        assert!(json.contains("undeclared name"));
    }

    #[test]
    fn test_orphan_and_finished_events() {
        let generated_dir = PathBuf::from("gen");
        let report = BuildReport {
            target: PlatformTarget::Android,
            results: vec![unit_result(UnitOutcome::Cancelled)],
            headers: vec![],
            header_error: None,
            audit: AuditReport {
                generated_dir: generated_dir.clone(),
                orphans: vec!["D_generated.c".to_string()],
                removed: vec![generated_dir.join("D_generated.c")],
            },
            phases: vec![],
            duration: Duration::from_secs(2),
        };

        let orphans = BuildEvent::orphans(&report);
        assert_eq!(orphans.len(), 1);
        let json = orphans[0].to_json();
        assert!(json.contains("\"reason\":\"orphan-artifact\""));
        assert!(json.contains("\"removed\":true"));

        let json = BuildEvent::finished(&report).to_json();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"duration_ms\":2000"));
        assert!(json.contains("\"built\":0"));
        assert!(!json.contains("header_error"));
    }
}
