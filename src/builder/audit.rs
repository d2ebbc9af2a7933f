//! Generated-sources audit.
//!
//! Lists generated C files that no registered unit produces. Stale files
//! usually come from a unit that was renamed or removed; they are reported,
//! never treated as a failure.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::core::unit::GENERATED_SOURCE_EXT;
use crate::util::fs::remove_file_if_exists;

/// Result of auditing the generated-sources directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Directory that was audited
    pub generated_dir: PathBuf,
    /// File names with no owning unit, sorted
    pub orphans: Vec<String>,
    /// Orphans that were deleted
    pub removed: Vec<PathBuf>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
    }
}

/// Compare the generated directory against the expected file names.
///
/// Only regular files directly inside `generated_dir` with a generated-source
/// extension are considered. A missing directory yields an empty report.
pub fn audit(generated_dir: &Path, expected: &BTreeSet<String>, remove: bool) -> Result<AuditReport> {
    let mut report = AuditReport {
        generated_dir: generated_dir.to_path_buf(),
        ..AuditReport::default()
    };

    if !generated_dir.is_dir() {
        tracing::debug!("{} does not exist, nothing to audit", generated_dir.display());
        return Ok(report);
    }

    for entry in WalkDir::new(generated_dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("failed to list {}", generated_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(GENERATED_SOURCE_EXT) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if !expected.contains(&name) {
            report.orphans.push(name);
        }
    }

    report.orphans.sort();

    for name in &report.orphans {
        tracing::warn!("{} is not produced by any registered unit", name);
    }

    if remove {
        for name in &report.orphans {
            let path = generated_dir.join(name);
            remove_file_if_exists(&path)?;
            report.removed.push(path);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn expected(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn populate(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), "/* generated */").unwrap();
        }
    }

    #[test]
    fn test_audit_reports_orphans() {
        let tmp = TempDir::new().unwrap();
        populate(tmp.path(), &["A.c", "B.c", "D_generated.c"]);

        let report = audit(tmp.path(), &expected(&["A.c", "B.c"]), false).unwrap();
        assert_eq!(report.orphans, ["D_generated.c"]);
        assert!(report.removed.is_empty());
        assert!(tmp.path().join("D_generated.c").exists());
    }

    #[test]
    fn test_audit_ignores_other_files() {
        let tmp = TempDir::new().unwrap();
        populate(tmp.path(), &["pkg.color.c", "pkg.color.c.partial", "notes.txt", "pkg.h"]);
        fs::create_dir(tmp.path().join("nested.c")).unwrap();
        fs::write(tmp.path().join("nested.c").join("deep.c"), "").unwrap();

        let report = audit(tmp.path(), &expected(&["pkg.color.c"]), false).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_audit_is_sorted_and_idempotent() {
        let tmp = TempDir::new().unwrap();
        populate(tmp.path(), &["zeta.c", "alpha.c", "mid.c"]);

        let first = audit(tmp.path(), &expected(&["mid.c"]), false).unwrap();
        let second = audit(tmp.path(), &expected(&["mid.c"]), false).unwrap();
        assert_eq!(first.orphans, ["alpha.c", "zeta.c"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_audit_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let report = audit(&tmp.path().join("gen"), &expected(&["A.c"]), true).unwrap();
        assert!(report.is_clean());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_audit_remove() {
        let tmp = TempDir::new().unwrap();
        populate(tmp.path(), &["A.c", "old.c"]);

        let report = audit(tmp.path(), &expected(&["A.c"]), true).unwrap();
        assert_eq!(report.removed, [tmp.path().join("old.c")]);
        assert!(!tmp.path().join("old.c").exists());
        assert!(tmp.path().join("A.c").exists());

        let again = audit(tmp.path(), &expected(&["A.c"]), false).unwrap();
        assert!(again.is_clean());
    }
}
