//! Filesystem utilities.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

/// Suffix appended to outputs that are still being written.
pub const PARTIAL_SUFFIX: &str = "partial";

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file, if it exists.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Copy a file into a directory, keeping its file name.
pub fn copy_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .with_context(|| format!("not a file path: {}", file.display()))?;
    ensure_dir(dir)?;
    let dest = dir.join(name);
    fs::copy(file, &dest).with_context(|| {
        format!("failed to copy {} to {}", file.display(), dest.display())
    })?;
    Ok(dest)
}

/// The in-progress path for an output (`out.so` -> `out.so.partial`).
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// Move a finished partial output into its final place.
pub fn rename_into_place(partial: &Path, dest: &Path) -> Result<()> {
    fs::rename(partial, dest).with_context(|| {
        format!(
            "failed to move {} to {}",
            partial.display(),
            dest.display()
        )
    })
}

/// Modification time of a path, or `None` if it does not exist.
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("gen/pkg.color.c")),
            PathBuf::from("gen/pkg.color.c.partial")
        );
    }

    #[test]
    fn test_rename_into_place() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.so");
        let partial = partial_path(&dest);
        fs::write(&partial, "bits").unwrap();

        rename_into_place(&partial, &dest).unwrap();
        assert!(!partial.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "bits");
    }

    #[test]
    fn test_copy_into_creates_dir() {
        let tmp = TempDir::new().unwrap();
        let header = tmp.path().join("api.h");
        fs::write(&header, "#pragma once\n").unwrap();

        let dest = copy_into(&header, &tmp.path().join("include").join("pkg")).unwrap();
        assert_eq!(dest, tmp.path().join("include").join("pkg").join("api.h"));
        assert!(dest.exists());
    }

    #[test]
    fn test_remove_helpers_tolerate_missing() {
        let tmp = TempDir::new().unwrap();
        remove_file_if_exists(&tmp.path().join("nope")).unwrap();
        remove_dir_all_if_exists(&tmp.path().join("nope")).unwrap();
        assert_eq!(modified(&tmp.path().join("nope")), None);
    }
}
