//! Public header export.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::util::fs::{copy_into, ensure_dir};

/// Environment toggle for header export.
pub const INSTALL_HEADERS_ENV: &str = "EXTBUILD_INSTALL_HEADERS";

/// Interpret a boolean-like environment value.
///
/// Absent, empty, `0`, `false`, `no` and `off` (any case) are false.
pub fn env_flag(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => false,
        Some(v) => !matches!(v.as_str(), "" | "0" | "false" | "no" | "off"),
    }
}

/// Whether header export was requested through the environment.
pub fn headers_enabled() -> bool {
    env_flag(std::env::var(INSTALL_HEADERS_ENV).ok().as_deref())
}

/// Copy `files` (relative to `root`) into `dest`, returning the new paths.
pub fn export_headers(root: &Path, files: &[PathBuf], dest: &Path) -> Result<Vec<PathBuf>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    ensure_dir(dest)?;

    let mut exported = Vec::with_capacity(files.len());
    for file in files {
        let src = root.join(file);
        if !src.is_file() {
            bail!("header `{}` does not exist", src.display());
        }
        let copied = copy_into(&src, dest)?;
        tracing::debug!("exported {}", copied.display());
        exported.push(copied);
    }

    Ok(exported)
}
