//! Translation staleness checks.
//!
//! A unit's generated C is reused when it is newer than the unit's source, the
//! `.pxd` next to it, and every file the source pulls in through `cimport` or
//! `include`. Only direct dependencies are considered.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;

use crate::util::fs::{modified, read_to_string};

static FROM_CIMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*from\s+(\.*)([\w.]*)\s+cimport\b(.*)").unwrap());

static CIMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*cimport\s+([\w.]+)").unwrap());

static INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*include\s+"([^"]+)""#).unwrap());

/// Top-level modules shipped with the translator itself.
const BUILTIN_MODULES: &[&str] = &["cpython", "libc", "libcpp", "posix"];

/// Relative paths of the declaration files a source depends on, in order of
/// first appearance.
///
/// Relative cimports (`from .surface cimport Surface`, `from . cimport rect`)
/// come back as `./`- or `../`-prefixed paths, relative to the source's own
/// directory.
pub fn scan_dependencies(source: &str) -> Vec<String> {
    let mut deps: Vec<String> = Vec::new();

    for line in source.lines() {
        let found = if let Some(m) = FROM_CIMPORT.captures(line) {
            from_cimport(m[1].len(), &m[2], &m[3])
        } else if let Some(m) = CIMPORT.captures(line) {
            vec![pxd_path(&m[1])]
        } else {
            INCLUDE.captures(line).map(|m| m[1].to_string()).into_iter().collect()
        };

        for dep in found {
            let top = dep.split(['/', '.']).next().unwrap_or_default();
            let builtin = !is_relative(&dep) && BUILTIN_MODULES.contains(&top);
            if !builtin && !deps.contains(&dep) {
                deps.push(dep);
            }
        }
    }

    deps
}

fn pxd_path(module: &str) -> String {
    format!("{}.pxd", module.replace('.', "/"))
}

/// Dependencies of a `from <module> cimport <names>` line with `dots` leading
/// dots on the module.
fn from_cimport(dots: usize, module: &str, names: &str) -> Vec<String> {
    if dots == 0 {
        return if module.is_empty() {
            Vec::new()
        } else {
            vec![pxd_path(module)]
        };
    }

    let prefix = if dots == 1 {
        "./".to_string()
    } else {
        "../".repeat(dots - 1)
    };

    if !module.is_empty() {
        return vec![format!("{}{}", prefix, pxd_path(module))];
    }

    // `from . cimport a, b as c`: each name is a sibling module
    names
        .trim()
        .trim_start_matches('(')
        .split(',')
        .filter_map(|name| name.split_whitespace().next())
        .map(|name| name.trim_end_matches(')'))
        .filter(|name| !name.is_empty())
        .map(|name| format!("{}{}", prefix, pxd_path(name)))
        .collect()
}

fn is_relative(dep: &str) -> bool {
    dep.starts_with("./") || dep.starts_with("../")
}

/// Find a dependency in the search directories, in order.
pub fn resolve_dependency(dep: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .map(|dir| dir.join(dep))
        .find(|candidate| candidate.is_file())
}

/// Whether `generated` must be (re)produced from `source`.
///
/// Search order for dependencies is the source's own directory followed by
/// `search_dirs`; relative cimports only look in the source's package. A
/// dependency that cannot be found is an error.
pub fn needs_translation(source: &Path, generated: &Path, search_dirs: &[PathBuf]) -> Result<bool> {
    let Some(generated_time) = modified(generated) else {
        return Ok(true);
    };

    let package_dir = source.parent().map(Path::to_path_buf);
    let mut dirs = Vec::with_capacity(search_dirs.len() + 1);
    dirs.extend(package_dir.clone());
    dirs.extend(search_dirs.iter().cloned());

    let mut inputs = vec![source.to_path_buf()];

    let declarations = source.with_extension("pxd");
    if declarations != source && declarations.is_file() {
        inputs.push(declarations);
    }

    for dep in scan_dependencies(&read_to_string(source)?) {
        let found = if is_relative(&dep) {
            package_dir
                .as_ref()
                .map(|dir| dir.join(&dep))
                .filter(|candidate| candidate.is_file())
        } else {
            resolve_dependency(&dep, &dirs)
        };

        match found {
            Some(path) => inputs.push(path),
            None => bail!(
                "{} depends on {}, which can't be found",
                source.display(),
                dep
            ),
        }
    }

    Ok(inputs
        .iter()
        .any(|input| modified(input).is_none_or(|t| t > generated_time)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const SOURCE: &str = r#"
from sdl2 cimport *
from pygame_sdl2.surface cimport Surface
cimport pygame_sdl2.rwobject
from libc.string cimport memcpy
from cpython cimport PyObject
include "color_dict.pxi"
from pygame_sdl2.surface cimport Surface
import os
"#;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_scan_dependencies() {
        let deps = scan_dependencies(SOURCE);
        assert_eq!(
            deps,
            [
                "sdl2.pxd",
                "pygame_sdl2/surface.pxd",
                "pygame_sdl2/rwobject.pxd",
                "color_dict.pxi"
            ]
        );
    }

    #[test]
    fn test_scan_ignores_builtin_modules() {
        let deps = scan_dependencies("from libc.stdio cimport printf\ncimport cpython.ref\n");
        assert!(deps.is_empty());
    }

    #[test]
    fn test_needs_translation_by_mtime() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let include = tmp.path().join("include");
        let gen = tmp.path().join("gen");
        for dir in [&src, &include, &gen] {
            fs::create_dir_all(dir).unwrap();
        }

        let source = src.join("color.pyx");
        let pxd = include.join("sdl2.pxd");
        let generated = gen.join("pkg.color.c");
        fs::write(&source, "from sdl2 cimport *\n").unwrap();
        fs::write(&pxd, "cdef extern from \"SDL.h\": pass\n").unwrap();

        let search = vec![include.clone(), gen.clone()];

        // No generated file yet
        assert!(needs_translation(&source, &generated, &search).unwrap());

        let old = SystemTime::now() - Duration::from_secs(600);
        let new = SystemTime::now() - Duration::from_secs(60);

        fs::write(&generated, "/* generated */").unwrap();
        set_mtime(&source, old);
        set_mtime(&pxd, old);
        set_mtime(&generated, new);
        assert!(!needs_translation(&source, &generated, &search).unwrap());

        // A touched dependency makes it stale
        set_mtime(&pxd, SystemTime::now());
        assert!(needs_translation(&source, &generated, &search).unwrap());
    }

    #[test]
    fn test_missing_dependency_is_error() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("font.pyx");
        let generated = tmp.path().join("pkg.font.c");
        fs::write(&source, "from sdl2_ttf cimport *\n").unwrap();
        fs::write(&generated, "").unwrap();

        let err = needs_translation(&source, &generated, &[]).unwrap_err();
        assert!(err.to_string().contains("depends on sdl2_ttf.pxd"));
    }

    #[test]
    fn test_scan_relative_cimports() {
        let deps = scan_dependencies(
            "from .surface cimport Surface\nfrom . cimport rect, color as c\nfrom ..core.rwobject cimport RWops\n",
        );
        assert_eq!(
            deps,
            [
                "./surface.pxd",
                "./rect.pxd",
                "./color.pxd",
                "../core/rwobject.pxd"
            ]
        );
    }

    #[test]
    fn test_relative_cimports_resolve_in_package() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("src/pkg");
        let gen = tmp.path().join("gen");
        fs::create_dir_all(&pkg).unwrap();
        fs::create_dir_all(&gen).unwrap();

        let source = pkg.join("display.pyx");
        let surface = pkg.join("surface.pxd");
        let rect = pkg.join("rect.pxd");
        let generated = gen.join("pkg.display.c");
        fs::write(&source, "from .surface cimport Surface\nfrom . cimport rect\n").unwrap();
        fs::write(&surface, "cdef class Surface: pass\n").unwrap();
        fs::write(&rect, "cdef class Rect: pass\n").unwrap();
        fs::write(&generated, "/* generated */").unwrap();

        let old = SystemTime::now() - Duration::from_secs(600);
        for path in [&source, &surface, &rect] {
            set_mtime(path, old);
        }
        set_mtime(&generated, SystemTime::now() - Duration::from_secs(60));

        let search = vec![gen.clone()];
        assert!(!needs_translation(&source, &generated, &search).unwrap());

        set_mtime(&rect, SystemTime::now());
        assert!(needs_translation(&source, &generated, &search).unwrap());
    }

    #[test]
    fn test_missing_relative_cimport_is_error() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("display.pyx");
        let generated = tmp.path().join("pkg.display.c");
        fs::write(&source, "from .surface cimport Surface\n").unwrap();
        fs::write(&generated, "").unwrap();

        let err = needs_translation(&source, &generated, &[tmp.path().to_path_buf()]).unwrap_err();
        assert!(err.to_string().contains("depends on ./surface.pxd"));
    }

    #[test]
    fn test_own_declarations_are_an_input() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("rect.pyx");
        let declarations = tmp.path().join("rect.pxd");
        let generated = tmp.path().join("pkg.rect.c");
        fs::write(&source, "cdef class Rect: pass\n").unwrap();
        fs::write(&declarations, "cdef class Rect:\n    cdef int x\n").unwrap();
        fs::write(&generated, "").unwrap();

        let old = SystemTime::now() - Duration::from_secs(600);
        set_mtime(&source, old);
        set_mtime(&declarations, old);
        set_mtime(&generated, SystemTime::now() - Duration::from_secs(60));
        assert!(!needs_translation(&source, &generated, &[]).unwrap());

        set_mtime(&declarations, SystemTime::now());
        assert!(needs_translation(&source, &generated, &[]).unwrap());
    }
}
