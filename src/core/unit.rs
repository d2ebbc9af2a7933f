//! Compilation units - the modules a build is made of.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::BuildError;
use crate::core::flags::LibraryReference;

/// Extension of the generated C source for a compiled unit.
pub const GENERATED_SOURCE_EXT: &str = "c";

/// A dotted module path such as `pygame_sdl2.image`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitName(String);

impl UnitName {
    /// Parse and validate a dotted module path.
    pub fn parse(name: &str) -> Result<Self, BuildError> {
        let invalid = |reason: &str| BuildError::InvalidUnitName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }

        for segment in name.split('.') {
            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if segment.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(invalid("a segment starts with a digit"));
            }
            if let Some(c) = segment
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
            {
                return Err(invalid(&format!("unexpected character `{}`", c)));
            }
        }

        Ok(UnitName(name.to_string()))
    }

    /// The full dotted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dotted segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The last segment (the module's own name).
    pub fn leaf(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// The module path with segments as directories and no extension
    /// (`a.b.c` -> `a/b/c`).
    pub fn module_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UnitName {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitName::parse(s)
    }
}

/// Whether a unit needs compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Pure interpreted module; no compile step.
    Interpreted,
    /// Extension module translated to C and linked into a loadable binary.
    Compiled,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Interpreted => write!(f, "interpreted"),
            UnitKind::Compiled => write!(f, "compiled"),
        }
    }
}

/// A registered module. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    name: UnitName,
    kind: UnitKind,
    libs: Vec<LibraryReference>,
}

impl CompilationUnit {
    /// Create an interpreted-only unit.
    pub fn interpreted(name: UnitName) -> Self {
        CompilationUnit {
            name,
            kind: UnitKind::Interpreted,
            libs: Vec::new(),
        }
    }

    /// Create a compiled unit linking the given libraries (in order) on top
    /// of the platform's base libraries.
    pub fn compiled(name: UnitName, libs: Vec<LibraryReference>) -> Self {
        CompilationUnit {
            name,
            kind: UnitKind::Compiled,
            libs,
        }
    }

    pub fn name(&self) -> &UnitName {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Unit-specific libraries; empty for interpreted units.
    pub fn libs(&self) -> &[LibraryReference] {
        &self.libs
    }

    pub fn is_compiled(&self) -> bool {
        self.kind == UnitKind::Compiled
    }

    /// The file the translator produces for this unit, relative to the
    /// generated-sources directory. `None` for interpreted units.
    pub fn generated_file_name(&self) -> Option<String> {
        self.is_compiled()
            .then(|| format!("{}.{}", self.name, GENERATED_SOURCE_EXT))
    }

    /// Path of the loadable artifact relative to the build directory
    /// (`pkg.sub.mod` -> `pkg/sub/mod.<ext>`).
    pub fn artifact_path(&self, extension: &str) -> PathBuf {
        self.name.module_path().with_extension(extension)
    }

    /// Candidate source files under `source_dir`, in lookup order.
    ///
    /// Compiled units prefer `.pyx` and fall back to `.py`; interpreted
    /// units only have `.py`.
    pub fn source_candidates(&self, source_dir: &Path) -> Vec<PathBuf> {
        let base = source_dir.join(self.name.module_path());
        match self.kind {
            UnitKind::Compiled => vec![base.with_extension("pyx"), base.with_extension("py")],
            UnitKind::Interpreted => vec![base.with_extension("py")],
        }
    }

    /// The first existing source candidate.
    pub fn find_source(&self, source_dir: &Path) -> Option<PathBuf> {
        self.source_candidates(source_dir)
            .into_iter()
            .find(|p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unit_name_valid() {
        let name = UnitName::parse("pygame_sdl2.threads.__init__").unwrap();
        assert_eq!(name.leaf(), "__init__");
        assert_eq!(
            name.segments().collect::<Vec<_>>(),
            ["pygame_sdl2", "threads", "__init__"]
        );
        assert_eq!(
            name.module_path(),
            PathBuf::from("pygame_sdl2").join("threads").join("__init__")
        );
    }

    #[test]
    fn test_unit_name_invalid() {
        for bad in ["", "a..b", ".a", "a.", "a-b.c", "pkg.2d", "a b"] {
            let err = UnitName::parse(bad).unwrap_err();
            assert!(
                matches!(err, BuildError::InvalidUnitName { .. }),
                "expected `{}` to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_generated_file_name() {
        let compiled = CompilationUnit::compiled(
            UnitName::parse("pkg.color").unwrap(),
            vec![LibraryReference::new("SDL2")],
        );
        let interpreted = CompilationUnit::interpreted(UnitName::parse("pkg.compat").unwrap());

        assert_eq!(compiled.generated_file_name().as_deref(), Some("pkg.color.c"));
        assert_eq!(interpreted.generated_file_name(), None);
        assert!(interpreted.libs().is_empty());
    }

    #[test]
    fn test_artifact_path() {
        let unit = CompilationUnit::compiled(UnitName::parse("pkg.mixer_music").unwrap(), vec![]);
        assert_eq!(
            unit.artifact_path("so"),
            PathBuf::from("pkg").join("mixer_music.so")
        );
    }

    #[test]
    fn test_find_source_prefers_pyx() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("pkg");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("rect.py"), "").unwrap();

        let unit = CompilationUnit::compiled(UnitName::parse("pkg.rect").unwrap(), vec![]);
        assert_eq!(unit.find_source(tmp.path()), Some(pkg.join("rect.py")));

        std::fs::write(pkg.join("rect.pyx"), "").unwrap();
        assert_eq!(unit.find_source(tmp.path()), Some(pkg.join("rect.pyx")));

        let missing = CompilationUnit::compiled(UnitName::parse("pkg.gone").unwrap(), vec![]);
        assert_eq!(missing.find_source(tmp.path()), None);
    }
}
