//! Toolchain abstraction for extension modules.
//!
//! Building an extension module is two commands: the translator turns the
//! unit's source into C, then the C compiler driver compiles and links that
//! C into a loadable shared object.
//!
//! Tool selection priority:
//! 1. Environment variables (`EXTBUILD_TRANSLATOR`, `CC`)
//! 2. Config files (`.extbuild/config.toml`, `~/.extbuild/config.toml`)
//! 3. The manifest's `[toolchain]` section
//! 4. Defaults (`cython`, then the first of cc/gcc/clang on PATH)

use std::path::{Path, PathBuf};

use crate::core::flags::LibraryReference;
use crate::core::manifest::ToolchainSection;
use crate::util::config::BuildConfig;
use crate::util::process::{find_c_compiler, find_executable};

/// Environment variable overriding the translator program.
pub const TRANSLATOR_ENV: &str = "EXTBUILD_TRANSLATOR";

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run (e.g., "cython", "cc")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Input for the translate step.
#[derive(Debug, Clone)]
pub struct TranslateInput {
    /// Unit source (`.pyx` or `.py`)
    pub source: PathBuf,
    /// Where the translator must write its C output
    pub output: PathBuf,
    /// Search paths for declaration files
    pub include_dirs: Vec<PathBuf>,
}

/// Input for the compile+link step.
#[derive(Debug, Clone)]
pub struct ExtensionInput {
    /// Generated C source
    pub source: PathBuf,
    /// Where the loadable artifact must be written
    pub output: PathBuf,
    /// Header search paths
    pub include_dirs: Vec<PathBuf>,
    /// Compiler flags from the base flag set
    pub cflags: Vec<String>,
    /// Linker flags from the base flag set
    pub ldflags: Vec<String>,
    /// Libraries to link, base libraries first
    pub libs: Vec<LibraryReference>,
}

/// Generates the commands for building one extension module.
pub trait Toolchain: Send + Sync {
    /// Command translating `input.source` into C at `input.output`.
    fn translate_command(&self, input: &TranslateInput) -> CommandSpec;

    /// Command compiling and linking `input.source` into `input.output`.
    fn extension_command(&self, input: &ExtensionInput) -> CommandSpec;

    /// File extension of loadable artifacts (without the dot).
    fn artifact_extension(&self) -> &str {
        if cfg!(windows) {
            "pyd"
        } else {
            "so"
        }
    }
}

/// Cython followed by a GCC-style compiler driver.
#[derive(Debug, Clone)]
pub struct CythonToolchain {
    /// Translator program
    pub translator: PathBuf,
    /// C compiler driver
    pub cc: PathBuf,
    /// Extra compiler flags (config and manifest)
    pub extra_cflags: Vec<String>,
    /// Extra linker flags (config and manifest)
    pub extra_ldflags: Vec<String>,
}

impl CythonToolchain {
    /// Create a toolchain from explicit tools.
    pub fn new(translator: impl Into<PathBuf>, cc: impl Into<PathBuf>) -> Self {
        CythonToolchain {
            translator: translator.into(),
            cc: cc.into(),
            extra_cflags: Vec::new(),
            extra_ldflags: Vec::new(),
        }
    }

    /// Append extra compiler and linker flags.
    pub fn with_extra_flags(mut self, cflags: Vec<String>, ldflags: Vec<String>) -> Self {
        self.extra_cflags.extend(cflags);
        self.extra_ldflags.extend(ldflags);
        self
    }

    /// Resolve tools and extra flags from the environment, config and manifest.
    pub fn resolve(manifest: &ToolchainSection, config: &BuildConfig) -> Self {
        let translator = std::env::var(TRANSLATOR_ENV)
            .ok()
            .or_else(|| config.translator.clone())
            .or_else(|| manifest.translator.clone())
            .unwrap_or_else(|| "cython".to_string());

        let cc = std::env::var("CC")
            .ok()
            .or_else(|| config.cc.clone())
            .or_else(|| manifest.cc.clone())
            .map(PathBuf::from)
            .or_else(find_c_compiler)
            .unwrap_or_else(|| PathBuf::from("cc"));

        let translator = locate(&translator);
        let cc = locate(&cc.to_string_lossy());

        // Manifest flags first so config flags can override them.
        let mut cflags = manifest.cflags.clone();
        cflags.extend(config.cflags.iter().cloned());
        let mut ldflags = manifest.ldflags.clone();
        ldflags.extend(config.ldflags.iter().cloned());

        tracing::debug!(
            "toolchain: translator `{}`, cc `{}`",
            translator.display(),
            cc.display()
        );

        CythonToolchain::new(translator, cc).with_extra_flags(cflags, ldflags)
    }
}

/// Resolve a tool name on PATH, keeping it as-is when it cannot be found so
/// the failure surfaces on the unit that needs it.
fn locate(tool: &str) -> PathBuf {
    let path = Path::new(tool);
    if path.components().count() > 1 {
        return path.to_path_buf();
    }
    find_executable(tool).unwrap_or_else(|| {
        tracing::warn!("`{}` was not found on PATH", tool);
        path.to_path_buf()
    })
}

impl Toolchain for CythonToolchain {
    fn translate_command(&self, input: &TranslateInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.translator);

        for dir in &input.include_dirs {
            cmd = cmd.arg("-I").arg(dir.display().to_string());
        }

        cmd.arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string())
    }

    fn extension_command(&self, input: &ExtensionInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cc).arg("-shared");

        if !cfg!(windows) {
            cmd = cmd.arg("-fPIC");
        }

        // Base flags, then extra flags
        cmd = cmd.args(input.cflags.iter().cloned());
        cmd = cmd.args(self.extra_cflags.iter().cloned());

        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        cmd = cmd
            .arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string());

        // Extension modules resolve interpreter symbols at load time.
        if cfg!(target_os = "macos") {
            cmd = cmd.args(["-undefined", "dynamic_lookup"]);
        }

        cmd = cmd.args(input.ldflags.iter().cloned());
        cmd = cmd.args(self.extra_ldflags.iter().cloned());

        // Libraries last, in link order
        cmd.args(input.libs.iter().map(|l| l.link_arg()))
    }
}
