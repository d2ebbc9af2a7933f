//! Shell flag queries.
//!
//! A flag query runs the native library's configuration tool (e.g.
//! `sdl2-config --libs`) and captures what it prints. Two call shapes are
//! supported: a shell command line, and an argv list executed directly for
//! environments without a shell.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::BuildError;
use crate::core::flags::split_flags;
use crate::util::process::{ProcessBuilder, Termination};

/// How long a flag query may run before it is killed.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// A command that prints flags on stdout.
///
/// In `extbuild.toml` a string is a shell command line and an array is an
/// argv list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagQuery {
    /// Run through `sh -c`.
    Shell(String),
    /// Executed directly, no shell involved.
    Argv(Vec<String>),
}

impl FlagQuery {
    pub fn shell(command: impl Into<String>) -> Self {
        FlagQuery::Shell(command.into())
    }

    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FlagQuery::Argv(args.into_iter().map(Into::into).collect())
    }

    fn process(&self) -> Result<ProcessBuilder, BuildError> {
        match self {
            FlagQuery::Shell(command) => Ok(ProcessBuilder::new("sh").arg("-c").arg(command)),
            FlagQuery::Argv(argv) => match argv.split_first() {
                Some((program, args)) => Ok(ProcessBuilder::new(program).args(args)),
                None => Err(self.unavailable("empty command")),
            },
        }
    }

    fn unavailable(&self, stderr: impl Into<String>) -> BuildError {
        BuildError::ToolUnavailable {
            command: self.to_string(),
            stderr: stderr.into(),
        }
    }

    /// Run the query and return its stdout.
    ///
    /// A spawn failure, a non-zero exit, or running past `timeout` is a
    /// `ToolUnavailable` error carrying the captured stderr.
    pub fn run(&self, timeout: Duration) -> Result<String, BuildError> {
        let process = self.process()?;
        tracing::debug!("querying flags: {}", self);

        let output = process
            .exec_supervised(None, Some(timeout))
            .map_err(|e| self.unavailable(format!("{:#}", e)))?;

        match output.termination {
            Termination::Exited(status) if status.success() => Ok(output.stdout_text()),
            Termination::Exited(status) => {
                let mut stderr = output.stderr_text();
                if stderr.trim().is_empty() {
                    stderr = format!("exited with {}", status);
                }
                Err(self.unavailable(stderr))
            }
            Termination::TimedOut(limit) => Err(self.unavailable(format!(
                "timed out after {:.1}s",
                limit.as_secs_f64()
            ))),
            Termination::Cancelled => Err(BuildError::Cancelled),
        }
    }

    /// Run the query and split its output into flag tokens.
    pub fn tokens(&self, timeout: Duration) -> Result<Vec<String>, BuildError> {
        Ok(split_flags(&self.run(timeout)?))
    }
}

impl fmt::Display for FlagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagQuery::Shell(command) => f.write_str(command),
            FlagQuery::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            FlagQuery::shell("sdl2-config --cflags").to_string(),
            "sdl2-config --cflags"
        );
        assert_eq!(
            FlagQuery::argv(["pkg-config", "--libs", "sdl2"]).to_string(),
            "pkg-config --libs sdl2"
        );
    }

    #[test]
    fn test_empty_argv_is_unavailable() {
        let err = FlagQuery::Argv(vec![]).run(DEFAULT_QUERY_TIMEOUT).unwrap_err();
        assert!(matches!(err, BuildError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_form_uses_shell_syntax() {
        let query = FlagQuery::shell("echo -I/usr/include/SDL2 | tr I J");
        let tokens = query.tokens(DEFAULT_QUERY_TIMEOUT).unwrap();
        assert_eq!(tokens, vec!["-J/usr/include/SDL2".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_argv_form_has_no_shell() {
        let query = FlagQuery::argv(["echo", "-lSDL2", "'quoted arg'", "$HOME"]);
        let output = query.run(DEFAULT_QUERY_TIMEOUT).unwrap();
        assert_eq!(output.trim(), "-lSDL2 'quoted arg' $HOME");
        assert_eq!(
            split_flags(&output),
            vec!["-lSDL2".to_string(), "quoted arg".to_string(), "$HOME".to_string()]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_reports_stderr() {
        let query = FlagQuery::shell("echo 'sdl2-config: not found' >&2; exit 127");
        match query.run(DEFAULT_QUERY_TIMEOUT).unwrap_err() {
            BuildError::ToolUnavailable { command, stderr } => {
                assert!(command.contains("exit 127"));
                assert!(stderr.contains("sdl2-config: not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let query = FlagQuery::argv(["extbuild-missing-config-tool", "--libs"]);
        let err = query.run(DEFAULT_QUERY_TIMEOUT).unwrap_err();
        assert!(matches!(err, BuildError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_hanging_query_times_out() {
        let query = FlagQuery::argv(["sleep", "5"]);
        match query.run(Duration::from_millis(100)).unwrap_err() {
            BuildError::ToolUnavailable { stderr, .. } => assert!(stderr.contains("timed out")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hanging_shell_pipeline_times_out() {
        let start = std::time::Instant::now();
        for command in ["sleep 5 | cat", "sleep 5; echo -lSDL2"] {
            let err = FlagQuery::shell(command)
                .run(Duration::from_millis(200))
                .unwrap_err();
            assert!(matches!(err, BuildError::ToolUnavailable { .. }), "{command}");
        }
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
