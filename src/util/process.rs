//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::builder::toolchain::CommandSpec;
use crate::util::cancel::CancellationToken;

/// How often a supervised child is polled for exit, cancellation and timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long pipe output is still collected after a child was killed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The process was killed after running longer than the timeout.
    TimedOut(Duration),
    /// The process was killed because cancellation was requested.
    Cancelled,
}

/// Captured output of a supervised process.
#[derive(Debug, Clone)]
pub struct SupervisedOutput {
    pub termination: Termination,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl SupervisedOutput {
    /// Whether the process exited with a success status.
    pub fn success(&self) -> bool {
        matches!(self.termination, Termination::Exited(status) if status.success())
    }

    /// Stdout as lossy UTF-8.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as lossy UTF-8.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stderr followed by stdout, for tool diagnostics.
    pub fn combined_output(&self) -> String {
        let mut text = self.stderr_text();
        let stdout = self.stdout_text();
        if !stdout.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stdout);
        }
        text
    }
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Create a process builder from a toolchain command.
    pub fn from_spec(spec: &CommandSpec) -> Self {
        let mut pb = ProcessBuilder::new(&spec.program).args(&spec.args);
        for (key, value) in &spec.env {
            pb = pb.env(key, value);
        }
        pb
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd.output()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))
    }

    /// Execute while watching for cancellation and an optional timeout.
    ///
    /// The child runs in its own process group, and the whole group is killed
    /// as soon as `cancel` trips or `timeout` elapses, so tools started by the
    /// child (shell pipelines, `cc1`, `ld`) go down with it. Stdout and stderr
    /// are drained on helper threads so a chatty child cannot block on a full
    /// pipe; after a kill, output that does not arrive within a short grace
    /// period is abandoned.
    pub fn exec_supervised(
        &self,
        cancel: Option<&CancellationToken>,
        timeout: Option<Duration>,
    ) -> Result<SupervisedOutput> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let start = Instant::now();

        let termination = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                break Termination::Exited(status);
            }

            if cancel.is_some_and(|c| c.is_cancelled()) {
                kill_group(&mut child);
                break Termination::Cancelled;
            }

            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    kill_group(&mut child);
                    break Termination::TimedOut(limit);
                }
            }

            thread::sleep(POLL_INTERVAL);
        };

        // A child that exited on its own may have left a background process
        // holding the pipes; the timeout still bounds the whole call.
        let deadline = match termination {
            Termination::Exited(_) => {
                timeout.map(|limit| (start + limit).max(Instant::now() + DRAIN_GRACE))
            }
            Termination::TimedOut(_) | Termination::Cancelled => {
                Some(Instant::now() + DRAIN_GRACE)
            }
        };

        Ok(SupervisedOutput {
            termination,
            stdout: collect(stdout, deadline),
            stderr: collect(stderr, deadline),
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Kill `child` and every process in its group.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let _ = Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

fn collect(output: Option<Receiver<Vec<u8>>>, deadline: Option<Instant>) -> Vec<u8> {
    let Some(rx) = output else {
        return Vec::new();
    };
    match deadline {
        Some(deadline) => rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .unwrap_or_default(),
        None => rx.recv().unwrap_or_default(),
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find a C compiler, honouring `CC`.
pub fn find_c_compiler() -> Option<PathBuf> {
    if let Ok(cc) = std::env::var("CC") {
        if let Some(path) = find_executable(&cc) {
            return Some(path);
        }
    }

    for compiler in &["cc", "gcc", "clang"] {
        if let Some(path) = find_executable(compiler) {
            return Some(path);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("cc").args(["-shared", "-o", "color.so", "color.c"]);

        assert_eq!(pb.display_command(), "cc -shared -o color.so color.c");
    }

    #[test]
    fn test_from_spec() {
        let spec = CommandSpec::new("cython")
            .args(["-I", "include"])
            .env("LANG", "C");
        let pb = ProcessBuilder::from_spec(&spec);

        assert_eq!(pb.get_program(), Path::new("cython"));
        assert_eq!(pb.get_args(), ["-I", "include"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_captures_stdout() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_supervised_success_and_failure() {
        let ok = ProcessBuilder::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .exec_supervised(None, None)
            .unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout_text().trim(), "out");
        assert_eq!(ok.stderr_text().trim(), "err");

        let failed = ProcessBuilder::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .exec_supervised(None, None)
            .unwrap();
        assert!(!failed.success());
        assert!(matches!(
            failed.termination,
            Termination::Exited(status) if status.code() == Some(3)
        ));
        assert!(failed.combined_output().contains("broken"));
    }

    #[cfg(unix)]
    #[test]
    fn test_supervised_timeout_kills_child() {
        let start = Instant::now();
        let output = ProcessBuilder::new("sleep")
            .arg("5")
            .exec_supervised(None, Some(Duration::from_millis(100)))
            .unwrap();

        assert!(matches!(output.termination, Termination::TimedOut(_)));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_supervised_cancel_kills_child() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            remote.cancel();
        });

        let start = Instant::now();
        let output = ProcessBuilder::new("sleep")
            .arg("5")
            .exec_supervised(Some(&token), None)
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(output.termination, Termination::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_supervised_timeout_kills_pipeline() {
        let start = Instant::now();
        let output = ProcessBuilder::new("sh")
            .args(["-c", "sleep 5 | cat"])
            .exec_supervised(None, Some(Duration::from_millis(100)))
            .unwrap();

        assert!(matches!(output.termination, Termination::TimedOut(_)));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_supervised_cancel_kills_grandchildren() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            remote.cancel();
        });

        let start = Instant::now();
        let output = ProcessBuilder::new("sh")
            .args(["-c", "sleep 5; echo -lSDL2"])
            .exec_supervised(Some(&token), None)
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(output.termination, Termination::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_spawn_failure_is_error() {
        let result = ProcessBuilder::new("extbuild-no-such-program-xyz").exec_supervised(None, None);
        assert!(result.is_err());
    }
}
