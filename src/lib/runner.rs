//! Command runner for vpn-admin
//!
//! Executes external command lines through `/bin/sh -c` with:
//! - a hard timeout (the whole process group is killed when it expires)
//! - a per-stream output cap (exceeding it kills the command and marks the result truncated)
//! - a fixed `C` locale so downstream parsers see stable English output
//! - failure classification: timeout, privilege prompt, missing command, non-zero exit
//!
//! Expected failures come back as a [`CommandResult`]; only misuse of the
//! runner itself (empty command line, unusable options) is an `Err`.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use wait_timeout::ChildExt;

use crate::config::{AdminConfig, DEFAULT_COMMAND_TIMEOUT, DEFAULT_MAX_OUTPUT_BYTES};
use crate::logging::Logger;
use crate::sanitizer::sanitize_bytes;

/// Shell used to interpret command lines
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// How often the wait loop checks the output cap
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Markers that a privileged command wanted a password or a terminal
const AUTH_MARKERS: [&str; 6] = [
    "password is required",
    "a terminal is required",
    "no tty present",
    "incorrect password",
    "[sudo] password for",
    "is not in the sudoers file",
];

/// Why a command did not succeed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    #[default]
    None,
    Timeout,
    AuthRequired,
    CommandNotFound,
    NonZeroExit,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::None => "none",
            FailureKind::Timeout => "timeout",
            FailureKind::AuthRequired => "auth-required",
            FailureKind::CommandNotFound => "command-not-found",
            FailureKind::NonZeroExit => "non-zero-exit",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Misuse of the runner, as opposed to a command that failed
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Command line must not be empty")]
    EmptyCommand,

    #[error("Invalid command options: {0}")]
    InvalidOptions(String),

    #[error("Failed to start command: {0}")]
    Spawn(#[source] io::Error),

    #[error("Failed while waiting for command: {0}")]
    Wait(#[source] io::Error),
}

/// Per-invocation execution options
#[derive(Debug, Clone)]
pub struct CommandOptions {
    pub timeout: Duration,
    /// Cap on captured bytes, applied to stdout and stderr separately
    pub max_output_bytes: usize,
    pub working_dir: Option<PathBuf>,
    /// Extra environment; the locale override is applied after these
    pub env: Vec<(String, String)>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            working_dir: None,
            env: Vec::new(),
        }
    }
}

impl CommandOptions {
    pub fn from_config(config: &AdminConfig) -> Self {
        Self {
            timeout: config.command_timeout,
            max_output_bytes: config.max_output_bytes,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Outcome of one command invocation
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    /// Correlates this result with its log lines
    pub invocation_id: String,
    pub success: bool,
    /// Sanitized standard output
    pub stdout: String,
    /// Sanitized standard error
    pub stderr: String,
    pub failure_kind: FailureKind,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Output exceeded the cap and the command was stopped
    pub truncated: bool,
    pub duration: Duration,
}

impl CommandResult {
    /// Successful result with the given output, mostly useful for test doubles
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// Failed result with an exit code and error text classified as a real run would be
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        let failure_kind = classify_failure(Some(exit_code), false, "", &stderr);
        Self {
            success: failure_kind == FailureKind::None,
            stderr,
            failure_kind,
            exit_code: Some(exit_code),
            ..Self::default()
        }
    }

    /// Timed-out result
    pub fn timed_out(duration: Duration) -> Self {
        Self {
            failure_kind: FailureKind::Timeout,
            duration,
            ..Self::default()
        }
    }

    /// Best error description: stderr, then stdout, trimmed
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        self.stdout.trim().to_string()
    }
}

/// Anything that can run a command line. The seam test doubles plug into.
pub trait CommandRunner: Send + Sync {
    fn execute(
        &self,
        command_line: &str,
        options: &CommandOptions,
    ) -> Result<CommandResult, RunnerError>;
}

/// Classify a finished (or killed) command.
///
/// A zero exit is still an auth failure when the only output is a
/// privilege prompt on stderr.
pub fn classify_failure(
    exit_code: Option<i32>,
    timed_out: bool,
    stdout: &str,
    stderr: &str,
) -> FailureKind {
    if timed_out {
        return FailureKind::Timeout;
    }

    let stderr_lower = stderr.to_lowercase();
    let auth_prompt = AUTH_MARKERS.iter().any(|m| stderr_lower.contains(m));

    if exit_code == Some(0) {
        if auth_prompt && stdout.trim().is_empty() {
            return FailureKind::AuthRequired;
        }
        return FailureKind::None;
    }

    if auth_prompt {
        return FailureKind::AuthRequired;
    }

    let not_found = exit_code == Some(127)
        || stderr_lower.contains("command not found")
        || stderr_lower
            .lines()
            .any(|line| line.trim_end().ends_with(": not found"));
    if not_found {
        return FailureKind::CommandNotFound;
    }

    FailureKind::NonZeroExit
}

/// Runs commands as real OS processes
#[derive(Debug, Clone)]
pub struct SystemRunner {
    shell: PathBuf,
    logger: Logger,
}

impl SystemRunner {
    pub fn new(logger: Logger) -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            logger,
        }
    }

    pub fn with_shell(logger: Logger, shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            logger,
        }
    }

    fn build_command(&self, command_line: &str, options: &CommandOptions) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        // Parsers expect English month names and `.` decimals
        cmd.env("LANG", "C").env("LC_ALL", "C").env_remove("LANGUAGE");

        if let Some(ref dir) = options.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a timeout can take down pipelines too
            cmd.process_group(0);
        }

        cmd
    }
}

impl CommandRunner for SystemRunner {
    fn execute(
        &self,
        command_line: &str,
        options: &CommandOptions,
    ) -> Result<CommandResult, RunnerError> {
        if command_line.trim().is_empty() {
            return Err(RunnerError::EmptyCommand);
        }
        if options.timeout.is_zero() {
            return Err(RunnerError::InvalidOptions(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if options.max_output_bytes == 0 {
            return Err(RunnerError::InvalidOptions(
                "max_output_bytes must be greater than zero".to_string(),
            ));
        }

        let invocation_id = Uuid::new_v4().to_string();
        let tag = invocation_id[..8].to_string();
        self.logger
            .info(format_args!("[{}] Executing: {}", tag, command_line));

        let start = Instant::now();
        let mut child = match self.build_command(command_line, options).spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.logger
                    .error(format_args!("[{}] Shell not found: {}", tag, self.shell.display()));
                return Ok(CommandResult {
                    invocation_id,
                    stderr: format!("{}: command not found", self.shell.display()),
                    failure_kind: FailureKind::CommandNotFound,
                    duration: start.elapsed(),
                    ..CommandResult::default()
                });
            }
            Err(e) => return Err(RunnerError::Spawn(e)),
        };

        let limit_hit = Arc::new(AtomicBool::new(false));
        let stdout_reader = spawn_capture(
            child.stdout.take(),
            options.max_output_bytes,
            Arc::clone(&limit_hit),
        );
        let stderr_reader = spawn_capture(
            child.stderr.take(),
            options.max_output_bytes,
            Arc::clone(&limit_hit),
        );

        let waited = wait_bounded(&mut child, options.timeout, &limit_hit);
        let (status, timed_out) = match waited {
            Ok(outcome) => outcome,
            Err(e) => {
                terminate(&mut child);
                return Err(RunnerError::Wait(e));
            }
        };
        // Reap stragglers that still hold the pipes open
        kill_group(&child);

        let (stdout_bytes, stdout_truncated) = join_capture(stdout_reader);
        let (stderr_bytes, stderr_truncated) = join_capture(stderr_reader);
        let duration = start.elapsed();

        let stdout = sanitize_bytes(&stdout_bytes);
        let stderr = sanitize_bytes(&stderr_bytes);
        let exit_code = status.and_then(|s| s.code());
        let truncated = stdout_truncated || stderr_truncated;
        // Cut-off output is never complete, even when the command exited zero
        let failure_kind = match classify_failure(exit_code, timed_out, &stdout, &stderr) {
            FailureKind::None if truncated => FailureKind::NonZeroExit,
            kind => kind,
        };

        let result = CommandResult {
            invocation_id,
            success: failure_kind == FailureKind::None,
            stdout,
            stderr,
            failure_kind,
            exit_code,
            truncated,
            duration,
        };

        if truncated {
            self.logger.warn(format_args!(
                "[{}] Output exceeded {} bytes; command stopped",
                tag, options.max_output_bytes
            ));
        }
        match result.failure_kind {
            FailureKind::None => self.logger.debug(format_args!(
                "[{}] Finished in {} ms",
                tag,
                duration.as_millis()
            )),
            FailureKind::Timeout => self.logger.error(format_args!(
                "[{}] Timed out after {} ms: {}",
                tag,
                options.timeout.as_millis(),
                command_line
            )),
            kind => self.logger.warn(format_args!(
                "[{}] Failed ({}, exit {}): {}",
                tag,
                kind,
                exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                result.error_text()
            )),
        }

        Ok(result)
    }
}

/// Wait until exit, timeout, or the output cap trips.
///
/// Returns the exit status (None when the process had to be killed) and
/// whether the timeout was the reason.
fn wait_bounded(
    child: &mut Child,
    timeout: Duration,
    limit_hit: &AtomicBool,
) -> io::Result<(Option<std::process::ExitStatus>, bool)> {
    let deadline = Instant::now() + timeout;

    loop {
        let now = Instant::now();
        if now >= deadline {
            terminate(child);
            return Ok((None, true));
        }

        let slice = POLL_INTERVAL.min(deadline - now);
        if let Some(status) = child.wait_timeout(slice)? {
            return Ok((Some(status), false));
        }

        if limit_hit.load(Ordering::SeqCst) {
            terminate(child);
            return Ok((None, false));
        }
    }
}

/// Kill the process group and reap the leader
fn terminate(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    let pgid = child.id() as libc::pid_t;
    if pgid > 0 {
        // SAFETY: plain syscall on a process group we created; errors (ESRCH) are ignored
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

enum Pipe {
    Stdout(ChildStdout),
    Stderr(ChildStderr),
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Pipe::Stdout(p) => p.read(buf),
            Pipe::Stderr(p) => p.read(buf),
        }
    }
}

impl From<ChildStdout> for Pipe {
    fn from(p: ChildStdout) -> Self {
        Pipe::Stdout(p)
    }
}

impl From<ChildStderr> for Pipe {
    fn from(p: ChildStderr) -> Self {
        Pipe::Stderr(p)
    }
}

type Capture = Option<JoinHandle<(Vec<u8>, bool)>>;

/// Read a pipe on its own thread, keeping at most `max` bytes
fn spawn_capture<P: Into<Pipe>>(pipe: Option<P>, max: usize, limit_hit: Arc<AtomicBool>) -> Capture {
    let mut pipe: Pipe = pipe?.into();
    Some(thread::spawn(move || {
        let mut captured = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => return (captured, false),
                Ok(n) => {
                    let room = max.saturating_sub(captured.len());
                    if n > room {
                        captured.extend_from_slice(&chunk[..room]);
                        limit_hit.store(true, Ordering::SeqCst);
                        return (captured, true);
                    }
                    captured.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return (captured, false),
            }
        }
    }))
}

fn join_capture(handle: Capture) -> (Vec<u8>, bool) {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Quote one argument for `/bin/sh`; plain words pass through unchanged
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '@' | ':' | '='));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Check whether `program` resolves on the host's PATH
pub fn is_command_available(runner: &dyn CommandRunner, program: &str) -> bool {
    if program.is_empty()
        || !program
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return false;
    }
    runner
        .execute(
            &format!("command -v {}", program),
            &CommandOptions::default().with_timeout(Duration::from_secs(5)),
        )
        .map(|r| r.success && !r.stdout.trim().is_empty())
        .unwrap_or(false)
}
