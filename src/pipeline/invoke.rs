//! External tool invocation: run a converter binary and judge its exit.
//!
//! Tools run through `tokio::process`, so a slow conversion suspends only the
//! request awaiting it. The child is spawned with `kill_on_drop(true)`: when
//! the timeout fires the pending `wait_with_output` future is dropped and the
//! process is killed with it. On Unix the child also leads its own process
//! group, and the whole group is killed on timeout. This reaches helpers
//! such as the `soffice.bin` started by the `libreoffice` wrapper script,
//! which would otherwise keep writing into a workspace being deleted.
//!
//! Success is exit status 0 and nothing else. Any other status becomes
//! [`ConvertError::ExternalToolFailure`] carrying what the tool printed on
//! stderr (stdout when stderr is empty), trimmed and capped at
//! [`MAX_DIAGNOSTIC_BYTES`].

use crate::error::ConvertError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

/// Largest diagnostic carried into an error message.
pub const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// A fully specified tool command line.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    /// Human-readable tool name used in logs and errors ("pandoc").
    pub tool: String,
    /// Executable to run (bare name resolved on `PATH`, or a path).
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Arguments rendered lossily, for logging and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// What a successful tool run printed.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Run `cmd` in `cwd`, waiting at most `timeout` (no limit when `None`).
pub async fn run_tool(
    cmd: &ToolCommand,
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<ToolOutput, ConvertError> {
    debug!(
        tool = %cmd.tool,
        program = %cmd.program.display(),
        args = ?cmd.args_lossy(),
        "Running external tool"
    );
    let start = Instant::now();

    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command
        .spawn()
        .map_err(|source| ConvertError::ToolUnavailable {
            tool: cmd.tool.clone(),
            program: cmd.program.clone(),
            source,
        })?;
    let pid = child.id();

    let waited = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(waited) => waited,
            Err(_) => {
                kill_process_group(pid);
                return Err(ConvertError::ToolTimeout {
                    tool: cmd.tool.clone(),
                    limit_ms: limit.as_millis() as u64,
                });
            }
        },
        None => child.wait_with_output().await,
    };
    let output = waited.map_err(|e| ConvertError::io(format!("wait for {}", cmd.tool), e))?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(ConvertError::ExternalToolFailure {
            tool: cmd.tool.clone(),
            status: output.status.code(),
            diagnostic: diagnostic(&stderr, &stdout),
        });
    }

    info!("{} finished in {}ms", cmd.tool, duration_ms);
    Ok(ToolOutput {
        stdout,
        stderr,
        duration_ms,
    })
}

/// SIGKILL every process left in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    // SAFETY: plain syscall on a process group this module created.
    if unsafe { libc::kill(-pid, libc::SIGKILL) } != 0 {
        debug!(
            "Process group {} already gone: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Pick the more useful stream and cap its length at a char boundary.
fn diagnostic(stderr: &str, stdout: &str) -> String {
    let text = match stderr.trim() {
        "" => stdout.trim(),
        s => s,
    };
    if text.is_empty() {
        return "no diagnostic output".to_string();
    }
    if text.len() <= MAX_DIAGNOSTIC_BYTES {
        return text.to_string();
    }
    let mut end = MAX_DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\u{2026}", &text[..end])
}
