//! Spawning and terminating the external transcode process.
//!
//! The supervisor only talks to the [`Launcher`] and [`RunningProcess`]
//! traits, so tests can drive it with scripted streams. [`TokioLauncher`] is
//! the real implementation: it starts ffmpeg in its own process group so a
//! hang can be cleared by killing the whole group, including any helpers
//! ffmpeg spawned.

use std::fmt;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use encodeforge_common::{Error, Result};
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

use crate::command::ToolCommand;

/// Stream of diagnostic bytes read from the process.
pub type DiagnosticStream = Box<dyn AsyncRead + Send + Unpin>;

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, absent when killed by a signal.
    pub code: Option<i32>,
    /// Terminating signal on unix.
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// A normal exit with `code`.
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// True for a zero exit code.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// Starts external processes.
pub trait Launcher: Send + Sync {
    /// Spawn `command` with its diagnostic stream piped.
    fn launch(&self, command: &ToolCommand) -> Result<Box<dyn RunningProcess>>;
}

/// A spawned process under supervision.
#[async_trait]
pub trait RunningProcess: Send {
    /// OS process id, when still known.
    fn id(&self) -> Option<u32>;

    /// Take the diagnostic stream. Returns `None` on the second call.
    fn take_diagnostics(&mut self) -> Option<DiagnosticStream>;

    /// Forcibly terminate the process and everything in its group.
    async fn terminate(&mut self) -> std::io::Result<()>;

    /// Wait for the process to exit.
    async fn wait(&mut self) -> std::io::Result<ExitInfo>;
}

/// [`Launcher`] backed by `tokio::process`.
///
/// ffmpeg writes progress and errors to stderr, so that is the diagnostic
/// stream; stdout is discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl Launcher for TokioLauncher {
    fn launch(&self, command: &ToolCommand) -> Result<Box<dyn RunningProcess>> {
        let mut cmd = Command::new(command.program());
        cmd.args(command.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(command.program_name())
            } else {
                Error::tool_failed(command.program_name(), format!("failed to spawn: {e}"))
            }
        })?;

        tracing::debug!("spawned {} as pid {:?}", command.program_name(), child.id());

        Ok(Box::new(TokioProcess { child }))
    }
}

struct TokioProcess {
    child: Child,
}

#[async_trait]
impl RunningProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_diagnostics(&mut self) -> Option<DiagnosticStream> {
        self.child
            .stderr
            .take()
            .map(|stderr| Box::new(stderr) as DiagnosticStream)
    }

    async fn terminate(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                use nix::sys::signal::{killpg, Signal};
                use nix::unistd::Pid;

                // The child leads its own group (process_group(0)), so pgid == pid.
                match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                    Ok(()) => return Ok(()),
                    Err(e) => tracing::warn!("killpg({pid}) failed: {e}; killing the child only"),
                }
            }
        }

        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already exited and reaped.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn wait(&mut self) -> std::io::Result<ExitInfo> {
        self.child.wait().await.map(ExitInfo::from)
    }
}
