//! Builder for external tool invocations.
//!
//! [`ToolCommand`] describes a program and its arguments. Short-lived tools
//! (ffprobe) run through [`ToolCommand::execute`], which captures their output
//! under a total-time limit. Long-running transcodes are handed to a
//! [`crate::process::Launcher`] and supervised instead.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use encodeforge_common::{Error, Result};
use tokio::process::Command;

use crate::options::AssembledOptions;

/// Default limit for [`ToolCommand::execute`]: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A program plus arguments.
///
/// # Example
///
/// ```no_run
/// use encodeforge_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> encodeforge_common::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("quiet")
///     .arg("-print_format").arg("json")
///     .arg("-show_format")
///     .arg("/path/to/video.mov")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// `ffmpeg -y -i <input> <options...> <output>`.
    pub fn transcode(
        ffmpeg: &Path,
        input: &Path,
        options: &AssembledOptions,
        output: &Path,
    ) -> Self {
        let mut cmd = Self::new(ffmpeg.to_path_buf());
        cmd.args(["-y", "-i"]);
        cmd.arg(input);
        cmd.args(options.to_args());
        cmd.arg(output);
        cmd
    }

    /// Append a single argument. Paths are kept as raw OS strings.
    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<OsString>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time for [`ToolCommand::execute`].
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The argument list.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Short program name used in error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Human-readable command line for logs and diagnostics.
    ///
    /// Arguments containing whitespace or quotes are single-quoted. This is
    /// for display only; nothing is ever passed through a shell.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().map(|a| quote_for_display(&a.to_string_lossy())))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] if the program does not exist.
    /// - [`Error::ToolFailed`] if the process times out, fails to spawn, or
    ///   exits with a non-zero status (message includes stderr).
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(program_name.clone())
            } else {
                Error::tool_failed(program_name.clone(), format!("failed to spawn: {e}"))
            }
        })?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(Error::tool_failed(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(Error::tool_failed(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // The child future was dropped with the timeout; kill_on_drop reaps it.
            Err(_elapsed) => Err(Error::tool_failed(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

fn quote_for_display(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_string()
    }
}
