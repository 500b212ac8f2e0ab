//! Supervised execution of one ffmpeg transcode.
//!
//! [`Supervisor::run`] spawns the process, reads its diagnostic stream line by
//! line, reports progress, and enforces an inactivity timeout: if no line
//! arrives within the limit, the whole process group is killed and the run is
//! reported as hung. Each line read is raced against the deadline (and an
//! optional [`CancellationToken`]), so a silent ffmpeg can never block the
//! caller.
//!
//! A run always ends in exactly one [`RunOutcome`]. Runs that exit cleanly are
//! handed to the [`OutcomeValidator`], which checks the artifact on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use encodeforge_common::{Error, Result};
use futures::{Stream, StreamExt};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::command::ToolCommand;
use crate::diagnostics::{classify, decode_line, fraction_complete, DiagnosticEvent, DiagnosticLines};
use crate::probe::{FfprobeProber, MediaInfo, Prober};
use crate::process::{ExitInfo, Launcher, RunningProcess, TokioLauncher};
use crate::validate::OutcomeValidator;

/// Silence allowed between two diagnostic lines before a run counts as hung.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(200);

/// ffmpeg executable used when none is configured.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// How long to wait for a killed process to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Inactivity limit for the diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactivityTimeout {
    /// Wait forever for the next line.
    Disabled,
    /// Kill the process after this much silence.
    After(Duration),
}

impl InactivityTimeout {
    /// The limit, or `None` when disabled.
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::After(limit) => Some(limit),
        }
    }
}

impl Default for InactivityTimeout {
    fn default() -> Self {
        Self::After(DEFAULT_INACTIVITY_TIMEOUT)
    }
}

/// Settings for a [`Supervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// ffmpeg executable.
    pub ffmpeg_path: PathBuf,
    /// Limit on silence from the diagnostic stream.
    pub inactivity_timeout: InactivityTimeout,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG),
            inactivity_timeout: InactivityTimeout::default(),
        }
    }
}

/// Terminal status of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The artifact exists and probes as valid media.
    Succeeded { artifact: PathBuf, media: MediaInfo },
    /// ffmpeg exited cleanly but wrote nothing.
    FailedNoOutput { artifact: PathBuf },
    /// The artifact exists but is not usable media.
    FailedInvalidOutput { artifact: PathBuf, reason: String },
    /// ffmpeg cannot process the source.
    FailedUnsupportedInput { message: String },
    /// The inactivity timeout expired.
    FailedHung { partial_output: String },
    /// ffmpeg exited abnormally.
    FailedProcessError { partial_output: String, exit: ExitInfo },
    /// The caller cancelled the run.
    Cancelled { partial_output: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// A successfully produced artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcoded {
    /// Where the artifact was written.
    pub path: PathBuf,
    /// Probe results for the artifact.
    pub media: MediaInfo,
}

/// Everything a run produced: the command, its full diagnostic output and the
/// terminal outcome.
#[derive(Debug, Clone)]
pub struct SupervisedRun {
    /// Display form of the command line.
    pub command: String,
    /// Every diagnostic line read, newline-terminated.
    pub output: String,
    /// How the run ended.
    pub outcome: RunOutcome,
}

impl SupervisedRun {
    /// Convert the outcome into the crate's error taxonomy.
    pub fn into_result(self) -> Result<Transcoded> {
        let Self {
            command,
            output,
            outcome,
        } = self;

        match outcome {
            RunOutcome::Succeeded { artifact, media } => Ok(Transcoded {
                path: artifact,
                media,
            }),
            RunOutcome::FailedNoOutput { artifact } => Err(Error::NoOutput {
                path: artifact,
                command,
                output,
            }),
            RunOutcome::FailedInvalidOutput { artifact, reason } => Err(Error::InvalidOutput {
                path: artifact,
                reason,
                command,
                output,
            }),
            RunOutcome::FailedUnsupportedInput { message } => Err(Error::UnsupportedInput {
                command,
                line: message,
                output,
            }),
            RunOutcome::FailedHung { partial_output } => Err(Error::Hung {
                command,
                output: partial_output,
            }),
            RunOutcome::FailedProcessError {
                partial_output,
                exit,
            } => Err(Error::ProcessExit {
                command,
                status: exit.to_string(),
                output: partial_output,
            }),
            RunOutcome::Cancelled { partial_output } => Err(Error::Cancelled {
                command,
                output: partial_output,
            }),
        }
    }
}

/// Runs transcode commands under an inactivity watchdog.
pub struct Supervisor<L = TokioLauncher, P = FfprobeProber> {
    config: SupervisorConfig,
    launcher: L,
    validator: OutcomeValidator<P>,
}

impl Supervisor<TokioLauncher, FfprobeProber> {
    /// Real processes, validated with ffprobe from `PATH`.
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_parts(config, TokioLauncher, FfprobeProber::default())
    }
}

impl<L: Launcher, P: Prober> Supervisor<L, P> {
    pub fn with_parts(config: SupervisorConfig, launcher: L, prober: P) -> Self {
        Self {
            config,
            launcher,
            validator: OutcomeValidator::new(prober),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn validator(&self) -> &OutcomeValidator<P> {
        &self.validator
    }

    /// Run `command`, expecting it to write `artifact`.
    ///
    /// `on_progress` receives `0.0` once the process has started, a fraction
    /// of `total_duration` for every progress line, and `1.0` on success.
    /// Fractions are skipped when the total is unknown or not positive.
    ///
    /// # Errors
    ///
    /// Only failures to start the process are errors; everything after that
    /// is reported through [`SupervisedRun::outcome`].
    pub async fn run<F>(
        &self,
        command: &ToolCommand,
        artifact: &Path,
        total_duration: Option<f64>,
        mut on_progress: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<SupervisedRun>
    where
        F: FnMut(f64) + Send,
    {
        let command_line = command.command_line();
        info!("Running transcoding...\n{command_line}");
        tracing::debug!("arguments: {:?}", command.arguments());

        let mut process = self.launcher.launch(command)?;
        on_progress(0.0);

        let Some(stream) = process.take_diagnostics() else {
            terminate(process.as_mut()).await;
            return Err(Error::tool_failed(
                command.program_name(),
                "diagnostic stream unavailable",
            ));
        };

        let timeout = self.config.inactivity_timeout.duration();
        let mut lines = FramedRead::new(stream, DiagnosticLines::new());
        let mut output = String::new();

        let outcome = loop {
            match next_line(&mut lines, timeout, cancel).await {
                Next::Line(raw) => {
                    let line = decode_line(&raw);
                    output.push_str(&line);
                    output.push('\n');

                    match classify(&line) {
                        DiagnosticEvent::Progress { elapsed_secs } => {
                            if let Some(fraction) = fraction_complete(elapsed_secs, total_duration)
                            {
                                on_progress(fraction);
                            }
                        }
                        DiagnosticEvent::UnsupportedInput(message) => {
                            terminate(process.as_mut()).await;
                            break RunOutcome::FailedUnsupportedInput { message };
                        }
                        DiagnosticEvent::Other => {}
                    }
                }
                Next::TimedOut => {
                    terminate(process.as_mut()).await;
                    break RunOutcome::FailedHung {
                        partial_output: output.clone(),
                    };
                }
                Next::Cancelled => {
                    terminate(process.as_mut()).await;
                    break RunOutcome::Cancelled {
                        partial_output: output.clone(),
                    };
                }
                Next::Closed => {
                    break self
                        .finish(process.as_mut(), artifact, timeout, &output)
                        .await;
                }
            }
        };

        if outcome.is_success() {
            on_progress(1.0);
        }
        log_outcome(&outcome, &command_line, &output, artifact);

        Ok(SupervisedRun {
            command: command_line,
            output,
            outcome,
        })
    }

    /// The stream closed: reap the process, then let the validator decide.
    async fn finish(
        &self,
        process: &mut dyn RunningProcess,
        artifact: &Path,
        timeout: Option<Duration>,
        output: &str,
    ) -> RunOutcome {
        let waited = match timeout {
            Some(limit) => tokio::time::timeout(limit, process.wait()).await.ok(),
            None => Some(process.wait().await),
        };

        let exit = match waited {
            Some(Ok(exit)) => exit,
            Some(Err(e)) => {
                warn!("failed to collect exit status: {e}");
                return RunOutcome::FailedProcessError {
                    partial_output: output.to_string(),
                    exit: ExitInfo {
                        code: None,
                        signal: None,
                    },
                };
            }
            None => {
                terminate(process).await;
                return RunOutcome::FailedHung {
                    partial_output: output.to_string(),
                };
            }
        };

        if !exit.success() {
            return RunOutcome::FailedProcessError {
                partial_output: output.to_string(),
                exit,
            };
        }

        self.validator.validate(artifact).await
    }
}

enum Next {
    Line(Vec<u8>),
    Closed,
    TimedOut,
    Cancelled,
}

/// Wait for the next line, the inactivity deadline or cancellation.
async fn next_line<S>(
    lines: &mut S,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> Next
where
    S: Stream<Item = std::io::Result<Vec<u8>>> + Unpin,
{
    let read = async {
        match lines.next().await {
            Some(Ok(line)) => Next::Line(line),
            Some(Err(e)) => {
                warn!("error reading diagnostic stream: {e}");
                Next::Closed
            }
            None => Next::Closed,
        }
    };

    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .unwrap_or(Next::TimedOut),
            None => read.await,
        }
    };

    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Next::Cancelled,
            next = bounded => next,
        },
        None => bounded.await,
    }
}

/// Kill the process group and reap the leader.
async fn terminate(process: &mut dyn RunningProcess) {
    if let Err(e) = process.terminate().await {
        warn!("failed to kill process {:?}: {e}", process.id());
    }
    match tokio::time::timeout(REAP_TIMEOUT, process.wait()).await {
        Ok(Ok(exit)) => tracing::debug!("killed process ended with {exit}"),
        Ok(Err(e)) => warn!("failed to reap killed process: {e}"),
        Err(_) => warn!("killed process {:?} was not reaped in time", process.id()),
    }
}

fn log_outcome(outcome: &RunOutcome, command: &str, output: &str, artifact: &Path) {
    match outcome {
        RunOutcome::Succeeded { .. } => {
            info!("Transcoding to {} succeeded", artifact.display());
        }
        RunOutcome::FailedHung { .. } => {
            error!("Process hung...\nCommand\n{command}\nOutput\n{output}");
        }
        RunOutcome::Cancelled { .. } => {
            warn!("Transcoding cancelled...\nCommand\n{command}\nOutput\n{output}");
        }
        RunOutcome::FailedUnsupportedInput { message } => {
            error!("Failed encoding: {message}\nCommand\n{command}\nOutput\n{output}");
        }
        RunOutcome::FailedProcessError { exit, .. } => {
            error!("Failed encoding, ffmpeg exited with {exit}...\nCommand\n{command}\nOutput\n{output}");
        }
        RunOutcome::FailedNoOutput { .. } => {
            error!("Failed encoding, no output file created...\nCommand\n{command}\nOutput\n{output}");
        }
        RunOutcome::FailedInvalidOutput { reason, .. } => {
            error!("Failed encoding, {reason}...\nCommand\n{command}\nOutput\n{output}");
        }
    }
}
