//! One-call transcoding: probe, resolve geometry, assemble options, supervise,
//! validate.

use std::path::Path;

use encodeforge_av::{
    assemble, geometry, resolve_tool, FfprobeProber, Launcher, OptionInput, OptionSet, Prober,
    Supervisor, SupervisorConfig, TokioLauncher, ToolCommand, Transcoded,
};
use encodeforge_common::{Result, SourceMedia, TranscodePolicy};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Transcodes files with a fixed set of tools and policies.
///
/// The prober is used twice per job: once to read the input and once to
/// validate the artifact.
pub struct Transcoder<L = TokioLauncher, P = FfprobeProber> {
    supervisor: Supervisor<L, P>,
    policy: TranscodePolicy,
}

impl Transcoder<TokioLauncher, FfprobeProber> {
    /// Resolve ffmpeg and ffprobe and wire them up.
    ///
    /// # Errors
    ///
    /// [`encodeforge_common::Error::ToolNotFound`] when either tool is
    /// missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let ffmpeg = resolve_tool("ffmpeg", config.tools.ffmpeg_path.as_deref())?;
        let ffprobe = resolve_tool("ffprobe", config.tools.ffprobe_path.as_deref())?;

        tracing::info!(
            "Using ffmpeg at {} and ffprobe at {}",
            ffmpeg.display(),
            ffprobe.display()
        );

        let supervisor_config = SupervisorConfig {
            ffmpeg_path: ffmpeg,
            inactivity_timeout: config.transcode.inactivity_timeout(),
        };

        Ok(Self::with_parts(
            supervisor_config,
            config.transcode.policy(),
            TokioLauncher,
            FfprobeProber::new(ffprobe),
        ))
    }
}

impl<L: Launcher, P: Prober> Transcoder<L, P> {
    pub fn with_parts(
        supervisor_config: SupervisorConfig,
        policy: TranscodePolicy,
        launcher: L,
        prober: P,
    ) -> Self {
        Self {
            supervisor: Supervisor::with_parts(supervisor_config, launcher, prober),
            policy,
        }
    }

    pub fn policy(&self) -> &TranscodePolicy {
        &self.policy
    }

    pub fn supervisor(&self) -> &Supervisor<L, P> {
        &self.supervisor
    }

    /// Probe `input` and transcode it to `output`.
    pub async fn transcode<F>(
        &self,
        input: &Path,
        output: &Path,
        options: OptionInput,
        on_progress: F,
    ) -> Result<Transcoded>
    where
        F: FnMut(f64) + Send,
    {
        let prober = self.supervisor.validator().prober();
        let media = prober.probe(input).await?;
        if !media.is_valid() {
            tracing::warn!(
                "{} found no audio or video streams in {}",
                prober.name(),
                input.display()
            );
        }

        self.run_job(&media.to_source_media(), output, options, on_progress, None)
            .await
    }

    /// Transcode an already-probed source.
    pub async fn run_job<F>(
        &self,
        source: &SourceMedia,
        output: &Path,
        options: OptionInput,
        on_progress: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<Transcoded>
    where
        F: FnMut(f64) + Send,
    {
        let geometry = geometry::resolve(source, options.requested_resolution(), &self.policy);
        let options = assemble(options, &geometry);

        let total = effective_duration(
            source.duration_secs,
            options.as_set().and_then(OptionSet::duration_secs),
        );

        let command = ToolCommand::transcode(
            &self.supervisor.config().ffmpeg_path,
            &source.path,
            &options,
            output,
        );

        self.supervisor
            .run(&command, output, total, on_progress, cancel)
            .await?
            .into_result()
    }
}

/// Length of the output timeline: the source duration, cut short by a
/// positive `duration` option.
fn effective_duration(source_secs: f64, limit: Option<f64>) -> Option<f64> {
    let usable = |d: &f64| d.is_finite() && *d > 0.0;
    match (Some(source_secs).filter(usable), limit.filter(usable)) {
        (Some(source), Some(limit)) => Some(source.min(limit)),
        (source, limit) => source.or(limit),
    }
}
