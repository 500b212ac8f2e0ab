//! Shared test harness for integration tests.
//!
//! Provides [`FakeFfmpeg`], a shell script standing in for ffmpeg, and
//! [`FakeProber`], which reports media without running ffprobe.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use encodeforge::av::probe::{MediaInfo, Prober, VideoStream};
use encodeforge::av::{InactivityTimeout, SupervisorConfig, TokioLauncher};
use encodeforge::common::{Result, TranscodePolicy};
use encodeforge::Transcoder;
use tempfile::TempDir;

/// Install a tracing subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A scratch directory holding a fake `ffmpeg` script and an input file.
///
/// The script sees the real argument list; `$out` is the last argument and
/// every invocation records its arguments in `args.txt` (space-joined) and
/// `argv.txt` (one per line).
pub struct FakeFfmpeg {
    pub dir: TempDir,
    pub program: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl FakeFfmpeg {
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let program = dir.path().join("ffmpeg");
        let args_file = dir.path().join("args.txt");
        let argv_file = dir.path().join("argv.txt");

        let script = format!(
            "#!/bin/sh\nfor out; do :; done\necho \"$@\" > '{}'\nprintf '%s\\n' \"$@\" > '{}'\n{body}\n",
            args_file.display(),
            argv_file.display()
        );
        std::fs::write(&program, script).expect("failed to write script");
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))
            .expect("failed to chmod script");

        let input = dir.path().join("awesome movie.mov");
        std::fs::write(&input, b"source").expect("failed to write input");
        let output = dir.path().join("out.mp4");

        Self {
            dir,
            program,
            input,
            output,
        }
    }

    /// Arguments of the last invocation, space-joined.
    pub fn recorded_args(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("args.txt"))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// Arguments of the last invocation, one entry per argument.
    pub fn recorded_argv(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("argv.txt"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    pub fn transcoder(
        &self,
        timeout: InactivityTimeout,
        policy: TranscodePolicy,
        prober: FakeProber,
    ) -> Transcoder<TokioLauncher, FakeProber> {
        let config = SupervisorConfig {
            ffmpeg_path: self.program.clone(),
            inactivity_timeout: timeout,
        };
        Transcoder::with_parts(config, policy, TokioLauncher, prober)
    }
}

/// Short timeout for hang tests.
pub fn short_timeout() -> InactivityTimeout {
    InactivityTimeout::After(Duration::from_millis(500))
}

/// Reports every non-empty file as a video of fixed size and duration.
/// Empty files have no streams and therefore probe as invalid.
#[derive(Debug, Clone)]
pub struct FakeProber {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub rotation: Option<i32>,
}

impl Default for FakeProber {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
            duration: 6.0,
            rotation: None,
        }
    }
}

#[async_trait]
impl Prober for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let len = tokio::fs::metadata(path).await?.len();
        let video = (len > 0).then(|| VideoStream {
            codec: "h264".to_string(),
            width: self.width,
            height: self.height,
            frame_rate: Some(25.0),
            display_aspect_ratio: None,
            rotation: self.rotation,
        });

        Ok(MediaInfo {
            path: path.to_path_buf(),
            container: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            duration: Some(self.duration),
            bit_rate: None,
            video,
            audio: Vec::new(),
        })
    }
}

/// Collects progress samples from a run.
#[derive(Debug, Clone, Default)]
pub struct ProgressLog(Arc<Mutex<Vec<f64>>>);

impl ProgressLog {
    pub fn sink(&self) -> impl FnMut(f64) + Send + 'static {
        let samples = self.0.clone();
        move |p| samples.lock().unwrap().push(p)
    }

    pub fn samples(&self) -> Vec<f64> {
        self.0.lock().unwrap().clone()
    }
}
