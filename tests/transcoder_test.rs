//! End-to-end transcoder tests against a scripted ffmpeg.

#![cfg(unix)]

mod common;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use common::{init_tracing, short_timeout, FakeFfmpeg, FakeProber, ProgressLog};
use encodeforge::av::{InactivityTimeout, OptionSet, SupervisorConfig, TokioLauncher};
use encodeforge::common::{AspectPolicy, Axis, Resolution, SourceMedia, TranscodePolicy};
use encodeforge::{Error, OptionInput, Transcoder};
use tokio_util::sync::CancellationToken;

const PROGRESS_THEN_WRITE: &str = r#"
printf 'Input #0, mov,mp4,m4a,3gp,3g2,mj2, from in.mov:\n' >&2
printf 'frame=   10 fps=0.0 q=0.0 size=       0kB time=00:00:01.50 bitrate=   0.0kbits/s\r' >&2
printf 'frame=   20 fps=0.0 q=0.0 size=       0kB time=00:00:03.00 bitrate=   0.0kbits/s\r' >&2
printf 'frame=   40 fps=0.0 q=0.0 size=       0kB time=00:00:06.00 bitrate=   0.0kbits/s\n' >&2
echo encoded > "$out"
"#;

fn default_policy() -> TranscodePolicy {
    TranscodePolicy::default()
}

// ---------------------------------------------------------------------------
// Success
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_transcode_reports_progress() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new(PROGRESS_THEN_WRITE);
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::default(),
        default_policy(),
        FakeProber::default(),
    );
    let progress = ProgressLog::default();

    let transcoded = transcoder
        .transcode(
            &ffmpeg.input,
            &ffmpeg.output,
            OptionSet::new().with("video_codec", "libx264").into(),
            progress.sink(),
        )
        .await
        .unwrap();

    assert_eq!(transcoded.path, ffmpeg.output);
    assert!(transcoded.media.is_valid());
    assert_eq!(progress.samples(), vec![0.0, 0.25, 0.5, 1.0, 1.0]);

    let args = ffmpeg.recorded_args();
    assert!(args.starts_with("-y -i"), "unexpected args: {args}");
    assert!(args.contains("awesome movie.mov -vcodec libx264"));
    assert!(args.ends_with("out.mp4"));
}

#[tokio::test]
async fn duration_option_shortens_progress_timeline() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new(PROGRESS_THEN_WRITE);
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::default(),
        default_policy(),
        FakeProber::default(),
    );
    let progress = ProgressLog::default();

    transcoder
        .transcode(
            &ffmpeg.input,
            &ffmpeg.output,
            OptionSet::new().with("duration", 3).into(),
            progress.sink(),
        )
        .await
        .unwrap();

    assert_eq!(progress.samples(), vec![0.0, 0.5, 1.0, 1.0, 1.0]);
    assert!(ffmpeg.recorded_args().contains("-t 3"));
}

#[tokio::test]
async fn rotated_source_is_scaled_and_corrected() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new("echo encoded > \"$out\"");
    let policy = TranscodePolicy {
        aspect: AspectPolicy::preserving(Axis::Width),
        autorotate: true,
    };
    let prober = FakeProber {
        width: 640,
        height: 480,
        rotation: Some(90),
        ..FakeProber::default()
    };
    let transcoder = ffmpeg.transcoder(InactivityTimeout::default(), policy, prober);

    transcoder
        .transcode(
            &ffmpeg.input,
            &ffmpeg.output,
            OptionSet::new()
                .with("resolution", Resolution::new(660, 400))
                .into(),
            |_| {},
        )
        .await
        .unwrap();

    let args = ffmpeg.recorded_args();
    assert!(args.contains("-s 660x880"), "unexpected args: {args}");
    assert!(args.contains("-vf transpose=1"), "unexpected args: {args}");
    assert!(args.contains("-metadata:s:v:0 rotate=0"), "unexpected args: {args}");
}

#[tokio::test]
async fn raw_options_bypass_geometry() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new("echo encoded > \"$out\"");
    let policy = TranscodePolicy {
        aspect: AspectPolicy::preserving(Axis::Width),
        autorotate: true,
    };
    let prober = FakeProber {
        rotation: Some(90),
        ..FakeProber::default()
    };
    let transcoder = ffmpeg.transcoder(InactivityTimeout::default(), policy, prober);

    transcoder
        .transcode(
            &ffmpeg.input,
            &ffmpeg.output,
            OptionInput::raw("-vcodec libx264 -s 300x200").unwrap(),
            |_| {},
        )
        .await
        .unwrap();

    let args = ffmpeg.recorded_args();
    assert!(args.contains("-vcodec libx264 -s 300x200"));
    assert!(!args.contains("transpose"));
}

#[tokio::test]
async fn quoted_raw_values_reach_ffmpeg_intact() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new("echo encoded > \"$out\"");
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::default(),
        default_policy(),
        FakeProber::default(),
    );

    transcoder
        .transcode(
            &ffmpeg.input,
            &ffmpeg.output,
            OptionInput::raw(r#"-metadata title="My Movie" -vf "scale=320:240, hflip""#)
                .unwrap(),
            |_| {},
        )
        .await
        .unwrap();

    let argv = ffmpeg.recorded_argv();
    assert_eq!(
        argv[3..7],
        ["-metadata", "title=My Movie", "-vf", "scale=320:240, hflip"]
    );
    assert_eq!(argv[2], ffmpeg.input.to_string_lossy());
}

#[tokio::test]
async fn disabled_timeout_waits_for_slow_output() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new(
        "sleep 1\nprintf 'frame= 1 time=00:00:06.00\\n' >&2\necho encoded > \"$out\"",
    );
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::Disabled,
        default_policy(),
        FakeProber::default(),
    );

    let result = transcoder
        .transcode(&ffmpeg.input, &ffmpeg.output, OptionInput::default(), |_| {})
        .await;
    assert!(result.is_ok(), "unexpected failure: {result:?}");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_ffmpeg_is_killed_as_hung() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new("printf 'frame= 1 time=00:00:00.10\\r' >&2\nsleep 30");
    let transcoder = ffmpeg.transcoder(short_timeout(), default_policy(), FakeProber::default());

    let started = Instant::now();
    let err = transcoder
        .transcode(&ffmpeg.input, &ffmpeg.output, OptionInput::default(), |_| {})
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_matches!(&err, Error::Hung { output, .. } if output.contains("time=00:00:00.10"));
    assert!(err.to_string().starts_with("process hung"));
}

#[tokio::test]
async fn slow_output_is_hung_with_a_short_timeout() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new("sleep 2\necho encoded > \"$out\"");
    let transcoder = ffmpeg.transcoder(short_timeout(), default_policy(), FakeProber::default());

    let err = transcoder
        .transcode(&ffmpeg.input, &ffmpeg.output, OptionInput::default(), |_| {})
        .await
        .unwrap_err();
    assert_matches!(err, Error::Hung { .. });
}

#[tokio::test]
async fn unsupported_codec_fails_immediately() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new(
        "echo 'Unsupported codec with id 100359 for input stream 2' >&2\nsleep 30",
    );
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::default(),
        default_policy(),
        FakeProber::default(),
    );

    let started = Instant::now();
    let err = transcoder
        .transcode(&ffmpeg.input, &ffmpeg.output, OptionInput::default(), |_| {})
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_matches!(
        err,
        Error::UnsupportedInput { line, command, .. }
            if line.contains("Unsupported codec") && command.contains("ffmpeg")
    );
}

#[tokio::test]
async fn nonzero_exit_is_a_process_error() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new(
        "printf 'title           : Caf\\351\\n' >&2\necho 'Conversion failed!' >&2\nexit 1",
    );
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::default(),
        default_policy(),
        FakeProber::default(),
    );
    let progress = ProgressLog::default();

    let err = transcoder
        .transcode(
            &ffmpeg.input,
            &ffmpeg.output,
            OptionInput::default(),
            progress.sink(),
        )
        .await
        .unwrap_err();

    assert_matches!(
        &err,
        Error::ProcessExit { status, output, .. }
            if status == "exit code 1" && output.contains("Café") && output.contains("Conversion failed!")
    );
    assert_eq!(progress.samples(), vec![0.0]);
}

#[tokio::test]
async fn missing_artifact_is_no_output() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new("printf 'frame= 1 time=00:00:06.00\\n' >&2");
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::default(),
        default_policy(),
        FakeProber::default(),
    );

    let err = transcoder
        .transcode(&ffmpeg.input, &ffmpeg.output, OptionInput::default(), |_| {})
        .await
        .unwrap_err();
    assert_matches!(&err, Error::NoOutput { path, .. } if *path == ffmpeg.output);
    assert!(err.to_string().contains("no output file created"));
}

#[tokio::test]
async fn empty_artifact_is_invalid_output() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new(": > \"$out\"");
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::default(),
        default_policy(),
        FakeProber::default(),
    );

    let err = transcoder
        .transcode(&ffmpeg.input, &ffmpeg.output, OptionInput::default(), |_| {})
        .await
        .unwrap_err();
    assert_matches!(err, Error::InvalidOutput { .. });
}

#[tokio::test]
async fn missing_ffmpeg_is_reported() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new("");
    let config = SupervisorConfig {
        ffmpeg_path: PathBuf::from("/nonexistent/bin/ffmpeg"),
        inactivity_timeout: InactivityTimeout::default(),
    };
    let transcoder =
        Transcoder::with_parts(config, default_policy(), TokioLauncher, FakeProber::default());

    let err = transcoder
        .transcode(&ffmpeg.input, &ffmpeg.output, OptionInput::default(), |_| {})
        .await
        .unwrap_err();
    assert_matches!(err, Error::ToolNotFound { .. });
}

#[tokio::test]
async fn cancellation_kills_the_job() {
    init_tracing();
    let ffmpeg = FakeFfmpeg::new("sleep 30");
    let transcoder = ffmpeg.transcoder(
        InactivityTimeout::Disabled,
        default_policy(),
        FakeProber::default(),
    );
    let source = SourceMedia {
        path: ffmpeg.input.clone(),
        duration_secs: 6.0,
        width: 320,
        height: 180,
        rotation_degrees: None,
        calculated_aspect_ratio: Some(320.0 / 180.0),
    };

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = transcoder
        .run_job(
            &source,
            &ffmpeg.output,
            OptionInput::default(),
            |_| {},
            Some(&token),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_matches!(err, Error::Cancelled { .. });
}
