//! FFprobe-based media probing.

use super::types::*;
use super::Prober;
use crate::command::ToolCommand;
use async_trait::async_trait;
use encodeforge_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Probing a single file should never take long.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    format_name: String,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    display_aspect_ratio: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    side_data_type: Option<String>,
    rotation: Option<f64>,
}

/// [`Prober`] backed by the `ffprobe` command-line tool.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    path: PathBuf,
}

impl FfprobeProber {
    /// Use the ffprobe executable at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The ffprobe executable this prober runs.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let mut cmd = ToolCommand::new(self.path.clone());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .timeout(PROBE_TIMEOUT);

        let output = cmd.execute().await?;
        parse_ffprobe_json(path, &output.stdout)
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::parse("ffprobe", format!("invalid JSON: {e}")))?;

    let format = output.format;
    let mut info = MediaInfo {
        path: path.to_path_buf(),
        container: format
            .as_ref()
            .map(|f| f.format_name.clone())
            .unwrap_or_default(),
        duration: format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|s| s.parse().ok()),
        bit_rate: format
            .as_ref()
            .and_then(|f| f.bit_rate.as_deref())
            .and_then(|s| s.parse().ok()),
        video: None,
        audio: Vec::new(),
    };

    for stream in output.streams {
        match stream.codec_type.as_deref() {
            Some("video") if info.video.is_none() => {
                let rotation = stream_rotation(&stream);
                info.video = Some(VideoStream {
                    codec: stream.codec_name.unwrap_or_default(),
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    frame_rate: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
                    display_aspect_ratio: stream.display_aspect_ratio,
                    rotation,
                });
            }
            Some("audio") => {
                info.audio.push(AudioStream {
                    codec: stream.codec_name.unwrap_or_default(),
                    channels: stream.channels,
                    sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
                    bit_rate: stream.bit_rate.and_then(|s| s.parse().ok()),
                });
            }
            _ => {}
        }
    }

    Ok(info)
}

/// Clockwise rotation from the legacy `rotate` tag or the display matrix.
///
/// The display matrix reports counter-clockwise degrees, so it is negated.
fn stream_rotation(stream: &FfprobeStream) -> Option<i32> {
    if let Some(tag) = stream.tags.rotate.as_deref() {
        if let Ok(degrees) = tag.trim().parse::<i32>() {
            return Some(degrees.rem_euclid(360));
        }
        tracing::warn!("ignoring unparseable rotate tag {tag:?}");
    }

    stream
        .side_data_list
        .iter()
        .filter(|sd| sd.side_data_type.as_deref() == Some("Display Matrix"))
        .find_map(|sd| sd.rotation)
        .map(|r| (-(r.round() as i32)).rem_euclid(360))
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den != 0.0).then(|| num / den);
    }
    rate_str.parse().ok()
}
