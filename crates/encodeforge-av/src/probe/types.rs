//! Media information types.

use encodeforge_common::SourceMedia;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Information about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path to the media file.
    pub path: PathBuf,
    /// Container format names as reported by the prober (e.g., "mov,mp4,m4a").
    pub container: String,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Overall bit rate in bits per second.
    pub bit_rate: Option<u64>,
    /// The first video stream, if any.
    pub video: Option<VideoStream>,
    /// Audio streams in file order.
    pub audio: Vec<AudioStream>,
}

/// Information about a video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    /// Video codec (e.g., "h264").
    pub codec: String,
    /// Stored frame width in pixels.
    pub width: u32,
    /// Stored frame height in pixels.
    pub height: u32,
    /// Frame rate in FPS.
    pub frame_rate: Option<f64>,
    /// Display aspect ratio as `W:H`.
    pub display_aspect_ratio: Option<String>,
    /// Clockwise rotation in degrees, normalised to `0..360`.
    pub rotation: Option<i32>,
}

/// Information about an audio stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    /// Audio codec (e.g., "aac").
    pub codec: String,
    /// Number of channels.
    pub channels: Option<u32>,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Bit rate in bits per second.
    pub bit_rate: Option<u64>,
}

impl MediaInfo {
    /// A file is usable when it has at least one video or audio stream.
    pub fn is_valid(&self) -> bool {
        self.video.is_some() || !self.audio.is_empty()
    }

    /// Display width divided by display height.
    ///
    /// Prefers the display aspect ratio and falls back to the stored frame.
    /// `None` without a video stream, or when the result is zero or not
    /// finite.
    pub fn calculated_aspect_ratio(&self) -> Option<f64> {
        let video = self.video.as_ref()?;

        let from_dar = video
            .display_aspect_ratio
            .as_deref()
            .and_then(parse_ratio)
            .filter(|r| usable(*r));

        from_dar.or_else(|| {
            let ratio = video.width as f64 / video.height as f64;
            usable(ratio).then_some(ratio)
        })
    }

    /// The read-only view consumed by geometry resolution and progress.
    pub fn to_source_media(&self) -> SourceMedia {
        let (width, height, rotation) = self
            .video
            .as_ref()
            .map(|v| (v.width, v.height, v.rotation))
            .unwrap_or((0, 0, None));

        SourceMedia {
            path: self.path.clone(),
            duration_secs: self.duration.unwrap_or(0.0),
            width,
            height,
            rotation_degrees: rotation,
            calculated_aspect_ratio: self.calculated_aspect_ratio(),
        }
    }
}

fn parse_ratio(s: &str) -> Option<f64> {
    let (w, h) = s.split_once(':')?;
    let w: f64 = w.trim().parse().ok()?;
    let h: f64 = h.trim().parse().ok()?;
    Some(w / h)
}

fn usable(ratio: f64) -> bool {
    ratio.is_finite() && ratio > 0.0
}
