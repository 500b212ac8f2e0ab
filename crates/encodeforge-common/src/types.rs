//! Core type definitions for source media and output geometry.
//!
//! These are plain values: the geometry resolver reads them and produces new
//! ones, nothing here is mutated after construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::Error;

/// A frame size in pixels, rendered as `WxH` for ffmpeg's `-s` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Create a resolution from width and height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The component lying on `axis`.
    pub fn get(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Width => self.width,
            Axis::Height => self.height,
        }
    }

    /// Swap width and height.
    pub fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once('x')
            .ok_or_else(|| Error::invalid_input(format!("resolution '{s}' is not WxH")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| Error::invalid_input(format!("resolution '{s}' is not WxH")))
        };
        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

/// One side of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Width,
    Height,
}

impl Axis {
    /// The other side.
    pub fn inverted(self) -> Self {
        match self {
            Self::Width => Self::Height,
            Self::Height => Self::Width,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width => write!(f, "width"),
            Self::Height => write!(f, "height"),
        }
    }
}

/// Which side of the requested resolution, if any, keeps its value while the
/// other is derived from the source aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preserve {
    /// Use the requested resolution verbatim.
    #[default]
    None,
    /// Keep the requested width.
    Width,
    /// Keep the requested height.
    Height,
}

impl Preserve {
    /// The preserved axis, or `None` when aspect preservation is off.
    pub fn axis(self) -> Option<Axis> {
        match self {
            Self::None => None,
            Self::Width => Some(Axis::Width),
            Self::Height => Some(Axis::Height),
        }
    }
}

/// Aspect-ratio preservation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectPolicy {
    /// Side to preserve.
    #[serde(default)]
    pub preserve: Preserve,
    /// Whether the preserved side may exceed the source's size.
    #[serde(default = "default_enlarge")]
    pub enlarge: bool,
}

fn default_enlarge() -> bool {
    true
}

impl Default for AspectPolicy {
    fn default() -> Self {
        Self {
            preserve: Preserve::None,
            enlarge: true,
        }
    }
}

impl AspectPolicy {
    /// Preserve `axis`, allowing enlargement.
    pub fn preserving(axis: Axis) -> Self {
        let preserve = match axis {
            Axis::Width => Preserve::Width,
            Axis::Height => Preserve::Height,
        };
        Self {
            preserve,
            enlarge: true,
        }
    }

    /// Same policy with enlargement disabled.
    pub fn without_enlarge(self) -> Self {
        Self {
            enlarge: false,
            ..self
        }
    }
}

/// Everything the geometry resolver needs besides the source and the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodePolicy {
    /// Aspect-ratio preservation.
    #[serde(default)]
    pub aspect: AspectPolicy,
    /// Correct embedded rotation and strip the rotation tag.
    #[serde(default)]
    pub autorotate: bool,
}

/// Rotation recorded in the source's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// No rotation, or none recorded.
    None,
    /// 90 degrees clockwise.
    Clockwise,
    /// 180 degrees.
    UpsideDown,
    /// 270 degrees clockwise (90 counter-clockwise).
    CounterClockwise,
    /// Any other recorded value; never corrected.
    Other(i32),
}

impl Rotation {
    /// Classify a recorded rotation in degrees.
    pub fn from_degrees(degrees: Option<i32>) -> Self {
        match degrees {
            None | Some(0) => Self::None,
            Some(90) => Self::Clockwise,
            Some(180) => Self::UpsideDown,
            Some(270) => Self::CounterClockwise,
            Some(other) => Self::Other(other),
        }
    }

    /// True for rotations that swap the frame's width and height.
    pub fn changes_orientation(self) -> bool {
        matches!(self, Self::Clockwise | Self::CounterClockwise)
    }
}

/// Read-only view of the input media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMedia {
    /// Path to the input file.
    pub path: PathBuf,
    /// Duration in seconds, `0.0` when unknown.
    pub duration_secs: f64,
    /// Stored frame width.
    pub width: u32,
    /// Stored frame height.
    pub height: u32,
    /// Rotation tag in degrees, if any.
    pub rotation_degrees: Option<i32>,
    /// Display width divided by display height, absent when indeterminable.
    pub calculated_aspect_ratio: Option<f64>,
}

impl SourceMedia {
    /// Frame size in the stored (pre-rotation) frame.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// The classified rotation.
    pub fn rotation(&self) -> Rotation {
        Rotation::from_degrees(self.rotation_degrees)
    }
}
