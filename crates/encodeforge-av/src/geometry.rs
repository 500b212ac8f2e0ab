//! Output geometry: target resolution and rotation correction.
//!
//! [`resolve`] composes two independent steps. [`orientation_directives`]
//! decides whether ffmpeg must physically rotate the frame, and
//! [`scale_preserving_aspect`] derives the non-preserved side of the requested
//! resolution from the source aspect ratio.
//!
//! Scaling is computed in the source's stored frame while the caller describes
//! the frame it wants to *see*. When a 90/270 degree correction is applied the
//! two disagree, so the preserved side is swapped for the computation and the
//! result is swapped back before returning.

use encodeforge_common::{AspectPolicy, Axis, Resolution, Rotation, SourceMedia, TranscodePolicy};

/// ffmpeg filter rotating the frame 90 degrees clockwise.
pub const TRANSPOSE_CLOCKWISE: &str = "transpose=1";
/// ffmpeg filter rotating the frame 180 degrees.
pub const FLIP_BOTH_AXES: &str = "hflip,vflip";
/// ffmpeg filter rotating the frame 90 degrees counter-clockwise.
pub const TRANSPOSE_COUNTER_CLOCKWISE: &str = "transpose=2";
/// Metadata assignment clearing the rotation tag on the first video stream.
pub const STRIP_ROTATION_METADATA: &str = "s:v:0 rotate=0";

/// Directives that bake a recorded rotation into the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationDirectives {
    /// Value for ffmpeg's `-vf`.
    pub video_filter: &'static str,
    /// Metadata assignment so rotation-aware players do not rotate twice.
    pub metadata: &'static str,
}

/// Result of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    /// Final resolution, `None` when none was requested.
    pub resolution: Option<Resolution>,
    /// Rotation correction, when autorotation applies.
    pub orientation: Option<OrientationDirectives>,
}

/// Compute the final resolution and rotation correction for `source`.
pub fn resolve(
    source: &SourceMedia,
    requested: Option<Resolution>,
    policy: &TranscodePolicy,
) -> Geometry {
    let rotation = source.rotation();
    let orientation = orientation_directives(rotation, policy.autorotate);
    let flips_orientation = policy.autorotate && rotation.changes_orientation();

    let resolution = requested.map(|requested| {
        scale_preserving_aspect(source, requested, &policy.aspect, flips_orientation)
    });

    tracing::debug!(
        "geometry for {}: requested={:?} resolved={:?} rotation={:?} autorotate={}",
        source.path.display(),
        requested,
        resolution,
        rotation,
        policy.autorotate,
    );

    Geometry {
        resolution,
        orientation,
    }
}

/// Rotation correction for `rotation`, if `autorotate` is on and the rotation
/// is one ffmpeg can undo.
pub fn orientation_directives(
    rotation: Rotation,
    autorotate: bool,
) -> Option<OrientationDirectives> {
    if !autorotate {
        return None;
    }

    let video_filter = match rotation {
        Rotation::Clockwise => TRANSPOSE_CLOCKWISE,
        Rotation::UpsideDown => FLIP_BOTH_AXES,
        Rotation::CounterClockwise => TRANSPOSE_COUNTER_CLOCKWISE,
        Rotation::None | Rotation::Other(_) => return None,
    };

    Some(OrientationDirectives {
        video_filter,
        metadata: STRIP_ROTATION_METADATA,
    })
}

/// Apply the aspect policy to `requested`.
///
/// Returns `requested` untouched when no side is preserved or the source
/// aspect ratio is unknown. A ratio that is not finite and positive counts as
/// unknown. `flips_orientation` must be true when the frame will be rotated by
/// 90 or 270 degrees after scaling.
pub fn scale_preserving_aspect(
    source: &SourceMedia,
    requested: Resolution,
    aspect: &AspectPolicy,
    flips_orientation: bool,
) -> Resolution {
    let ratio = source
        .calculated_aspect_ratio
        .filter(|r| r.is_finite() && *r > 0.0);
    let (Some(axis), Some(ratio)) = (aspect.preserve.axis(), ratio) else {
        return requested;
    };

    let mut target = requested.get(axis);
    let axis = if flips_orientation { axis.inverted() } else { axis };

    if !aspect.enlarge {
        target = target.min(source.resolution().get(axis));
    }

    let scaled = match axis {
        Axis::Width => Resolution::new(target, evenize(target as f64 / ratio).max(2)),
        Axis::Height => Resolution::new(evenize(target as f64 * ratio).max(2), target),
    };

    if flips_orientation {
        scaled.transposed()
    } else {
        scaled
    }
}

/// Largest even `u32`; [`evenize`] saturates here.
const MAX_EVEN: u32 = u32::MAX - 1;

/// Round to an even integer: the ceiling if even, else the floor, bumped by
/// one when the value was already an odd integer.
///
/// Negative and NaN inputs give 0. Results beyond `u32` saturate at the
/// largest even `u32`.
pub fn evenize(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }

    let ceil = value.ceil();
    let mut n = if ceil % 2.0 == 0.0 { ceil } else { value.floor() };
    if n % 2.0 != 0.0 {
        n += 1.0;
    }

    if n >= f64::from(MAX_EVEN) {
        return MAX_EVEN;
    }
    u32::try_from(n as u64).unwrap_or(MAX_EVEN)
}
