//! Media file probing.
//!
//! The supervisor never inspects media itself; it asks a [`Prober`]. The
//! shipped backend shells out to ffprobe, and tests substitute their own.

mod ffprobe;
mod types;

pub use ffprobe::{parse_ffprobe_json, FfprobeProber};
pub use types::*;

use async_trait::async_trait;
use encodeforge_common::Result;
use std::path::Path;

/// Extracts [`MediaInfo`] from a file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Probe the file at `path`.
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

