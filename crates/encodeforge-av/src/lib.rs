//! # encodeforge-av
//!
//! The ffmpeg-facing half of encodeforge.
//!
//! This crate provides:
//! - Geometry resolution: output size under an aspect policy, with rotation
//!   correction ([`geometry`])
//! - Option assembly: merging caller options with the resolved geometry and
//!   rendering ffmpeg arguments ([`options`])
//! - Supervised execution: progress reporting, inactivity timeout and
//!   process-group termination ([`supervisor`])
//! - Artifact validation and ffprobe-based probing ([`validate`], [`probe`])
//!
//! ## Example
//!
//! ```no_run
//! use encodeforge_av::{assemble, geometry, OptionInput, OptionSet, Supervisor, SupervisorConfig, ToolCommand};
//! use encodeforge_common::{AspectPolicy, Axis, Resolution, SourceMedia, TranscodePolicy};
//! use std::path::Path;
//!
//! # async fn example(source: SourceMedia) -> encodeforge_common::Result<()> {
//! let policy = TranscodePolicy {
//!     aspect: AspectPolicy::preserving(Axis::Width),
//!     autorotate: true,
//! };
//! let input = OptionInput::from(OptionSet::new().with("resolution", Resolution::new(640, 480)));
//! let geometry = geometry::resolve(&source, input.requested_resolution(), &policy);
//! let options = assemble(input, &geometry);
//!
//! let supervisor = Supervisor::new(SupervisorConfig::default());
//! let output = Path::new("/tmp/out.mp4");
//! let command = ToolCommand::transcode(&supervisor.config().ffmpeg_path, &source.path, &options, output);
//! let run = supervisor
//!     .run(&command, output, Some(source.duration_secs), |p| println!("{:.0}%", p * 100.0), None)
//!     .await?;
//! let transcoded = run.into_result()?;
//! println!("wrote {}", transcoded.path.display());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod diagnostics;
pub mod geometry;
pub mod options;
pub mod probe;
pub mod process;
pub mod supervisor;
pub mod tools;
pub mod validate;

// Re-exports
pub use command::{ToolCommand, ToolOutput};
pub use geometry::{Geometry, OrientationDirectives};
pub use options::{assemble, AssembledOptions, OptionInput, OptionSet, OptionValue};
pub use probe::{FfprobeProber, MediaInfo, Prober};
pub use process::{ExitInfo, Launcher, RunningProcess, TokioLauncher};
pub use supervisor::{
    InactivityTimeout, RunOutcome, SupervisedRun, Supervisor, SupervisorConfig, Transcoded,
    DEFAULT_FFMPEG, DEFAULT_INACTIVITY_TIMEOUT,
};
pub use tools::{check_tool, check_tools, resolve_tool, ToolInfo};
pub use validate::OutcomeValidator;
