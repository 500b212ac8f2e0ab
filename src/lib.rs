//! Encodeforge - supervised ffmpeg transcoding
//!
//! Wires the `encodeforge-av` building blocks to a TOML configuration and
//! exposes [`Transcoder`], which handles one job end to end.

pub mod config;
pub mod transcoder;

pub use encodeforge_av as av;
pub use encodeforge_common as common;

pub use encodeforge_av::{OptionInput, OptionSet, Transcoded};
pub use encodeforge_common::{Error, Result};
pub use transcoder::Transcoder;
