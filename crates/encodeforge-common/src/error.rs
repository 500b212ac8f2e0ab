//! Error types used throughout encodeforge.
//!
//! Every failure of a transcode run surfaces as exactly one [`Error`] variant
//! carrying the command line and the diagnostic text ffmpeg produced, so a
//! caller can reconstruct what happened without re-running anything.

use std::path::PathBuf;

/// Common error type for encodeforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The encoding options were malformed or of an unsupported shape.
    ///
    /// Raised before any process is spawned.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// ffmpeg reported that it cannot process the source.
    #[error("unsupported input: {line}")]
    UnsupportedInput {
        /// Command line that was run.
        command: String,
        /// The diagnostic line that signalled the condition.
        line: String,
        /// Diagnostic output accumulated up to that line.
        output: String,
    },

    /// No diagnostic output arrived within the inactivity timeout.
    #[error("process hung. Full output: {output}")]
    Hung {
        /// Command line that was run.
        command: String,
        /// Diagnostic output accumulated before the process was killed.
        output: String,
    },

    /// The run was cancelled by the caller.
    #[error("transcode cancelled. Full output: {output}")]
    Cancelled {
        /// Command line that was run.
        command: String,
        /// Diagnostic output accumulated before the process was killed.
        output: String,
    },

    /// ffmpeg exited abnormally without a more specific cause.
    #[error("ffmpeg exited with {status}. Full output: {output}")]
    ProcessExit {
        /// Command line that was run.
        command: String,
        /// Human-readable exit status.
        status: String,
        /// Full diagnostic output.
        output: String,
    },

    /// ffmpeg finished but left no file at the expected path.
    #[error("failed encoding, no output file created at {}. Full output: {output}", path.display())]
    NoOutput {
        /// Expected artifact path.
        path: PathBuf,
        /// Command line that was run.
        command: String,
        /// Full diagnostic output.
        output: String,
    },

    /// The artifact exists but the probe does not consider it valid.
    #[error("failed encoding, encoded file {} is invalid: {reason}. Full output: {output}", path.display())]
    InvalidOutput {
        /// Artifact path.
        path: PathBuf,
        /// Why the probe rejected it.
        reason: String,
        /// Command line that was run.
        command: String,
        /// Full diagnostic output.
        output: String,
    },

    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool failed to execute.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new Configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// The diagnostic output attached to a run failure, if any.
    pub fn diagnostic_output(&self) -> Option<&str> {
        match self {
            Self::UnsupportedInput { output, .. }
            | Self::Hung { output, .. }
            | Self::Cancelled { output, .. }
            | Self::ProcessExit { output, .. }
            | Self::NoOutput { output, .. }
            | Self::InvalidOutput { output, .. } => Some(output),
            _ => None,
        }
    }

    /// The command line attached to a run failure, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::UnsupportedInput { command, .. }
            | Self::Hung { command, .. }
            | Self::Cancelled { command, .. }
            | Self::ProcessExit { command, .. }
            | Self::NoOutput { command, .. }
            | Self::InvalidOutput { command, .. } => Some(command),
            _ => None,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
