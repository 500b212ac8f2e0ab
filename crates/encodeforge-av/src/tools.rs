//! External tool detection.

use encodeforge_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of its version banner, if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check whether `program` runs and report its version banner.
///
/// ffmpeg and ffprobe print their version with `-version`.
///
/// # Example
///
/// ```no_run
/// use encodeforge_av::check_tool;
///
/// let info = check_tool("ffmpeg");
/// if info.available {
///     println!("ffmpeg version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(program: impl AsRef<Path>) -> ToolInfo {
    let program = program.as_ref();
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string());

    match Command::new(program).arg("-version").output() {
        Ok(output) if output.status.success() => ToolInfo {
            name,
            available: true,
            version: String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string()),
            path: which::which(program).ok(),
        },
        _ => ToolInfo {
            name,
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check ffmpeg and ffprobe, honouring configured paths.
pub fn check_tools(ffmpeg: &Path, ffprobe: &Path) -> Vec<ToolInfo> {
    vec![check_tool(ffmpeg), check_tool(ffprobe)]
}

/// Resolve the executable for `name`, preferring a configured path over
/// `PATH` lookup.
///
/// A configured path that does not exist is ignored with a warning.
///
/// # Errors
///
/// [`Error::ToolNotFound`] when neither yields an executable.
pub fn resolve_tool(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            "configured {name} path {} does not exist, searching PATH",
            path.display()
        );
    }

    which::which(name).map_err(|_| Error::tool_not_found(name))
}
