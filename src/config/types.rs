use encodeforge_av::{InactivityTimeout, DEFAULT_INACTIVITY_TIMEOUT};
use encodeforge_common::{AspectPolicy, Preserve, TranscodePolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,
}

/// Explicit tool locations. Unset tools are looked up on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Seconds of diagnostic silence before a run is killed, or `"disabled"`.
    #[serde(default)]
    pub inactivity_timeout: TimeoutSetting,

    /// Which side of a requested resolution to keep: width, height or none.
    #[serde(default)]
    pub preserve_aspect_ratio: Preserve,

    /// Allow the preserved side to exceed the source (default: true)
    #[serde(default = "default_enlarge")]
    pub enlarge: bool,

    /// Bake recorded rotation into the pixels and strip the rotation tag.
    #[serde(default)]
    pub autorotate: bool,
}

fn default_enlarge() -> bool {
    true
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: TimeoutSetting::default(),
            preserve_aspect_ratio: Preserve::default(),
            enlarge: default_enlarge(),
            autorotate: false,
        }
    }
}

impl TranscodeConfig {
    /// The geometry policy these settings describe.
    pub fn policy(&self) -> TranscodePolicy {
        TranscodePolicy {
            aspect: AspectPolicy {
                preserve: self.preserve_aspect_ratio,
                enlarge: self.enlarge,
            },
            autorotate: self.autorotate,
        }
    }

    pub fn inactivity_timeout(&self) -> InactivityTimeout {
        self.inactivity_timeout.into()
    }
}

/// Inactivity timeout as written in the config file.
///
/// Accepts a number of seconds, `"disabled"`, or `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "TimeoutRepr", into = "TimeoutRepr")]
pub enum TimeoutSetting {
    Disabled,
    Seconds(u64),
}

impl Default for TimeoutSetting {
    fn default() -> Self {
        Self::Seconds(DEFAULT_INACTIVITY_TIMEOUT.as_secs())
    }
}

impl From<TimeoutSetting> for InactivityTimeout {
    fn from(setting: TimeoutSetting) -> Self {
        match setting {
            TimeoutSetting::Disabled => InactivityTimeout::Disabled,
            TimeoutSetting::Seconds(secs) => InactivityTimeout::After(Duration::from_secs(secs)),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum TimeoutRepr {
    Seconds(u64),
    Enabled(bool),
    Keyword(String),
}

impl TryFrom<TimeoutRepr> for TimeoutSetting {
    type Error = String;

    fn try_from(repr: TimeoutRepr) -> Result<Self, Self::Error> {
        match repr {
            TimeoutRepr::Seconds(secs) => Ok(Self::Seconds(secs)),
            TimeoutRepr::Enabled(false) => Ok(Self::Disabled),
            TimeoutRepr::Enabled(true) => Ok(Self::default()),
            TimeoutRepr::Keyword(word) => match word.to_ascii_lowercase().as_str() {
                "disabled" | "off" | "none" => Ok(Self::Disabled),
                _ => Err(format!(
                    "invalid inactivity_timeout '{word}': expected seconds or \"disabled\""
                )),
            },
        }
    }
}

impl From<TimeoutSetting> for TimeoutRepr {
    fn from(setting: TimeoutSetting) -> Self {
        match setting {
            TimeoutSetting::Disabled => Self::Keyword("disabled".to_string()),
            TimeoutSetting::Seconds(secs) => Self::Seconds(secs),
        }
    }
}
