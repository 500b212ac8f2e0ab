//! Encoding options and their merge with the resolved geometry.
//!
//! Callers hand over either a structured [`OptionSet`] or a pre-formatted raw
//! argument string ([`OptionInput`]). [`assemble`] merges the structured form
//! with a [`Geometry`]; the raw form is passed through untouched, so rotation
//! and aspect handling are only available to structured callers.
//!
//! Raw strings and the `custom` option are split with shell quoting rules, so
//! `-metadata title="My Movie"` reaches ffmpeg as two arguments. No shell is
//! ever run.

use std::fmt;

use encodeforge_common::{Error, Resolution, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::Geometry;

/// Option key carrying the output resolution.
pub const RESOLUTION: &str = "resolution";
/// Option key carrying the video filter chain.
pub const VIDEO_FILTER: &str = "video_filter";
/// Option key carrying a stream metadata assignment.
pub const METADATA: &str = "metadata";
/// Option key limiting the encoded duration, in seconds.
pub const DURATION: &str = "duration";
/// Option key holding free-form extra arguments.
pub const CUSTOM: &str = "custom";

/// A single option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    Int(i64),
    Resolution(Resolution),
}

impl Serialize for OptionValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Resolution(r) => serializer.collect_str(r),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Resolution(r) => write!(f, "{r}"),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for OptionValue {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<u32> for OptionValue {
    fn from(n: u32) -> Self {
        Self::Int(n.into())
    }
}

impl From<Resolution> for OptionValue {
    fn from(r: Resolution) -> Self {
        Self::Resolution(r)
    }
}

/// Canonical set of encoding options, kept in insertion order.
///
/// Flags render in the order the caller supplied them. Replacing an existing
/// key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: Vec<(String, OptionValue)>,
}

impl Serialize for OptionSet {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl OptionSet {
    /// An empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace an option.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up an option.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Iterate over the options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no option is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The requested resolution, if any.
    pub fn resolution(&self) -> Option<Resolution> {
        match self.get(RESOLUTION)? {
            OptionValue::Resolution(r) => Some(*r),
            OptionValue::Text(s) => s.parse().ok(),
            OptionValue::Int(_) => None,
        }
    }

    /// The `duration` option in seconds, if it parses as a number.
    pub fn duration_secs(&self) -> Option<f64> {
        match self.get(DURATION)? {
            OptionValue::Int(n) => Some(*n as f64),
            OptionValue::Text(s) => s.trim().parse().ok(),
            OptionValue::Resolution(_) => None,
        }
    }

    /// Build from a JSON-like mapping.
    ///
    /// Strings, integers and floats are accepted; a `resolution` string must
    /// read `WxH` and a `custom` string must have balanced quotes. Anything
    /// else is a configuration error.
    pub fn from_map(map: &serde_json::Map<String, Value>) -> Result<Self> {
        let mut set = Self::new();
        for (key, value) in map {
            let value = match value {
                Value::String(s) if key == RESOLUTION => OptionValue::Resolution(
                    s.parse()
                        .map_err(|e| Error::configuration(format!("option '{key}': {e}")))?,
                ),
                Value::String(s) if key == CUSTOM => {
                    split_arguments(s)?;
                    OptionValue::Text(s.clone())
                }
                Value::String(s) => OptionValue::Text(s.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => OptionValue::Int(i),
                    None => OptionValue::Text(n.to_string()),
                },
                other => {
                    return Err(Error::configuration(format!(
                        "option '{key}' has unsupported value {other}; expected a string or number"
                    )))
                }
            };
            set.insert(key.clone(), value);
        }
        Ok(set)
    }

    /// Render as ffmpeg output arguments.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.entries {
            match key.as_str() {
                CUSTOM => {
                    let text = value.to_string();
                    match shell_words::split(&text) {
                        Ok(words) => args.extend(words),
                        Err(_) => args.extend(text.split_whitespace().map(String::from)),
                    }
                }
                METADATA => {
                    let text = value.to_string();
                    match text.split_once(' ') {
                        Some((specifier, tag)) => {
                            args.push(format!("-metadata:{specifier}"));
                            args.push(tag.to_string());
                        }
                        None => {
                            args.push("-metadata".to_string());
                            args.push(text);
                        }
                    }
                }
                _ => {
                    let (flag, kilo) = flag_for(key);
                    args.push(flag);
                    match value {
                        OptionValue::Int(n) if kilo => args.push(format!("{n}k")),
                        other => args.push(other.to_string()),
                    }
                }
            }
        }
        args
    }
}

/// ffmpeg flag for an option key, and whether integer values are kbit/s.
fn flag_for(key: &str) -> (String, bool) {
    let (flag, kilo) = match key {
        "video_codec" => ("-vcodec", false),
        "frame_rate" => ("-r", false),
        RESOLUTION => ("-s", false),
        "video_bitrate" => ("-b:v", true),
        "video_max_bitrate" => ("-maxrate", true),
        "video_min_bitrate" => ("-minrate", true),
        "buffer_size" => ("-bufsize", true),
        "audio_codec" => ("-acodec", false),
        "audio_bitrate" => ("-b:a", true),
        "audio_sample_rate" => ("-ar", false),
        "audio_channels" => ("-ac", false),
        "keyframe_interval" => ("-g", false),
        "seek_time" => ("-ss", false),
        DURATION => ("-t", false),
        "aspect" => ("-aspect", false),
        "threads" => ("-threads", false),
        VIDEO_FILTER => ("-vf", false),
        other => return (format!("-{other}"), false),
    };
    (flag.to_string(), kilo)
}

/// Split a raw argument string with shell quoting rules.
fn split_arguments(raw: &str) -> Result<Vec<String>> {
    shell_words::split(raw)
        .map_err(|e| Error::configuration(format!("cannot split raw options {raw:?}: {e}")))
}

/// Encoding options as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub enum OptionInput {
    /// Pre-formatted arguments, passed through verbatim once split.
    Raw(Vec<String>),
    /// Structured options, merged with the resolved geometry.
    Structured(OptionSet),
}

impl Default for OptionInput {
    fn default() -> Self {
        Self::Structured(OptionSet::new())
    }
}

impl Serialize for OptionInput {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Raw(args) => serializer.serialize_str(&shell_words::join(args)),
            Self::Structured(set) => set.serialize(serializer),
        }
    }
}

impl TryFrom<Value> for OptionInput {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Self::raw(&s),
            Value::Object(map) => Ok(Self::Structured(OptionSet::from_map(&map)?)),
            other => Err(Error::configuration(format!(
                "Unknown encoding options format '{}', should be either a string or a mapping",
                json_kind(&other)
            ))),
        }
    }
}

impl From<OptionSet> for OptionInput {
    fn from(set: OptionSet) -> Self {
        Self::Structured(set)
    }
}

impl TryFrom<&str> for OptionInput {
    type Error = Error;

    fn try_from(raw: &str) -> Result<Self> {
        Self::raw(raw)
    }
}

impl OptionInput {
    /// Raw input from a pre-formatted argument string.
    ///
    /// Quotes and backslashes group words as a POSIX shell would. Unbalanced
    /// quotes are a configuration error.
    pub fn raw(raw: &str) -> Result<Self> {
        split_arguments(raw).map(Self::Raw)
    }

    /// The requested resolution, available only for structured input.
    pub fn requested_resolution(&self) -> Option<Resolution> {
        match self {
            Self::Raw(_) => None,
            Self::Structured(set) => set.resolution(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

/// Options ready to hand to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledOptions {
    /// Raw caller arguments.
    Raw(Vec<String>),
    /// Structured options with geometry applied.
    Structured(OptionSet),
}

impl AssembledOptions {
    /// Render as ffmpeg output arguments.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Raw(args) => args.clone(),
            Self::Structured(set) => set.to_args(),
        }
    }

    /// The structured options, if any.
    pub fn as_set(&self) -> Option<&OptionSet> {
        match self {
            Self::Raw(_) => None,
            Self::Structured(set) => Some(set),
        }
    }
}

/// Merge `input` with `geometry`; geometry wins over caller-supplied keys.
pub fn assemble(input: OptionInput, geometry: &Geometry) -> AssembledOptions {
    match input {
        OptionInput::Raw(args) => AssembledOptions::Raw(args),
        OptionInput::Structured(mut set) => {
            if let Some(resolution) = geometry.resolution {
                set.insert(RESOLUTION, resolution);
            }
            if let Some(orientation) = geometry.orientation {
                set.insert(VIDEO_FILTER, orientation.video_filter);
                set.insert(METADATA, orientation.metadata);
            }
            AssembledOptions::Structured(set)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{OrientationDirectives, STRIP_ROTATION_METADATA, TRANSPOSE_CLOCKWISE};
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn accepts_mapping() {
        let input: OptionInput = serde_json::from_value(json!({
            "video_codec": "libx264",
            "resolution": "320x240",
            "video_bitrate": 300,
            "frame_rate": 29.97,
        }))
        .unwrap();
        let set = assert_matches!(input, OptionInput::Structured(set) => set);
        assert_eq!(set.resolution(), Some(Resolution::new(320, 240)));
        assert_eq!(set.get("video_bitrate"), Some(&OptionValue::Int(300)));
        assert_eq!(set.get("frame_rate"), Some(&OptionValue::Text("29.97".into())));
    }

    #[test]
    fn accepts_raw_string() {
        let input: OptionInput = serde_json::from_value(json!("-vcodec libx264")).unwrap();
        assert_eq!(
            input,
            OptionInput::Raw(vec!["-vcodec".into(), "libx264".into()])
        );
        assert_eq!(input.requested_resolution(), None);
    }

    #[test]
    fn raw_string_honours_quotes() {
        let input =
            OptionInput::raw(r#"-metadata title="My Movie" -vf 'scale=320:240, hflip'"#).unwrap();
        assert_eq!(
            assemble(input, &Geometry::default()).to_args(),
            vec!["-metadata", "title=My Movie", "-vf", "scale=320:240, hflip"]
        );
    }

    #[test]
    fn raw_string_with_unbalanced_quote_is_rejected() {
        let err = OptionInput::raw(r#"-metadata title="My Movie"#).unwrap_err();
        assert_matches!(err, Error::Configuration(ref msg) if msg.contains("raw options"));
        assert!(OptionInput::try_from(json!("-vf 'hflip")).is_err());
    }

    #[test]
    fn raw_string_serializes_back_to_shell_words() {
        let input = OptionInput::raw(r#"-metadata "title=My Movie""#).unwrap();
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(OptionInput::try_from(value).unwrap(), input);
    }

    #[test]
    fn rejects_other_shapes() {
        let err = OptionInput::try_from(json!(["array?"])).unwrap_err();
        assert_matches!(err, Error::Configuration(ref msg) if msg.contains("Unknown encoding options format 'array'"));
        assert!(OptionInput::try_from(json!(42)).is_err());
        assert!(OptionInput::try_from(json!({"custom": ["a"]})).is_err());
        assert!(OptionInput::try_from(json!({"resolution": "wide"})).is_err());
        assert!(OptionInput::try_from(json!({"custom": "-metadata 'title"})).is_err());
    }

    #[test]
    fn geometry_overrides_caller_resolution() {
        let set = OptionSet::new()
            .with(RESOLUTION, Resolution::new(320, 240))
            .with(VIDEO_FILTER, "yadif");
        let geometry = Geometry {
            resolution: Some(Resolution::new(320, 180)),
            orientation: Some(OrientationDirectives {
                video_filter: TRANSPOSE_CLOCKWISE,
                metadata: STRIP_ROTATION_METADATA,
            }),
        };
        let assembled = assemble(set.into(), &geometry);
        let set = assembled.as_set().unwrap();
        assert_eq!(set.resolution(), Some(Resolution::new(320, 180)));
        assert_eq!(set.get(VIDEO_FILTER), Some(&OptionValue::from(TRANSPOSE_CLOCKWISE)));
        assert_eq!(set.get(METADATA), Some(&OptionValue::from(STRIP_ROTATION_METADATA)));
    }

    #[test]
    fn raw_input_skips_geometry() {
        let geometry = Geometry {
            resolution: Some(Resolution::new(320, 180)),
            orientation: None,
        };
        let assembled = assemble(OptionInput::raw("-s 300x200 -ac 2").unwrap(), &geometry);
        assert!(assembled.as_set().is_none());
        assert_eq!(assembled.to_args(), vec!["-s", "300x200", "-ac", "2"]);
    }

    #[test]
    fn renders_flags() {
        let set = OptionSet::new()
            .with("video_codec", "libx264")
            .with("video_bitrate", 300)
            .with("audio_channels", 1)
            .with(RESOLUTION, Resolution::new(320, 240))
            .with(METADATA, STRIP_ROTATION_METADATA)
            .with(CUSTOM, "-flags +mv4 -g 300");
        assert_eq!(
            set.to_args(),
            vec![
                "-vcodec", "libx264", "-b:v", "300k", "-ac", "1", "-s", "320x240",
                "-metadata:s:v:0", "rotate=0", "-flags", "+mv4", "-g", "300",
            ]
        );
    }

    #[test]
    fn replacing_a_key_keeps_its_position() {
        let mut set = OptionSet::new()
            .with("video_codec", "libx264")
            .with(RESOLUTION, Resolution::new(320, 240))
            .with("audio_codec", "aac");
        set.insert(RESOLUTION, Resolution::new(320, 180));
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.to_args(),
            vec!["-vcodec", "libx264", "-s", "320x180", "-acodec", "aac"]
        );
    }

    #[test]
    fn mapping_order_is_kept() {
        let input: OptionInput = serde_json::from_str(
            r#"{"video_codec": "libx264", "custom": "-flags +mv4", "audio_codec": "aac"}"#,
        )
        .unwrap();
        let set = assert_matches!(input, OptionInput::Structured(set) => set);
        assert_eq!(
            set.to_args(),
            vec!["-vcodec", "libx264", "-flags", "+mv4", "-acodec", "aac"]
        );
    }

    #[test]
    fn custom_option_honours_quotes() {
        let set = OptionSet::new().with(CUSTOM, r#"-metadata "comment=two words""#);
        assert_eq!(set.to_args(), vec!["-metadata", "comment=two words"]);
    }

    #[test]
    fn unknown_key_renders_as_flag() {
        let set = OptionSet::new().with("pix_fmt", "yuv420p");
        assert_eq!(set.to_args(), vec!["-pix_fmt", "yuv420p"]);
    }

    #[test]
    fn duration_option() {
        assert_eq!(OptionSet::new().with(DURATION, 2).duration_secs(), Some(2.0));
        assert_eq!(OptionSet::new().with(DURATION, "1.5").duration_secs(), Some(1.5));
        assert_eq!(OptionSet::new().duration_secs(), None);
    }
}
