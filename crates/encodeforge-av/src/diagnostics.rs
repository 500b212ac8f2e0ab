//! Parsing ffmpeg's diagnostic (stderr) output.
//!
//! ffmpeg reports progress on stderr, rewriting a status line in place with
//! carriage returns:
//!
//! ```text
//! ffmpeg <  0.8: frame=  413 fps= 48 q=31.0 size=    2139kB time=16.52 bitrate=1060.6kbits/s
//! ffmpeg >= 0.8: frame= 4855 fps= 46 q=31.0 size=   45306kB time=00:02:42.28 bitrate=2287.0kbits/
//! ```
//!
//! [`DiagnosticLines`] splits the byte stream on `\n` *and* `\r`;
//! [`classify`] maps each decoded line to a [`DiagnosticEvent`].

use std::sync::OnceLock;

use bytes::BytesMut;
use regex::Regex;
use tokio_util::codec::Decoder;

/// Marker present on every progress line.
const PROGRESS_MARKER: &str = "time=";

/// Markers meaning ffmpeg cannot process the input at all.
const UNSUPPORTED_MARKERS: &[&str] = &["Unsupported codec"];

/// Upper bound for a single line; longer runs are flushed as-is.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// What a single diagnostic line means to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// Encoding reached `elapsed_secs` of the output timeline.
    Progress { elapsed_secs: f64 },
    /// ffmpeg cannot handle the source; the line is the message.
    UnsupportedInput(String),
    /// Anything else.
    Other,
}

fn clock_time() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time=(\d+):(\d+):(\d+\.\d+)").expect("valid regex"))
}

fn seconds_time() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time=(\d+\.\d+)").expect("valid regex"))
}

/// Classify one decoded line.
pub fn classify(line: &str) -> DiagnosticEvent {
    if UNSUPPORTED_MARKERS.iter().any(|m| line.contains(m)) {
        return DiagnosticEvent::UnsupportedInput(line.trim().to_string());
    }

    if line.contains(PROGRESS_MARKER) {
        return DiagnosticEvent::Progress {
            elapsed_secs: parse_elapsed(line),
        };
    }

    DiagnosticEvent::Other
}

/// Elapsed time on a progress line; `0.0` when neither format matches.
pub fn parse_elapsed(line: &str) -> f64 {
    if let Some(caps) = clock_time().captures(line) {
        let hours: f64 = caps[1].parse().unwrap_or(0.0);
        let minutes: f64 = caps[2].parse().unwrap_or(0.0);
        let seconds: f64 = caps[3].parse().unwrap_or(0.0);
        return hours * 3600.0 + minutes * 60.0 + seconds;
    }

    if let Some(caps) = seconds_time().captures(line) {
        return caps[1].parse().unwrap_or(0.0);
    }

    0.0
}

/// Fraction of `total_secs` covered by `elapsed_secs`, clamped to `[0, 1]`.
///
/// `None` when the total is unknown, zero, or not a finite positive number.
pub fn fraction_complete(elapsed_secs: f64, total_secs: Option<f64>) -> Option<f64> {
    let total = total_secs.filter(|t| t.is_finite() && *t > 0.0)?;
    Some((elapsed_secs / total).clamp(0.0, 1.0))
}

/// Decode a raw line as UTF-8, falling back to ISO-8859-1.
///
/// ffmpeg echoes container metadata verbatim, which is not always UTF-8.
/// Every byte is a valid ISO-8859-1 code point, so decoding never fails.
pub fn decode_line(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}

/// Splits a byte stream into lines terminated by `\n` or `\r`.
///
/// Empty lines (such as the gap in `\r\n`) are skipped.
#[derive(Debug, Default)]
pub struct DiagnosticLines {
    // Bytes of the buffer already scanned without finding a terminator.
    scanned: usize,
}

impl DiagnosticLines {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for DiagnosticLines {
    type Item = Vec<u8>;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let terminator = buf[self.scanned..]
                .iter()
                .position(|&b| b == b'\n' || b == b'\r')
                .map(|i| i + self.scanned);

            match terminator {
                Some(end) => {
                    let line = buf.split_to(end + 1);
                    self.scanned = 0;
                    if end == 0 {
                        continue;
                    }
                    return Ok(Some(line[..end].to_vec()));
                }
                None if buf.len() >= MAX_LINE_BYTES => {
                    self.scanned = 0;
                    return Ok(Some(buf.split_to(buf.len()).to_vec()));
                }
                None => {
                    self.scanned = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.scanned = 0;
        if buf.is_empty() {
            Ok(None)
        } else {
            Ok(Some(buf.split_to(buf.len()).to_vec()))
        }
    }
}
