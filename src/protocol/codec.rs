//! Newline-delimited JSON frame codec.
//!
//! Wire format:
//! ```text
//! ┌──────────────────────────────┬────┐
//! │ JSON object (UTF-8, ≤ 512 B) │ \n │
//! └──────────────────────────────┴────┘
//! ```
//!
//! `\r` is accepted as a delimiter too, so `\r\n` from a serial monitor
//! decodes cleanly (the empty line between them is skipped).
//!
//! The codec never blocks and never panics on garbage.  A line that does not
//! parse is reported as a [`FrameError`] and dropped; a run of bytes longer
//! than [`MAX_LINE_LEN`] without a delimiter is dropped up to the next
//! delimiter.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use super::frames::{Command, Frame, SwitchState, ZoneReading};
use crate::error::FrameError;

/// Longest line accepted before the buffered bytes are discarded.
pub const MAX_LINE_LEN: usize = 512;

/// Outcome of one decode step: a frame, a discarded line, or nothing yet.
pub type Decoded = Option<Result<Frame, FrameError>>;

fn is_delimiter(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode a frame as a single `\n`-terminated line.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let value = match frame {
        Frame::Command(cmd) => {
            let mut map = Map::new();
            map.insert("actuator".into(), Value::String(cmd.actuator.clone()));
            map.insert("state".into(), Value::String(cmd.state.as_wire().into()));
            Value::Object(map)
        }
        Frame::Keepalive => {
            let mut map = Map::new();
            map.insert("keepalive".into(), Value::Bool(true));
            Value::Object(map)
        }
        Frame::Telemetry(zones) => {
            let mut map = Map::new();
            for (zone, reading) in zones {
                let mut entry = Map::new();
                match reading {
                    ZoneReading::Valid { temp, humidity, co2 } => {
                        entry.insert("temp".into(), wire_number(*temp));
                        entry.insert("humidity".into(), wire_number(*humidity));
                        entry.insert("co2".into(), Value::Number((*co2).into()));
                    }
                    ZoneReading::Fault(msg) => {
                        entry.insert("error".into(), Value::String(msg.clone()));
                    }
                }
                map.insert(zone.clone(), Value::Object(entry));
            }
            Value::Object(map)
        }
    };

    let mut out = value.to_string().into_bytes();
    out.push(b'\n');
    out
}

/// Render an `f32` through its shortest decimal form so `23.1` goes on the
/// wire as `23.1`, not `23.100000381469727`.  Non-finite values become `null`.
fn wire_number(x: f32) -> Value {
    format!("{x}")
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Extract at most one frame from the front of `buffer`.
///
/// Returns the decode outcome and the bytes that remain after the consumed
/// line.  With no delimiter present the whole buffer is returned untouched,
/// unless it already exceeds [`MAX_LINE_LEN`], in which case it is discarded
/// and reported as [`FrameError::Overflow`].
pub fn decode(buffer: &[u8]) -> (Decoded, &[u8]) {
    let mut rest = buffer;
    loop {
        let Some(pos) = rest.iter().position(|&b| is_delimiter(b)) else {
            if rest.len() > MAX_LINE_LEN {
                let discarded = rest.len();
                return (Some(Err(FrameError::Overflow { discarded })), &rest[rest.len()..]);
            }
            return (None, rest);
        };

        let line = &rest[..pos];
        rest = &rest[pos + 1..];

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if line.len() > MAX_LINE_LEN {
            return (Some(Err(FrameError::Overflow { discarded: line.len() })), rest);
        }
        return (Some(parse_line(line)), rest);
    }
}

/// Parse one delimiter-free line into a frame.
pub fn parse_line(line: &[u8]) -> Result<Frame, FrameError> {
    let text = core::str::from_utf8(line).map_err(|_| FrameError::Utf8)?;
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|e| FrameError::Malformed(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(FrameError::UnknownShape);
    };

    if map.len() == 1 && map.get("keepalive") == Some(&Value::Bool(true)) {
        return Ok(Frame::Keepalive);
    }
    // Telemetry values are objects or fault strings; a command is exactly
    // two string fields.
    if map.len() == 2 && map.get("actuator").is_some_and(Value::is_string) && map.contains_key("state") {
        return parse_command(&map);
    }
    parse_telemetry(map)
}

fn parse_command(map: &Map<String, Value>) -> Result<Frame, FrameError> {
    let actuator = map
        .get("actuator")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(FrameError::InvalidField("actuator"))?;
    let state = map
        .get("state")
        .and_then(Value::as_str)
        .and_then(SwitchState::from_wire)
        .ok_or(FrameError::InvalidField("state"))?;
    Ok(Frame::Command(Command::new(actuator, state)))
}

fn parse_telemetry(map: Map<String, Value>) -> Result<Frame, FrameError> {
    if map.is_empty() {
        return Err(FrameError::UnknownShape);
    }

    let mut zones = BTreeMap::new();
    for (zone, entry) in map {
        let Value::Object(fields) = entry else {
            return Err(FrameError::UnknownShape);
        };

        let reading = if let Some(err) = fields.get("error") {
            let msg = err.as_str().ok_or(FrameError::InvalidField("error"))?;
            ZoneReading::Fault(msg.to_string())
        } else {
            let temp = fields
                .get("temp")
                .and_then(Value::as_f64)
                .ok_or(FrameError::InvalidField("temp"))?;
            let humidity = fields
                .get("humidity")
                .and_then(Value::as_f64)
                .ok_or(FrameError::InvalidField("humidity"))?;
            let co2 = fields
                .get("co2")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or(FrameError::InvalidField("co2"))?;
            ZoneReading::Valid {
                temp: temp as f32,
                humidity: humidity as f32,
                co2,
            }
        };
        zones.insert(zone, reading);
    }
    Ok(Frame::Telemetry(zones))
}

// ---------------------------------------------------------------------------
// Streaming decoder
// ---------------------------------------------------------------------------

/// Streaming line decoder over a growing buffer.
///
/// Handles partial reads: a single transport read may carry half a line,
/// several lines, or the tail of an overlong line that is still being
/// discarded.
#[derive(Debug, Default)]
pub struct LineCodec {
    buf: Vec<u8>,
    /// Set after an overflow until the next delimiter is seen.
    discarding: bool,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn feed(&mut self, data: &[u8]) {
        let mut data = data;
        if self.discarding {
            match data.iter().position(|&b| is_delimiter(b)) {
                Some(pos) => {
                    self.discarding = false;
                    data = &data[pos + 1..];
                }
                None => return,
            }
        }
        self.buf.extend_from_slice(data);
    }

    /// Pop the next decoded item, if a complete line (or an overflow) is
    /// buffered.
    pub fn next_frame(&mut self) -> Decoded {
        let (decoded, rest) = decode(&self.buf);
        let consumed = self.buf.len() - rest.len();
        if matches!(decoded, Some(Err(FrameError::Overflow { .. }))) && rest.is_empty() {
            // The overlong line has no delimiter yet; drop its tail as it arrives.
            self.discarding = true;
        }
        self.buf.drain(..consumed);
        decoded
    }

    /// Drain every complete item currently buffered.
    pub fn drain(&mut self) -> Vec<Result<Frame, FrameError>> {
        let mut out = Vec::new();
        while let Some(item) = self.next_frame() {
            out.push(item);
        }
        out
    }

    /// Bytes held back waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop all buffered state (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}
