//! Newline delimited JSON framing for LND's streaming endpoints.
//!
//! The REST proxy writes one JSON document per line, usually wrapped in a
//! `{"result": ...}` envelope. Chunks from the transport don't line up with
//! frames, so partial lines are buffered until their newline arrives.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Longest line kept in the buffer while waiting for its newline.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    // set while dropping the rest of an oversized line
    discarding: bool,
    dropped: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transport chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let (line, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                continue;
            }
            self.buf.extend_from_slice(line);
            if let Some(frame) = self.take_frame() {
                frames.push(frame);
            }
        }

        if !self.discarding {
            self.buf.extend_from_slice(rest);
            if self.buf.len() > MAX_FRAME_LEN {
                self.buf.clear();
                self.discarding = true;
                self.dropped += 1;
            }
        }
        frames
    }

    /// Flushes the last line of a body that didn't end with a newline.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.discarding {
            self.discarding = false;
            return None;
        }
        self.take_frame()
    }

    /// Number of oversized lines thrown away so far.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    fn take_frame(&mut self) -> Option<Vec<u8>> {
        let frame = std::mem::take(&mut self.buf);
        let trimmed = frame.trim_ascii();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == frame.len() {
            Some(frame)
        } else {
            Some(trimmed.to_vec())
        }
    }
}

/// What a single line on the stream turned out to be.
#[derive(Debug, PartialEq)]
pub enum Frame<T> {
    Item(T),
    /// The node reported a stream level error.
    Error(String),
    /// Not valid JSON or not the expected shape.
    Malformed(String),
}

/// Parses one line, unwrapping the `result` envelope when present.
pub fn decode_frame<T: DeserializeOwned>(line: &[u8]) -> Frame<T> {
    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(err) => return Frame::Malformed(err.to_string()),
    };

    let value = match value {
        Value::Object(mut map) => {
            match map.remove("error") {
                None | Some(Value::Null) => {}
                Some(Value::Object(error)) if error.is_empty() => {}
                Some(error) => return Frame::Error(error_message(error)),
            }
            match map.remove("result") {
                Some(result) => result,
                None => Value::Object(map),
            }
        }
        other => other,
    };

    match serde_json::from_value(value) {
        Ok(item) => Frame::Item(item),
        Err(err) => Frame::Malformed(err.to_string()),
    }
}

fn error_message(error: Value) -> String {
    match error {
        Value::String(message) => message,
        Value::Object(ref map) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_owned(),
            None => error.to_string(),
        },
        other => other.to_string(),
    }
}
