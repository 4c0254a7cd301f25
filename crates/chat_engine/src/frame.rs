use chat_core::StreamEvent;
use chat_logging::{chat_debug, chat_warn};
use encoding_rs::{CoderResult, Decoder, UTF_8};
use serde_json::{Map, Value};

/// Reason a single NDJSON line could not be turned into events.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("line is not a json object")]
    NotAnObject,
    #[error("unknown status {0:?}")]
    UnknownStatus(String),
    #[error("downloading status without numeric progress")]
    MissingProgress,
}

/// Incremental NDJSON decoder.
///
/// Bytes may arrive split anywhere, including inside a multi-byte character
/// or a JSON object; the emitted event sequence depends only on the
/// concatenated bytes.
pub struct FrameReader {
    decoder: Decoder,
    pending: String,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder(),
            pending: String::new(),
        }
    }

    /// Feeds one transport chunk and returns the events of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.decode(chunk, false);
        self.drain_complete_lines()
    }

    /// Flushes the decoder and parses a final unterminated line.
    ///
    /// A remainder that does not parse is a truncated frame and is dropped.
    pub fn finish(mut self) -> Vec<StreamEvent> {
        self.decode(&[], true);
        let mut events = self.drain_complete_lines();
        let remainder = std::mem::take(&mut self.pending);
        let line = remainder.strip_suffix('\r').unwrap_or(&remainder);
        if line.trim().is_empty() {
            return events;
        }
        match decode_line(line) {
            Ok(parsed) => events.extend(parsed),
            Err(err) => chat_debug!("Discarding incomplete trailing frame ({}): {}", err, line),
        }
        events
    }

    fn decode(&mut self, mut input: &[u8], last: bool) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(input.len().saturating_mul(3) + 4);
            self.pending.reserve(needed);
            let (result, read, _) = self.decoder.decode_to_string(input, &mut self.pending, last);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn drain_complete_lines(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let Some(end) = self.pending.rfind('\n') else {
            return events;
        };
        let rest = self.pending.split_off(end + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        for line in complete.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() {
                continue;
            }
            events.extend(parse_line(line));
        }
        events
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses one complete line; a malformed line becomes a single `ParseFailure`.
pub fn parse_line(line: &str) -> Vec<StreamEvent> {
    match decode_line(line) {
        Ok(events) => events,
        Err(err) => {
            chat_warn!("Failed to parse stream line ({}): {}", err, line);
            vec![StreamEvent::ParseFailure(line.to_string())]
        }
    }
}

fn decode_line(line: &str) -> Result<Vec<StreamEvent>, LineError> {
    let value: Value = serde_json::from_str(line)?;
    let Value::Object(object) = value else {
        return Err(LineError::NotAnObject);
    };
    match object.get("status") {
        Some(status) => decode_status(status, &object).map(|event| vec![event]),
        None => Ok(decode_tokens(&object)),
    }
}

fn decode_status(status: &Value, object: &Map<String, Value>) -> Result<StreamEvent, LineError> {
    match status.as_str() {
        Some("downloading") => object
            .get("progress")
            .and_then(Value::as_f64)
            .map(|progress| StreamEvent::Progress(progress.clamp(0.0, 100.0) as f32))
            .ok_or(LineError::MissingProgress),
        Some("complete") => Ok(StreamEvent::Complete),
        Some("error") => {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .unwrap_or("unknown error");
            Ok(StreamEvent::Error(message.to_string()))
        }
        _ => Err(LineError::UnknownStatus(status.to_string())),
    }
}

fn decode_tokens(object: &Map<String, Value>) -> Vec<StreamEvent> {
    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };
    // Thought first: a line carrying both applies its reasoning before its answer.
    text("thought_token")
        .map(StreamEvent::ThoughtToken)
        .into_iter()
        .chain(text("token").map(StreamEvent::Token))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn token_line() {
        assert_eq!(
            parse_line(r#"{"token":"hi"}"#),
            vec![StreamEvent::Token("hi".to_string())]
        );
    }

    #[test]
    fn both_channels_in_one_line() {
        assert_eq!(
            parse_line(r#"{"token":"a","thought_token":"b"}"#),
            vec![
                StreamEvent::ThoughtToken("b".to_string()),
                StreamEvent::Token("a".to_string()),
            ]
        );
    }

    #[test]
    fn empty_object_and_empty_tokens_yield_nothing() {
        assert!(parse_line("{}").is_empty());
        assert!(parse_line(r#"{"token":""}"#).is_empty());
    }

    #[test]
    fn download_statuses() {
        assert_eq!(
            parse_line(r#"{"status":"downloading","progress":42.5}"#),
            vec![StreamEvent::Progress(42.5)]
        );
        assert_eq!(
            parse_line(r#"{"status":"complete","progress":100}"#),
            vec![StreamEvent::Complete]
        );
        assert_eq!(
            parse_line(r#"{"status":"error","message":"disk full"}"#),
            vec![StreamEvent::Error("disk full".to_string())]
        );
        assert_eq!(
            parse_line(r#"{"status":"error"}"#),
            vec![StreamEvent::Error("unknown error".to_string())]
        );
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(
            parse_line(r#"{"status":"downloading","progress":-3}"#),
            vec![StreamEvent::Progress(0.0)]
        );
    }

    #[test]
    fn malformed_lines_become_parse_failures() {
        for line in ["{oops", "[1,2]", r#"{"status":"paused"}"#, r#"{"status":"downloading"}"#] {
            assert_eq!(
                parse_line(line),
                vec![StreamEvent::ParseFailure(line.to_string())],
                "line {line}"
            );
        }
    }
}
