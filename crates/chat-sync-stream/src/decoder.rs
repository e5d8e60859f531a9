//! Server-sent-event decoding for completion streams.
//!
//! Network chunks arrive with arbitrary boundaries: a chunk may end in the
//! middle of a line or in the middle of a multi-byte character. `SseDecoder`
//! carries both across calls to [`SseDecoder::feed`].

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;

/// Prefix of an event-data line.
pub const DATA_PREFIX: &str = "data:";

/// Payload marking the logical end of a completion stream.
pub const DONE_TOKEN: &str = "[DONE]";

/// JSON pointer of the incremental text inside a completion chunk.
const DELTA_POINTER: &str = "/choices/0/delta/content";

/// An incremental fragment of assistant text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Text fragment to append.
    pub text: String,
}

impl Delta {
    /// Create a delta from a text fragment.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Result of parsing one line of the event stream.
#[derive(Debug)]
pub enum LineOutcome {
    /// The line carried a non-empty text fragment.
    Delta(Delta),
    /// The line was the `[DONE]` terminator.
    Done,
    /// The line was not an event-data line, or carried no text.
    Ignored,
    /// The line was an event-data line whose payload is not valid JSON.
    Malformed(serde_json::Error),
}

/// Parse a single line (without its trailing newline).
#[must_use]
pub fn parse_line(line: &str) -> LineOutcome {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Ignored;
    };
    let data = data.trim();
    if data == DONE_TOKEN {
        return LineOutcome::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(chunk) => match chunk.pointer(DELTA_POINTER).and_then(Value::as_str) {
            Some(text) if !text.is_empty() => LineOutcome::Delta(Delta::new(text)),
            _ => LineOutcome::Ignored,
        },
        Err(e) => LineOutcome::Malformed(e),
    }
}

/// Incremental decoder from raw body bytes to parsed lines.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    utf8_tail: Vec<u8>,
    /// Decoded text not yet terminated by a newline.
    line_buf: String,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return the outcomes of every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<LineOutcome> {
        self.decode_utf8(chunk);

        let mut outcomes = Vec::new();
        while let Some(pos) = self.line_buf.find('\n') {
            let line: String = self.line_buf.drain(..=pos).collect();
            outcomes.push(parse_line(&line[..pos]));
        }
        outcomes
    }

    /// Flush state at end of stream.
    ///
    /// A final line without a trailing newline is still parsed; an incomplete
    /// UTF-8 sequence is replaced with U+FFFD.
    pub fn finish(&mut self) -> Vec<LineOutcome> {
        if !self.utf8_tail.is_empty() {
            let tail = std::mem::take(&mut self.utf8_tail);
            self.line_buf.push_str(&String::from_utf8_lossy(&tail));
        }
        let rest = std::mem::take(&mut self.line_buf);
        if rest.is_empty() {
            Vec::new()
        } else {
            vec![parse_line(&rest)]
        }
    }

    /// Decode bytes in streaming mode, carrying an incomplete trailing sequence.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.utf8_tail);
        bytes.extend_from_slice(chunk);

        let mut input = bytes.as_slice();
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.line_buf.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    self.line_buf.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            self.line_buf.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.utf8_tail = rest.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// State threaded through [`decode_stream`].
struct DecodeState<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<Delta>,
    ended: bool,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, outcomes: Vec<LineOutcome>) {
        for outcome in outcomes {
            match outcome {
                LineOutcome::Delta(delta) => self.ready.push_back(delta),
                LineOutcome::Malformed(e) => {
                    tracing::warn!(error = %e, "Skipping malformed completion chunk");
                }
                LineOutcome::Done => tracing::debug!("Completion stream signalled done"),
                LineOutcome::Ignored => {}
            }
        }
    }
}

/// Turn a body byte stream into a stream of deltas.
///
/// Malformed lines are logged and skipped. A transport error is yielded once
/// and ends the stream. The stream ends when the body ends.
pub fn decode_stream<S, E>(body: S) -> impl Stream<Item = Result<Delta, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let state = DecodeState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        ended: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.ready.pop_front() {
                return Some((Ok(delta), state));
            }
            if state.ended {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let outcomes = state.decoder.feed(&chunk);
                    state.absorb(outcomes);
                }
                Some(Err(e)) => {
                    state.ended = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.ended = true;
                    let outcomes = state.decoder.finish();
                    state.absorb(outcomes);
                }
            }
        }
    })
}
