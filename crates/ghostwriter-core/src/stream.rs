//! SSE (Server-Sent Events) decoding for streamed lyric generation
//!
//! Workers AI streams one JSON object per `data: ` line, each carrying the
//! next text fragment in its `response` field, and ends with `data: [DONE]`.
//! Both the sentinel and the server closing the stream end the sequence.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde::Deserialize;

use crate::error::Error;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Lazily decoded lyric fragments
pub type TokenStream = BoxStream<'static, Result<String, Error>>;

/// A single decoded SSE payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    Done,
}

#[derive(Deserialize)]
struct EventPayload {
    response: String,
}

/// Decode one SSE line.
///
/// Lines without the `data: ` prefix yield `Ok(None)`. A `data: ` line whose
/// payload is not a JSON object with a string `response` field is an error,
/// never a skipped line.
pub fn decode_line(line: &str) -> Result<Option<StreamEvent>, Error> {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };

    if line.ends_with(DONE_SENTINEL) {
        return Ok(Some(StreamEvent::Done));
    }

    let entry: EventPayload = serde_json::from_str(payload)?;
    Ok(Some(StreamEvent::Fragment(entry.response)))
}

/// Iterator over fragments decoded from ready-made lines.
///
/// Stops after `[DONE]`, after the first error, or when the lines run out.
pub struct Tokens<I> {
    lines: I,
    finished: bool,
}

pub fn iter_tokens<I>(lines: I) -> Tokens<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    Tokens {
        lines: lines.into_iter(),
        finished: false,
    }
}

impl<I> Iterator for Tokens<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        for line in self.lines.by_ref() {
            match decode_line(line.as_ref()) {
                Ok(None) => continue,
                Ok(Some(StreamEvent::Fragment(text))) => return Some(Ok(text)),
                Ok(Some(StreamEvent::Done)) => break,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }

        self.finished = true;
        None
    }
}

/// Buffer for accumulating partial SSE lines across body chunks.
///
/// Returned lines have their `\n` (and a preceding `\r`) removed; blank
/// separator lines are dropped.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    // Raw bytes, so a UTF-8 character split across chunks survives
    partial: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every line it completes
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            if let Some(line) = Self::clean(&line) {
                lines.push(line);
            }
        }
        lines
    }

    /// Take whatever trails the last newline, e.g. when the server closes the
    /// stream without terminating its final line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.partial);
        Self::clean(&rest)
    }

    fn clean(raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches('\n').trim_end_matches('\r');
        (!line.is_empty()).then(|| line.to_string())
    }
}

struct DecodeState<S> {
    chunks: Pin<Box<S>>,
    buffer: SseLineBuffer,
    pending: VecDeque<String>,
    source_closed: bool,
    finished: bool,
}

/// Decode a streaming HTTP body into lyric fragments.
pub fn token_stream<S, B, E>(chunks: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    Error: From<E>,
{
    let state = DecodeState {
        chunks: Box::pin(chunks),
        buffer: SseLineBuffer::new(),
        pending: VecDeque::new(),
        source_closed: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(line) = state.pending.pop_front() {
                match decode_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(StreamEvent::Fragment(text))) => return Some((Ok(text), state)),
                    Ok(Some(StreamEvent::Done)) => {
                        tracing::debug!("stream sentinel received");
                        return None;
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }

            if state.source_closed {
                return None;
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.buffer.feed(chunk.as_ref());
                    state.pending.extend(lines);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(Error::from(e)), state));
                }
                None => {
                    state.source_closed = true;
                    state.pending.extend(state.buffer.finish());
                }
            }
        }
    })
    .boxed()
}
