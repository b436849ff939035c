//! Shared SSE streaming infrastructure for generation adapters.
//!
//! The endpoint sends chunked bytes whose boundaries align with neither SSE
//! event boundaries nor UTF-8 character boundaries. [`SseDecoder`] therefore
//! accumulates raw bytes and only decodes a complete `\n\n`-terminated event
//! at a time — a multi-byte character split across two reads is reassembled
//! in the buffer before any decoding happens.
//!
//! The parser closure handed to [`sse_response_stream`] returns zero or more
//! events per payload; a payload it cannot parse yields zero events
//! (skip-and-continue — one corrupt frame never fails the whole turn).

use crate::util::from_reqwest;
use quill_domain::error::Result;
use quill_domain::stream::{BoxStream, StreamEvent};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Byte-level event decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Incremental SSE decoder over raw network chunks.
///
/// Bytes are buffered until a full event (delimited by `\n\n`) is present,
/// then the event is decoded as one unit. The delimiter is ASCII, so a
/// complete event is always a whole number of characters.
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Feed one network chunk; returns the `data:` payloads of every event
    /// the chunk completed. Partial events (including partial characters)
    /// stay buffered for the next read.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(end) = find_event_end(&self.pending) {
            let event: Vec<u8> = self.pending.drain(..end + 2).collect();
            collect_data_payloads(&event[..end], &mut payloads);
        }
        payloads
    }

    /// Flush a trailing unterminated event once the body has ended.
    pub(crate) fn finish(&mut self) -> Vec<String> {
        let mut payloads = Vec::new();
        if !self.pending.is_empty() {
            let event = std::mem::take(&mut self.pending);
            collect_data_payloads(&event, &mut payloads);
        }
        payloads
    }
}

/// Byte offset of the first `\n\n` event delimiter, if any.
fn find_event_end(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\n\n")
}

/// Pull the `data:` payloads out of one complete event block.
///
/// An event block may contain `event:`, `data:`, `id:`, or `retry:` lines;
/// only `data:` lines matter here.
fn collect_data_payloads(event: &[u8], out: &mut Vec<String>) {
    let text = String::from_utf8_lossy(event);
    for line in text.lines() {
        if let Some(data) = line.trim().strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() {
                out.push(data.to_string());
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build a [`BoxStream`] from an SSE `reqwest::Response` and a parser closure.
///
/// The stream automatically:
/// 1. Buffers incoming chunks and drains complete SSE events
/// 2. Flushes the remaining buffer when the response body closes
/// 3. Emits a fallback `Done` event if the parser never produced one
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut decoder = SseDecoder::new();
        let mut done_emitted = false;

        loop {
            let (payloads, at_end) = match response.chunk().await {
                Ok(Some(bytes)) => (decoder.feed(&bytes), false),
                Ok(None) => (decoder.finish(), true),
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            };

            for data in payloads {
                for event in parse_data(&data) {
                    if matches!(&event, Ok(StreamEvent::Done { .. })) {
                        done_emitted = true;
                    }
                    yield event;
                }
            }
            if at_end {
                break;
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
