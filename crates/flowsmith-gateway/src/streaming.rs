use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use flowsmith_core::error::{FlowsmithError, Result};
use futures::stream::Stream;

/// Parse a raw SSE byte stream into individual events.
/// SSE format: `event: <type>\ndata: <json>\n\n`
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence split across chunks.
    partial: Vec<u8>,
    /// A chunk ended on `\r`; its `\n` may open the next one.
    pending_cr: bool,
}

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, keeping any incomplete UTF-8 tail for the next call.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.partial.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.partial) {
            Ok(_) => self.partial.len(),
            // Incomplete sequence at the end: wait for more bytes.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.partial.len(),
        };
        let rest = self.partial.split_off(valid);
        let text = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial = rest;
        self.feed(&text)
    }

    /// Feed text into the parser and extract complete events.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        if self.pending_cr || chunk.contains('\r') {
            let mut text = String::with_capacity(chunk.len() + 1);
            if std::mem::take(&mut self.pending_cr) {
                text.push('\r');
            }
            text.push_str(chunk);
            if text.ends_with('\r') {
                text.pop();
                self.pending_cr = true;
            }
            self.buffer
                .push_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
        } else {
            self.buffer.push_str(chunk);
        }
        let mut events = Vec::new();

        // Split on double newlines (event boundaries)
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();

            let mut event_type = None;
            let mut data_lines = Vec::new();

            for line in block.lines() {
                if line.starts_with(':') {
                    // comment / keep-alive
                    continue;
                }
                if let Some(val) = line.strip_prefix("event:") {
                    event_type = Some(val.trim_start().to_string());
                } else if let Some(val) = line.strip_prefix("data: ") {
                    data_lines.push(val.to_string());
                } else if let Some(val) = line.strip_prefix("data:") {
                    // data with no space after colon
                    data_lines.push(val.to_string());
                }
            }

            if !data_lines.is_empty() {
                events.push(SseEvent {
                    event_type,
                    data: data_lines.join("\n"),
                });
            }
        }

        events
    }
}

/// A stream of SSE events from raw bytes.
///
/// A transport error is yielded once as a `Channel` error and ends the
/// stream.
pub struct SseStream<S> {
    inner: S,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            // Return pending events first
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.parser.feed_bytes(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(FlowsmithError::Channel(e.to_string()))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    // Flush a final block that lacks its blank line.
                    this.pending.extend(this.parser.feed("\n\n"));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
