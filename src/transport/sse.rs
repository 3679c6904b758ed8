// src/transport/sse.rs
// Server-sent event decoding for chat-completion streams

use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::warn;

use crate::error::{GishError, Result};
use crate::stream::StreamEvent;

/// Splits a byte stream into lines, buffering across chunk boundaries.
///
/// Bytes are buffered before UTF-8 decoding so a multi-byte character split
/// between two chunks survives.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    fn take_line(&mut self, end: usize) -> Result<String> {
        let mut raw: Vec<u8> = self.buffer.drain(..end).collect();
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        String::from_utf8(raw).map_err(|e| GishError::Transport(format!("Invalid UTF-8 in stream: {}", e)))
    }
}

impl<S, B, E> Stream for SseStream<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                return Poll::Ready(Some(self.take_line(pos + 1)));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(chunk.as_ref());
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(GishError::Transport(format!("Stream error: {}", e)))));
                }
                Poll::Ready(None) => {
                    if self.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    let end = self.buffer.len();
                    return Poll::Ready(Some(self.take_line(end)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Map one SSE line to zero or more events. Non-`data:` lines are ignored.
pub fn parse_sse_line(line: &str) -> Vec<Result<StreamEvent>> {
    let Some(data) = line.strip_prefix("data:") else {
        return Vec::new();
    };
    let data = data.trim();
    if data.is_empty() {
        return Vec::new();
    }
    if data == "[DONE]" {
        return vec![Ok(StreamEvent::Done { usage: None })];
    }

    match serde_json::from_str::<Value>(data) {
        Ok(json) => parse_chunk(&json).into_iter().map(Ok).collect(),
        Err(e) => {
            warn!(error = %e, line = %data, "Failed to parse SSE chunk");
            Vec::new()
        }
    }
}

fn parse_chunk(json: &Value) -> Vec<StreamEvent> {
    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return vec![StreamEvent::Error(message)];
    }

    let mut events = Vec::new();
    if let Some(content) = json
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        events.push(StreamEvent::Delta(content.to_string()));
    }
    if let Some(total) = json.pointer("/usage/total_tokens").and_then(Value::as_u64) {
        events.push(StreamEvent::Done { usage: Some(total) });
    }
    events
}
