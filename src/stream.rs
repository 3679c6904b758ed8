// src/stream.rs
// Token stream consumption: accumulate deltas, normalize, report progress

use futures::{Stream, StreamExt};
use std::io::{self, Write};
use tracing::{debug, warn};

use crate::display::ansi::{GREEN, RESET};
use crate::error::{GishError, Result};

/// One event from an incremental response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text fragment, possibly empty
    Delta(String),
    /// End of stream, with the service-reported token count if it sent one
    Done { usage: Option<u64> },
    /// Service-side failure reported inside the stream
    Error(String),
}

/// Receives each normalized fragment as it is appended
pub trait ProgressSink {
    fn on_text(&mut self, text: &str);

    /// Called once after the stream ends successfully
    fn on_finish(&mut self) {}
}

/// Discards progress output
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_text(&mut self, _text: &str) {}
}

/// Echoes fragments to stdout in green as they arrive
pub struct StdoutSink {
    printed_any: bool,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { printed_any: false }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for StdoutSink {
    fn on_text(&mut self, text: &str) {
        print!("{}{}{}", GREEN, text, RESET);
        let _ = io::stdout().flush();
        self.printed_any = true;
    }

    fn on_finish(&mut self) {
        if self.printed_any {
            println!();
        }
    }
}

/// Collects fragments, mostly useful for tests
impl ProgressSink for Vec<String> {
    fn on_text(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

/// Final result of a consumed stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamOutcome {
    pub text: String,
    /// Authoritative token count from the end-of-stream signal, if any
    pub usage: Option<u64>,
}

/// Collapse every run of consecutive `\n` into one.
///
/// `after_newline` tells whether the text already accumulated ends in `\n`, so a
/// run split across two deltas is collapsed too.
fn collapse_newlines(delta: &str, after_newline: bool) -> String {
    let mut out = String::with_capacity(delta.len());
    let mut prev_newline = after_newline;
    for c in delta.chars() {
        if c == '\n' {
            if prev_newline {
                continue;
            }
            prev_newline = true;
        } else {
            prev_newline = false;
        }
        out.push(c);
    }
    out
}

/// Consume a delta stream into a single response string.
///
/// The first non-empty delta is dropped when it is whitespace only. `on_first_token`
/// fires once, right before the first fragment that is actually kept. A fault in
/// the stream returns `Err` and the partial text is dropped.
pub async fn consume_stream<S, F>(
    source: S,
    sink: &mut dyn ProgressSink,
    on_first_token: Option<F>,
) -> Result<StreamOutcome>
where
    S: Stream<Item = Result<StreamEvent>>,
    F: FnOnce(),
{
    let mut source = std::pin::pin!(source);
    let mut on_first_token = on_first_token;
    let mut text = String::new();
    let mut seen_non_empty = false;
    let mut usage = None;

    while let Some(event) = source.next().await {
        match event? {
            StreamEvent::Delta(delta) => {
                if delta.is_empty() {
                    continue;
                }
                if !seen_non_empty {
                    seen_non_empty = true;
                    if delta.trim().is_empty() {
                        debug!(len = delta.len(), "Suppressed leading whitespace delta");
                        continue;
                    }
                }

                let normalized = collapse_newlines(&delta, text.ends_with('\n'));
                if normalized.is_empty() {
                    continue;
                }
                if let Some(notify) = on_first_token.take() {
                    notify();
                }
                sink.on_text(&normalized);
                text.push_str(&normalized);
            }
            StreamEvent::Done { usage: reported } => {
                usage = reported.filter(|n| *n > 0);
                break;
            }
            StreamEvent::Error(message) => {
                warn!(error = %message, discarded = text.len(), "Stream failed, dropping partial text");
                return Err(GishError::Transport(message));
            }
        }
    }

    sink.on_finish();
    Ok(StreamOutcome { text, usage })
}
