// src/display.rs
// ANSI color helpers and the "waiting for response" indicator

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// ANSI escape codes
pub mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
}

use ansi::*;

/// Format a generated reply (green)
pub fn reply(msg: &str) -> String {
    format!("{}{}{}", GREEN, msg, RESET)
}

/// Format an error message (red)
pub fn error(msg: &str) -> String {
    format!("{}{}{}", RED, msg, RESET)
}

/// Format a warning message (yellow)
pub fn warning(msg: &str) -> String {
    format!("{}{}{}", YELLOW, msg, RESET)
}

/// Format a status/metrics line (blue)
pub fn status(msg: &str) -> String {
    format!("{}{}{}", BLUE, msg, RESET)
}

/// Format a history index (dim)
pub fn index(i: usize) -> String {
    format!("{}{:>4}{}", DIM, i, RESET)
}

/// Format the default prompt
pub fn prompt() -> String {
    format!("{}{}> {}", BOLD, BLUE, RESET)
}

/// Format the chat-mode prompt
pub fn chat_prompt() -> String {
    format!("{}{}Chat > {}", BOLD, MAGENTA, RESET)
}

const FRAMES: &[&str] = &["|", "/", "-", "\\"];

/// Spinner on stderr shown while waiting for the first token.
///
/// Dismissal is one-shot; dropping the indicator dismisses it as well.
pub struct WaitingIndicator {
    stopped: Arc<AtomicBool>,
}

impl WaitingIndicator {
    /// Start the spinner on the current tokio runtime
    pub fn start(label: &str) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let label = label.to_string();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(100));
            let mut frame = 0usize;
            loop {
                interval.tick().await;
                let text = format!("{}{} {}{}", DIM, FRAMES[frame % FRAMES.len()], label, RESET);
                if !draw_frame(&flag, &mut io::stderr(), &text) {
                    break;
                }
                frame += 1;
            }
        });

        Self { stopped }
    }

    /// Hand out a callback that dismisses this indicator when invoked
    pub fn dismisser(&self) -> impl FnOnce() + Send + use<> {
        let flag = Arc::clone(&self.stopped);
        move || clear(&flag)
    }

    pub fn dismiss(&self) {
        clear(&self.stopped);
    }
}

impl Drop for WaitingIndicator {
    fn drop(&mut self) {
        clear(&self.stopped);
    }
}

const CLEAR_LINE: &str = "\r\x1b[2K";

/// Draw one spinner frame unless dismissed. A dismissal that lands while the
/// frame is being written is followed by a second clear, so no frame survives it.
/// Returns false once the indicator is dismissed.
fn draw_frame(flag: &AtomicBool, out: &mut impl Write, text: &str) -> bool {
    if flag.load(Ordering::SeqCst) {
        return false;
    }
    let _ = write!(out, "\r{}", text);
    let stopped = flag.load(Ordering::SeqCst);
    if stopped {
        let _ = write!(out, "{}", CLEAR_LINE);
    }
    let _ = out.flush();
    !stopped
}

fn clear(flag: &AtomicBool) {
    if !flag.swap(true, Ordering::SeqCst) {
        let mut err = io::stderr();
        let _ = write!(err, "{}", CLEAR_LINE);
        let _ = err.flush();
    }
}
