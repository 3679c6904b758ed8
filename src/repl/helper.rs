//! Rustyline helper: command completion, history hints, coloured prompts

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::borrow::Cow;

use crate::display;

/// Interactive commands offered for tab completion
pub const COMMANDS: &[&str] = &["help", "chat", "exit", "history", "input"];

pub const PROMPT: &str = "> ";
pub const CHAT_PROMPT: &str = "Chat > ";

pub struct GishHelper {
    hinter: HistoryHinter,
}

impl GishHelper {
    pub fn new() -> Self {
        Self {
            hinter: HistoryHinter::new(),
        }
    }
}

impl Default for GishHelper {
    fn default() -> Self {
        Self::new()
    }
}

/// Commands matching the first word of `line`, or none once past it
pub fn complete_command(line: &str, pos: usize) -> Vec<&'static str> {
    if pos > line.find(' ').unwrap_or(line.len()) {
        return Vec::new();
    }
    let word = &line[..pos];
    COMMANDS.iter().copied().filter(|c| c.starts_with(word)).collect()
}

impl Completer for GishHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let matches = complete_command(line, pos)
            .into_iter()
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for GishHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for GishHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        match prompt {
            CHAT_PROMPT => Cow::Owned(display::chat_prompt()),
            PROMPT => Cow::Owned(display::prompt()),
            _ => Cow::Borrowed(prompt),
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[2m{}\x1b[0m", hint))
    }
}

impl Validator for GishHelper {}

impl Helper for GishHelper {}
