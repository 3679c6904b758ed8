// src/directives.rs
// #import / #diff directive expansion for request text

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{GishError, Result};
use crate::utils::{expand_home_with, path_to_string};

#[allow(clippy::expect_used)]
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#(import|diff)\s+(\S+)").expect("directive regex is valid")
});

/// Fence marker wrapped around inlined file contents
const FENCE: &str = "```";

/// Result of a successful expansion
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expansion {
    /// Request text with every directive replaced by file contents
    pub text: String,
    /// Paths named by `#diff`, in first-seen order
    pub diff_candidates: Vec<PathBuf>,
}

impl Expansion {
    /// First diff candidate, the default reconciliation target
    pub fn primary_candidate(&self) -> Option<&Path> {
        self.diff_candidates.first().map(PathBuf::as_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    Import,
    Diff,
}

enum Line<'a> {
    Directive { kind: DirectiveKind, path: &'a str },
    Comment,
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = DIRECTIVE_RE.captures(line) {
        let kind = match &caps[1] {
            "diff" => DirectiveKind::Diff,
            _ => DirectiveKind::Import,
        };
        if let Some(path) = caps.get(2) {
            return Line::Directive {
                kind,
                path: path.as_str(),
            };
        }
    }
    if line.trim_start().starts_with('#') {
        Line::Comment
    } else {
        Line::Text(line)
    }
}

/// Expands directives in raw request text.
///
/// Expansion is all-or-nothing: the first unreadable file aborts with
/// [`GishError::DirectiveNotFound`] and nothing that was expanded before it is kept.
#[derive(Debug, Clone)]
pub struct DirectiveExpander {
    home: Option<PathBuf>,
}

impl DirectiveExpander {
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
        }
    }

    /// Use an explicit home directory for `~` expansion
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }

    pub fn expand(&self, raw: &str) -> Result<Expansion> {
        let mut lines: Vec<String> = Vec::new();
        let mut diff_candidates: Vec<PathBuf> = Vec::new();

        for line in raw.split('\n') {
            match classify(line) {
                Line::Text(text) => lines.push(text.to_string()),
                Line::Comment => {}
                Line::Directive { kind, path } => {
                    let resolved = expand_home_with(path, self.home.as_deref());
                    let contents = std::fs::read_to_string(&resolved).map_err(|e| {
                        debug!(path = %resolved.display(), error = %e, "Directive file unreadable");
                        GishError::DirectiveNotFound {
                            path: path_to_string(&resolved),
                        }
                    })?;

                    lines.push(format!("File: {}", resolved.display()));
                    lines.push(FENCE.to_string());
                    lines.extend(contents.lines().map(str::to_string));
                    lines.push(FENCE.to_string());

                    if kind == DirectiveKind::Diff && !diff_candidates.contains(&resolved) {
                        diff_candidates.push(resolved);
                    }
                }
            }
        }

        Ok(Expansion {
            text: lines.join("\n"),
            diff_candidates,
        })
    }
}

impl Default for DirectiveExpander {
    fn default() -> Self {
        Self::new()
    }
}
