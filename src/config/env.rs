// src/config/env.rs
// API key discovery: flag or environment first, then ~/.openai

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{GishError, Result};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Where the key was found, for logging without exposing the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Explicit,
    KeyFile,
}

/// Resolved service credential
#[derive(Clone)]
pub struct ApiKey {
    value: String,
    pub source: KeySource,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

impl ApiKey {
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Resolve the key. `explicit` carries `--api-key`, which clap also fills
    /// from `OPENAI_API_KEY`.
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        let key_file = dirs::home_dir().map(|home| home.join(".openai"));
        Self::resolve_with(explicit, key_file.as_deref())
    }

    pub fn resolve_with(explicit: Option<&str>, key_file: Option<&Path>) -> Result<Self> {
        if let Some(value) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
            debug!(source = "explicit", "API key loaded");
            return Ok(Self {
                value: value.to_string(),
                source: KeySource::Explicit,
            });
        }

        if let Some(path) = key_file {
            if let Some(value) = read_key_file(path) {
                debug!(source = "key_file", path = %path.display(), "API key loaded");
                return Ok(Self {
                    value,
                    source: KeySource::KeyFile,
                });
            }
        }

        Err(GishError::Config(format!(
            "no API key found: pass --api-key, set {}, or write the key to {}",
            API_KEY_ENV,
            key_file
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("~/.openai"))
                .display()
        )))
    }
}

fn read_key_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|contents| contents.trim().to_string())
        .filter(|k| !k.is_empty())
}
