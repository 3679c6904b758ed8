// src/config/options.rs
// Per-request option record, built once by the CLI or REPL

use serde_json::{Map, Value};
use std::path::PathBuf;

use super::file::GishConfig;
use crate::error::{GishError, Result};

/// Extra request-body fields merged into every call
pub type ExtraParams = Map<String, Value>;

/// Everything that varies between two requests
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub model: String,
    pub prompt_file: Option<PathBuf>,
    pub extra_params: ExtraParams,
    pub streaming: bool,
    pub dry_run: bool,
    /// Seed the conversation from this history index (negative counts from the end)
    pub chat_continuation_index: Option<i64>,
    pub explicit_save_target: Option<PathBuf>,
    /// Overrides the first `#diff` candidate as the reconciliation target
    pub diff_target: Option<PathBuf>,
}

impl RequestOptions {
    /// Options seeded from config defaults
    pub fn from_config(config: &GishConfig) -> Self {
        Self {
            model: config.defaults.model.clone(),
            prompt_file: config
                .defaults
                .prompt_file
                .as_deref()
                .map(crate::utils::expand_home),
            extra_params: ExtraParams::new(),
            streaming: config.defaults.stream,
            dry_run: false,
            chat_continuation_index: None,
            explicit_save_target: None,
            diff_target: None,
        }
    }

    /// Same options, continuing from the given history index
    pub fn continuing(&self, index: i64) -> Self {
        Self {
            chat_continuation_index: Some(index),
            ..self.clone()
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::from_config(&GishConfig::default())
    }
}

/// Parse an `--extra` fragment such as `"max_tokens":10,"temperature":0.5`.
///
/// The fragment is wrapped in braces, so it must be the inside of a JSON object.
pub fn parse_extra(fragment: &str) -> Result<ExtraParams> {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return Ok(ExtraParams::new());
    }
    let wrapped = format!("{{{}}}", trimmed);
    match serde_json::from_str::<Value>(&wrapped) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(GishError::InvalidExtra(format!("expected an object, got {}", other))),
        Err(e) => Err(GishError::InvalidExtra(e.to_string())),
    }
}
