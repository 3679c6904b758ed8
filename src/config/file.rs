// src/config/file.rs
// File-based configuration from ~/.gish/config.toml

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::utils::expand_home;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EXTENSION: &str = "txt";
pub const DEFAULT_EDITOR: &str = "vi";
pub const DEFAULT_DIFF_COMMAND: &str = "vimdiff";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Top-level config structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GishConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Per-token rate overrides keyed by model id
    #[serde(default)]
    pub pricing: HashMap<String, f64>,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Request defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub model: String,
    pub stream: bool,
    /// System prompt file applied when `--prompt` is not given
    pub prompt_file: Option<String>,
    /// Look for `file:` hints in generated content when picking a save name
    pub infer_names: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            stream: true,
            prompt_file: None,
            infer_names: true,
        }
    }
}

/// File locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub history_file: String,
    pub input_history_file: String,
    pub default_extension: String,
    /// Directory for generated temp names; system temp dir when unset
    pub output_dir: Option<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            history_file: "~/.gish/history.json".to_string(),
            input_history_file: "~/.gish_hist".to_string(),
            default_extension: DEFAULT_EXTENSION.to_string(),
            output_dir: None,
        }
    }
}

/// External programs
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsConfig {
    /// Falls back to `$EDITOR`, then `vi`
    pub editor: Option<String>,
    pub diff_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl GishConfig {
    /// Load config from ~/.gish/config.toml
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path; missing or unparseable files yield defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// ~/.gish
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gish")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn history_path(&self) -> PathBuf {
        expand_home(&self.files.history_file)
    }

    pub fn input_history_path(&self) -> PathBuf {
        expand_home(&self.files.input_history_file)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.files
            .output_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Editor command: config, then `$EDITOR`, then `vi`
    pub fn editor(&self) -> String {
        self.tools
            .editor
            .clone()
            .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
    }

    pub fn diff_command(&self) -> String {
        self.tools
            .diff_command
            .clone()
            .unwrap_or_else(|| DEFAULT_DIFF_COMMAND.to_string())
    }
}
