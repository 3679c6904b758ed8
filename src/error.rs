// src/error.rs
// Error taxonomy for the gish session engine

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the gish library
#[derive(Error, Debug)]
pub enum GishError {
    /// A `#import`/`#diff` directive named a file that could not be read
    #[error("#import file {path} was not found")]
    DirectiveNotFound { path: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("history index {index} is out of range: {count} exchanges recorded")]
    HistoryIndex { index: i64, count: usize },

    #[error("history file {path} is malformed: {source}")]
    MalformedHistory {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not find a free file name for {path} after {attempts} attempts")]
    CollisionExhausted { path: PathBuf, attempts: usize },

    #[error(
        "error while parsing extra parameters: {0}\nremember to use double quotes around all text elements, e.g. --extra '\"max_tokens\":10,\"temperature\":0.5'"
    )]
    InvalidExtra(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using GishError
pub type Result<T> = std::result::Result<T, GishError>;

impl GishError {
    /// True for faults raised below the session engine (network, service, stream)
    pub fn is_transport(&self) -> bool {
        matches!(self, GishError::Transport(_) | GishError::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // Display tests
    // ============================================================================

    #[test]
    fn test_directive_not_found_message() {
        let err = GishError::DirectiveNotFound {
            path: "missing.txt".into(),
        };
        assert_eq!(err.to_string(), "#import file missing.txt was not found");
    }

    #[test]
    fn test_history_index_reports_count() {
        let err = GishError::HistoryIndex { index: 7, count: 3 };
        let msg = err.to_string();
        assert!(msg.contains("7"));
        assert!(msg.contains("3 exchanges"));
    }

    #[test]
    fn test_collision_exhausted_names_path() {
        let err = GishError::CollisionExhausted {
            path: PathBuf::from("name.txt"),
            attempts: 6,
        };
        assert!(err.to_string().contains("name.txt"));
    }

    #[test]
    fn test_invalid_extra_has_quoting_hint() {
        let err = GishError::InvalidExtra("expected value".into());
        assert!(err.to_string().contains("--extra"));
    }

    // ============================================================================
    // Classification tests
    // ============================================================================

    #[test]
    fn test_transport_classification() {
        assert!(GishError::Transport("reset".into()).is_transport());
        assert!(!GishError::Config("x".into()).is_transport());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GishError = io_err.into();
        assert!(matches!(err, GishError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }
}
