// src/utils.rs
// Shared path and text helpers

use std::path::{Path, PathBuf};

/// Expand a leading `~` to the given home directory.
///
/// Only `~` on its own or `~/...` is expanded; `~user` forms are left untouched.
pub fn expand_home_with(path: &str, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(path);
    };
    if path == "~" {
        return home.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Expand a leading `~` to the invoking user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    expand_home_with(path, dirs::home_dir().as_deref())
}

/// Generate a temp-style base name (no extension) such as `/tmp/gish-1700000000000`
pub fn temp_file_base(dir: &Path) -> PathBuf {
    let millis = chrono::Utc::now().timestamp_millis();
    dir.join(format!("gish-{}", millis))
}

/// Truncate to at most `max_chars` characters, never splitting a UTF-8 sequence
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

/// Convert a Path to an owned String, replacing invalid UTF-8 with U+FFFD.
pub fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
