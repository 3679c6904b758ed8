// src/history.rs
// Append-only exchange log persisted as one JSON array
//
// Read-modify-write with no locking: one writer process is assumed,
// concurrent writers lose updates (last write wins).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{GishError, Result};
use crate::message::{Message, Role};
use crate::utils::truncate_chars;

/// Characters kept from each request in a history summary
pub const SUMMARY_CHARS: usize = 100;

/// One completed request/response cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub messages: Vec<Message>,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub tokens: u64,
    /// Dollar amount with 5 decimals, or "unavailable"
    pub cost: String,
    /// Wall-clock seconds
    pub duration: f64,
}

impl Exchange {
    /// Last user message in the exchange
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// Assistant reply, if the exchange completed
    pub fn reply(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.role == Role::Assistant)
    }
}

/// Shortened view of a past request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Absolute position in the store
    pub index: usize,
    pub text: String,
}

/// Summaries of the most recent exchanges, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecentHistory {
    pub summaries: Vec<Summary>,
    pub total: usize,
}

/// File-backed exchange log
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file as an empty array if it does not exist yet
    fn ensure_initialized(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, "[]\n")?;
        info!(path = %self.path.display(), "Initialized history file");
        Ok(())
    }

    /// Read every exchange. A missing file reads as empty and is not created.
    pub fn load(&self) -> Result<Vec<Exchange>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map_err(|source| GishError::MalformedHistory {
            path: self.path.clone(),
            source,
        })
    }

    pub fn append(&self, exchange: Exchange) -> Result<()> {
        self.ensure_initialized()?;
        let mut exchanges = self.load()?;
        exchanges.push(exchange);

        let mut body = serde_json::to_string_pretty(&exchanges)?;
        body.push('\n');
        std::fs::write(&self.path, body)?;

        debug!(path = %self.path.display(), total = exchanges.len(), "Appended exchange");
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fetch an exchange by 0-based index, or counted from the end when negative
    /// (`-1` is the newest).
    pub fn get_exchange(&self, index: i64) -> Result<Exchange> {
        let mut exchanges = self.load()?;
        let count = exchanges.len();
        let position = resolve_index(index, count).ok_or(GishError::HistoryIndex { index, count })?;
        Ok(exchanges.swap_remove(position))
    }

    /// Messages of the exchange at `index`, see [`HistoryStore::get_exchange`]
    pub fn get_messages(&self, index: i64) -> Result<Vec<Message>> {
        Ok(self.get_exchange(index)?.messages)
    }

    /// Up to `n` of the newest exchanges, each reduced to its last user message.
    /// Exchanges without a non-empty user message are skipped.
    pub fn get_recent_summaries(&self, n: usize) -> Result<RecentHistory> {
        let exchanges = self.load()?;
        let total = exchanges.len();
        let start = total.saturating_sub(n);

        let summaries = exchanges[start..]
            .iter()
            .enumerate()
            .filter_map(|(offset, exchange)| {
                exchange
                    .last_user_message()
                    .filter(|m| !m.content.is_empty())
                    .map(|m| Summary {
                        index: start + offset,
                        text: truncate_chars(&m.content, SUMMARY_CHARS),
                    })
            })
            .collect();

        Ok(RecentHistory { summaries, total })
    }
}

fn resolve_index(index: i64, count: usize) -> Option<usize> {
    let count_i = i64::try_from(count).ok()?;
    let resolved = if index < 0 { count_i + index } else { index };
    if (0..count_i).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exchange(user: &str, reply: &str) -> Exchange {
        Exchange {
            messages: vec![Message::user(user), Message::assistant(reply)],
            timestamp: Utc::now(),
            tokens: 10,
            cost: "0.00002".into(),
            duration: 0.5,
        }
    }

    fn store(dir: &TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().join("history.json"))
    }

    // ============================================================================
    // append / load
    // ============================================================================

    #[test]
    fn test_append_creates_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(!store.path().exists());
        store.append(exchange("q", "a")).unwrap();
        assert!(store.path().exists());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_append_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("nested/deeper/h.json"));
        store.append(exchange("q", "a")).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_file_is_a_json_array() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.append(exchange("q1", "a1")).unwrap();
        store.append(exchange("q2", "a2")).unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert!(array[0].get("time").is_some());
        assert_eq!(array[1]["messages"][0]["role"], "user");
    }

    #[test]
    fn test_missing_file_reads_empty_without_creating() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.is_empty().unwrap());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), "{not json").unwrap();
        let err = store.append(exchange("q", "a")).unwrap_err();
        assert!(matches!(err, GishError::MalformedHistory { .. }));
    }

    // ============================================================================
    // get_exchange
    // ============================================================================

    #[test]
    fn test_round_trip_last_exchange() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let ex = exchange("what is rust", "a language");
        store.append(exchange("older", "reply")).unwrap();
        store.append(ex.clone()).unwrap();
        assert_eq!(store.get_messages(-1).unwrap(), ex.messages);
    }

    #[test]
    fn test_forward_and_negative_indices() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for i in 0..3 {
            store.append(exchange(&format!("q{i}"), "a")).unwrap();
        }
        assert_eq!(store.get_exchange(0).unwrap().messages[0].content, "q0");
        assert_eq!(store.get_exchange(2).unwrap().messages[0].content, "q2");
        assert_eq!(store.get_exchange(-3).unwrap().messages[0].content, "q0");
    }

    #[test]
    fn test_out_of_range_reports_count() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.append(exchange("q", "a")).unwrap();
        for index in [1, 5, -2] {
            match store.get_exchange(index).unwrap_err() {
                GishError::HistoryIndex { index: i, count } => {
                    assert_eq!(i, index);
                    assert_eq!(count, 1);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_empty_store_index_error() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir).get_exchange(-1).unwrap_err();
        assert!(err.to_string().contains("0 exchanges"));
    }

    #[test]
    fn test_retrieval_does_not_mutate() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.append(exchange("q", "a")).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();
        let _ = store.get_exchange(0).unwrap();
        let _ = store.get_recent_summaries(5).unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    // ============================================================================
    // get_recent_summaries
    // ============================================================================

    #[test]
    fn test_summaries_oldest_first_with_indices() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for i in 0..5 {
            store.append(exchange(&format!("q{i}"), "a")).unwrap();
        }
        let recent = store.get_recent_summaries(2).unwrap();
        assert_eq!(recent.total, 5);
        assert_eq!(
            recent.summaries,
            vec![
                Summary { index: 3, text: "q3".into() },
                Summary { index: 4, text: "q4".into() },
            ]
        );
    }

    #[test]
    fn test_summary_uses_last_user_message_truncated() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let long = "x".repeat(250);
        store
            .append(Exchange {
                messages: vec![
                    Message::system("be brief"),
                    Message::user("first"),
                    Message::assistant("ok"),
                    Message::user(long.clone()),
                    Message::assistant("ok"),
                ],
                ..exchange("", "")
            })
            .unwrap();
        let recent = store.get_recent_summaries(10).unwrap();
        assert_eq!(recent.summaries[0].text, "x".repeat(SUMMARY_CHARS));
    }

    #[test]
    fn test_summaries_skip_exchanges_without_user() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.append(exchange("q0", "a")).unwrap();
        store
            .append(Exchange {
                messages: vec![Message::assistant("orphan")],
                ..exchange("", "")
            })
            .unwrap();
        let recent = store.get_recent_summaries(10).unwrap();
        assert_eq!(recent.total, 2);
        assert_eq!(recent.summaries.len(), 1);
        assert_eq!(recent.summaries[0].index, 0);
    }

    #[test]
    fn test_summaries_skip_empty_requests() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.append(exchange("", "a")).unwrap();
        store.append(exchange("q1", "a")).unwrap();
        let recent = store.get_recent_summaries(10).unwrap();
        assert_eq!(recent.total, 2);
        assert_eq!(recent.summaries, vec![Summary { index: 1, text: "q1".into() }]);
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
        assert_eq!(resolve_index(-1, 0), None);
    }
}
