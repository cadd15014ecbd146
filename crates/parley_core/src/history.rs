//! Bounded conversation history with whole-file persistence.

use crate::config::ConversationSettings;
use crate::error::Result;
use crate::persist;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub bot: String,
    pub source: String,
}

pub struct ConversationLog {
    path: PathBuf,
    entries: Vec<ConversationEntry>,
    max_len: usize,
    /// Rewrite the record after every append
    persist: bool,
}

impl ConversationLog {
    pub fn new(path: impl Into<PathBuf>, settings: &ConversationSettings) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            max_len: settings.max_history_length.max(1),
            persist: settings.save_conversations && settings.log_conversations,
        }
    }

    /// Read previous history. Missing or malformed records start empty.
    pub fn load(&mut self) {
        match persist::read_json::<Vec<ConversationEntry>>(&self.path) {
            Ok(Some(entries)) => {
                self.entries = entries;
                self.truncate();
                info!("Loaded {} conversation entries", self.entries.len());
            }
            Ok(None) => debug!("No previous conversation history found"),
            Err(e) => warn!("Error loading history from {}: {}", self.path.display(), e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn truncate(&mut self) {
        if self.entries.len() > self.max_len {
            let excess = self.entries.len() - self.max_len;
            self.entries.drain(..excess);
        }
    }

    /// Append an exchange, dropping the oldest beyond the bound. Persistence
    /// failures are logged, not returned.
    pub fn append(&mut self, user: &str, bot: &str, source: &str) {
        self.entries.push(ConversationEntry {
            timestamp: Utc::now(),
            user: user.to_string(),
            bot: bot.to_string(),
            source: source.to_string(),
        });
        self.truncate();

        if self.persist {
            if let Err(e) = self.save() {
                warn!("Error saving history: {}", e);
            }
        }
    }

    /// `User:` / `Bot:` lines for the last `window` exchanges.
    pub fn context(&self, window: usize) -> Vec<String> {
        let start = self.entries.len().saturating_sub(window);
        self.entries[start..]
            .iter()
            .flat_map(|e| [format!("User: {}", e.user), format!("Bot: {}", e.bot)])
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        if self.persist {
            if let Err(e) = self.save() {
                warn!("Error saving history: {}", e);
            }
        }
        info!("Conversation history cleared");
    }

    pub fn save(&self) -> Result<()> {
        persist::write_json_atomic(&self.path, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(max: usize) -> ConversationSettings {
        ConversationSettings {
            max_history_length: max,
            save_conversations: true,
            log_conversations: true,
            ..ConversationSettings::default()
        }
    }

    #[test]
    fn test_bounded_append() {
        let dir = tempdir().unwrap();
        let mut log = ConversationLog::new(dir.path().join("h.json"), &settings(2));
        log.append("1", "a", "LOCAL");
        log.append("2", "b", "LOCAL");
        log.append("3", "c", "AI");

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].user, "2");
        assert_eq!(log.entries()[1].source, "AI");
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.json");
        let mut log = ConversationLog::new(&path, &settings(10));
        log.append("hello", "hi", "LOCAL");

        let mut reloaded = ConversationLog::new(&path, &settings(10));
        reloaded.load();
        assert_eq!(reloaded.entries(), log.entries());
    }

    #[test]
    fn test_no_persist_when_logging_off() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.json");
        let off = ConversationSettings {
            log_conversations: false,
            ..settings(10)
        };
        let mut log = ConversationLog::new(&path, &off);
        log.append("hello", "hi", "LOCAL");
        assert!(!path.exists());
    }

    #[test]
    fn test_context_lines() {
        let dir = tempdir().unwrap();
        let mut log = ConversationLog::new(dir.path().join("h.json"), &settings(10));
        log.append("q1", "a1", "LOCAL");
        log.append("q2", "a2", "AI");

        assert_eq!(log.context(1), vec!["User: q2", "Bot: a2"]);
        assert_eq!(log.context(5).len(), 4);
        log.clear();
        assert!(log.context(5).is_empty());
    }
}
