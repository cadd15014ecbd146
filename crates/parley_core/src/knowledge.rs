//! Read-only knowledge collection searched by the matcher.

use crate::error::{ChatError, Result};
use crate::persist;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    path: Option<PathBuf>,
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            path: None,
            entries,
        }
    }

    /// Load from a JSON list. Missing or malformed files give an empty base.
    pub fn load(path: &Path) -> Self {
        let entries = match Self::try_load(path) {
            Ok(Some(kb)) => {
                info!("Loaded {} knowledge entries from {}", kb.len(), path.display());
                kb.entries
            }
            Ok(None) => {
                debug!("No knowledge record at {}", path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to load knowledge base: {}", e);
                Vec::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    pub fn reload(&mut self) {
        if let Some(path) = self.path.clone() {
            *self = Self::load(&path);
        }
    }

    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        let entries: Option<Vec<KnowledgeEntry>> =
            persist::read_json(path).map_err(|e| ChatError::KnowledgeRecord {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(entries.map(Self::new))
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("knowledge.json");
        std::fs::write(
            &path,
            r#"[{"tags": ["rust", "borrow checker"], "content": "Rust checks borrows at compile time."}]"#,
        )
        .unwrap();

        let kb = KnowledgeBase::load(&path);
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.entries()[0].tags[1], "borrow checker");
    }

    #[test]
    fn test_missing_or_malformed_is_empty() {
        let dir = tempdir().unwrap();
        assert!(KnowledgeBase::load(&dir.path().join("none.json")).is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{\"tags\": 1}").unwrap();
        assert!(KnowledgeBase::load(&bad).is_empty());
        assert!(matches!(
            KnowledgeBase::try_load(&bad),
            Err(ChatError::KnowledgeRecord { .. })
        ));
    }
}
