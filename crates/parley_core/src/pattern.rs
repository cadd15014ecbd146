//! Pattern store: named entries of trigger patterns and candidate responses.
//!
//! The on-disk record is a JSON object keyed by entry name. Entry order in the
//! file is the match order, so the record is read through an order-preserving
//! map. Each surface pattern is classified once at load time as a literal or a
//! compiled case-insensitive regex.

use crate::error::{ChatError, Result};
use crate::persist;
use rand::seq::SliceRandom;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Characters whose presence marks a stored pattern as a regex.
const REGEX_CHARS: &str = r"\[](){}^$.*+?|";

/// Name prefix of entries created by the learner.
pub const LEARNED_PREFIX: &str = "learned";

fn default_priority() -> i32 {
    5
}

/// One entry as stored in the pattern record file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_query: Option<String>,
}

/// A trigger pattern, decided once as literal or regex.
#[derive(Debug, Clone)]
pub enum SurfacePattern {
    Literal(String),
    Regex(Regex),
}

impl SurfacePattern {
    /// Classify and compile. A pattern that looks like a regex but fails to
    /// compile is kept as a literal.
    pub fn parse(source: &str) -> Self {
        if !looks_like_regex(source) {
            return SurfacePattern::Literal(source.to_string());
        }
        match RegexBuilder::new(source).case_insensitive(true).build() {
            Ok(re) => SurfacePattern::Regex(re),
            Err(e) => {
                warn!("Invalid regex pattern {:?}, matching literally: {}", source, e);
                SurfacePattern::Literal(source.to_string())
            }
        }
    }

    pub fn source(&self) -> &str {
        match self {
            SurfacePattern::Literal(s) => s,
            SurfacePattern::Regex(re) => re.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, SurfacePattern::Regex(_))
    }

    /// Case-insensitive search (regex) or substring containment (literal).
    pub fn matches(&self, text: &str) -> bool {
        match self {
            SurfacePattern::Literal(s) => text.to_lowercase().contains(&s.to_lowercase()),
            SurfacePattern::Regex(re) => re.is_match(text),
        }
    }
}

pub fn looks_like_regex(pattern: &str) -> bool {
    pattern.chars().any(|c| REGEX_CHARS.contains(c))
}

/// In-memory pattern entry
#[derive(Debug, Clone)]
pub struct PatternEntry {
    pub name: String,
    pub patterns: Vec<SurfacePattern>,
    pub responses: Vec<String>,
    pub tags: Option<Vec<String>>,
    pub normalized: Option<String>,
    pub original_query: Option<String>,
    pub priority: i32,
}

impl PatternEntry {
    pub fn from_record(name: impl Into<String>, record: PatternRecord) -> Self {
        Self {
            name: name.into(),
            patterns: record.patterns.iter().map(|p| SurfacePattern::parse(p)).collect(),
            responses: record.responses,
            tags: record.tags,
            normalized: record.normalized,
            original_query: record.original_query,
            priority: record.priority,
        }
    }

    pub fn to_record(&self) -> PatternRecord {
        PatternRecord {
            patterns: self.patterns.iter().map(|p| p.source().to_string()).collect(),
            responses: self.responses.clone(),
            priority: self.priority,
            tags: self.tags.clone(),
            normalized: self.normalized.clone(),
            original_query: self.original_query.clone(),
        }
    }

    pub fn is_learned(&self) -> bool {
        is_learned_name(&self.name)
    }

    /// Explicit tags, else the words of the stored normalized form.
    pub fn tag_set(&self) -> Option<BTreeSet<String>> {
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            return Some(tags.iter().cloned().collect());
        }
        let normalized = self.normalized.as_deref()?.trim();
        if normalized.is_empty() {
            return None;
        }
        Some(normalized.split_whitespace().map(String::from).collect())
    }

    /// Uniform random pick; `None` for an entry without responses.
    pub fn select_response(&self) -> Option<String> {
        self.responses.choose(&mut rand::thread_rng()).cloned()
    }
}

pub fn is_learned_name(name: &str) -> bool {
    name.starts_with(LEARNED_PREFIX)
}

/// Ordered collection of pattern entries backed by an optional record file.
#[derive(Debug, Clone)]
pub struct PatternStore {
    path: Option<PathBuf>,
    entries: Vec<PatternEntry>,
}

impl PatternStore {
    /// Store with only the built-in entries and no backing file
    pub fn builtin() -> Self {
        Self {
            path: None,
            entries: default_entries(),
        }
    }

    pub fn from_entries(entries: Vec<PatternEntry>) -> Self {
        Self {
            path: None,
            entries,
        }
    }

    /// Load from `path`. A missing or unreadable record yields the built-in
    /// defaults; the path is kept so learning can create the file later.
    /// An unreadable record is left alone by [`PatternStore::save`].
    pub fn load(path: &Path) -> Self {
        let entries = match read_records(path) {
            Ok(Some(records)) => {
                info!("Loaded {} pattern entries from {}", records.len(), path.display());
                records_to_entries(records)
            }
            Ok(None) => {
                debug!("No pattern record at {}, using defaults", path.display());
                default_entries()
            }
            Err(e) => {
                warn!("Failed to load patterns, using defaults: {}", e);
                default_entries()
            }
        };

        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    /// Re-read the backing file. No-op for an in-memory store.
    pub fn reload(&mut self) {
        if let Some(path) = self.path.clone() {
            *self = Self::load(&path);
        }
    }

    /// Rewrite the whole record file. No-op for an in-memory store.
    ///
    /// A record that exists on disk but cannot be parsed is never
    /// overwritten; the parse error is returned instead.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => {
                read_records(path)?;
                write_records(path, &self.records())
            }
            None => Ok(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&PatternEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PatternEntry> {
        self.entries.iter_mut().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace by name, keeping names unique.
    pub fn upsert(&mut self, entry: PatternEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn learned_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_learned()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> Vec<(String, PatternRecord)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.to_record()))
            .collect()
    }
}

fn records_to_entries(records: Vec<(String, PatternRecord)>) -> Vec<PatternEntry> {
    records
        .into_iter()
        .map(|(name, record)| PatternEntry::from_record(name, record))
        .collect()
}

/// Read an ordered `name -> record` list. `Ok(None)` if the file is absent.
pub fn read_records(path: &Path) -> Result<Option<Vec<(String, PatternRecord)>>> {
    let map: Option<serde_json::Map<String, serde_json::Value>> = persist::read_json(path)
        .map_err(|e| ChatError::PatternRecord {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let Some(map) = map else {
        return Ok(None);
    };

    let mut records = Vec::with_capacity(map.len());
    for (name, value) in map {
        let record: PatternRecord =
            serde_json::from_value(value).map_err(|e| ChatError::PatternRecord {
                path: path.to_path_buf(),
                reason: format!("entry {}: {}", name, e),
            })?;
        records.push((name, record));
    }
    Ok(Some(records))
}

/// Atomically rewrite the record file in the given order.
pub fn write_records(path: &Path, records: &[(String, PatternRecord)]) -> Result<()> {
    let mut map = serde_json::Map::new();
    for (name, record) in records {
        map.insert(name.clone(), serde_json::to_value(record)?);
    }
    persist::write_json_atomic(path, &map)
}

fn builtin(name: &str, patterns: &[&str], responses: &[&str], priority: i32) -> PatternEntry {
    PatternEntry::from_record(
        name,
        PatternRecord {
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            responses: responses.iter().map(|s| s.to_string()).collect(),
            priority,
            tags: None,
            normalized: None,
            original_query: None,
        },
    )
}

/// Built-in entries used when no record file exists.
pub fn default_entries() -> Vec<PatternEntry> {
    vec![
        builtin(
            "greetings",
            &[
                r"\b(hello|hi|hey|greetings|howdy)\b",
                "good morning",
                "good afternoon",
                "good evening",
            ],
            &[
                "Hello! How can I help you today?",
                "Hi there! What can I do for you?",
                "Hey! How's it going?",
            ],
            10,
        ),
        builtin(
            "farewell",
            &[r"\b(bye|goodbye|see you|farewell|exit|quit)\b"],
            &["Goodbye! Have a great day!", "See you later!", "Take care!"],
            10,
        ),
        builtin(
            "gratitude",
            &[r"\b(thank|thanks|thx|appreciate)\b"],
            &["You're welcome!", "Happy to help!", "Anytime!"],
            8,
        ),
        builtin(
            "status",
            &[r"\b(how are you|how do you do|whats up)\b"],
            &["I'm doing great! How about you?", "I'm here and ready to help!"],
            7,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pattern_classification() {
        assert!(SurfacePattern::parse(r"\bhello\b").is_regex());
        assert!(SurfacePattern::parse("a|b").is_regex());
        assert!(!SurfacePattern::parse("good morning").is_regex());
        // Unbalanced group stays literal
        let broken = SurfacePattern::parse("(oops");
        assert!(!broken.is_regex());
        assert!(broken.matches("well (OOPS"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(SurfacePattern::parse(r"\b(hello|hi)\b").matches("HELLO there"));
        assert!(!SurfacePattern::parse(r"\b(hello|hi)\b").matches("this"));
        assert!(SurfacePattern::parse("Good Morning").matches("good morning all"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let store = PatternStore::load(&dir.path().join("patterns.json"));
        let names: Vec<&str> = store.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["greetings", "farewell", "gratitude", "status"]);
        assert_eq!(store.learned_count(), 0);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        std::fs::write(&path, "[not, a, map").unwrap();
        let store = PatternStore::load(&path);
        assert_eq!(store.len(), default_entries().len());
    }

    #[test]
    fn test_save_preserves_order_and_optional_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        let json = r#"{
            "zeta": {"patterns": ["zzz"], "responses": ["Z"], "priority": 3},
            "alpha": {"patterns": ["\\bweather\\b.*\\bparis\\b"], "responses": ["Sunny"],
                      "priority": 9, "tags": ["weather", "paris"],
                      "normalized": "weather paris", "original_query": "Weather in Paris?"}
        }"#;
        std::fs::write(&path, json).unwrap();

        let store = PatternStore::load(&path);
        assert_eq!(store.entries()[0].name, "zeta");
        assert_eq!(store.entries()[1].name, "alpha");
        store.save().unwrap();

        let back = read_records(&path).unwrap().unwrap();
        assert_eq!(back[0].0, "zeta");
        assert_eq!(back[0].1.tags, None);
        assert_eq!(back[1].1.normalized.as_deref(), Some("weather paris"));
        assert_eq!(back[1].1.original_query.as_deref(), Some("Weather in Paris?"));
    }

    #[test]
    fn test_tag_set_fallback_to_normalized() {
        let mut entry = builtin("learned_x", &["x"], &["y"], 9);
        assert!(entry.tag_set().is_none());
        entry.normalized = Some("weather paris".into());
        let tags = entry.tag_set().unwrap();
        assert!(tags.contains("weather") && tags.contains("paris"));
        assert!(entry.is_learned());
    }

    #[test]
    fn test_select_response() {
        let entry = builtin("one", &["x"], &["only"], 1);
        assert_eq!(entry.select_response().as_deref(), Some("only"));
        let empty = builtin("none", &["x"], &[], 1);
        assert_eq!(empty.select_response(), None);
    }

    #[test]
    fn test_upsert_keeps_names_unique() {
        let mut store = PatternStore::builtin();
        let before = store.len();
        store.upsert(builtin("greetings", &["yo"], &["Yo!"], 10));
        assert_eq!(store.len(), before);
        assert_eq!(store.get("greetings").unwrap().responses, vec!["Yo!"]);
    }
}
