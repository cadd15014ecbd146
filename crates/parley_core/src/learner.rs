//! Learning new local patterns from (utterance, response) pairs.
//!
//! A pair either merges into an existing learned entry whose normalized form
//! is near-identical (token order ignored), or becomes a new learned entry
//! with a derived regex. Every successful learn rewrites the record file and
//! reloads the matcher.

use crate::error::Result;
use crate::matcher::Matcher;
use crate::normalize;
use crate::pattern::{PatternEntry, PatternRecord, PatternStore, LEARNED_PREFIX};
use crate::similarity;
use tracing::{debug, info};

/// Priority given to learned entries
pub const LEARNED_PRIORITY: i32 = 9;

/// Result of a learn attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnResult {
    /// Whether the store changed
    pub learned: bool,
    /// Entry created or merged into
    pub entry_name: Option<String>,
    /// Reason if nothing changed
    pub reason: Option<String>,
}

impl LearnResult {
    fn learned(name: impl Into<String>) -> Self {
        Self {
            learned: true,
            entry_name: Some(name.into()),
            reason: None,
        }
    }

    fn skipped(name: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            learned: false,
            entry_name: name,
            reason: Some(reason.into()),
        }
    }
}

/// The comparable form of a learned entry: its normalized string, else its tags.
pub(crate) fn learned_form(entry: &PatternEntry) -> Option<String> {
    entry
        .normalized
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| entry.tags.as_ref().map(|t| t.join(" ")))
        .filter(|n| !n.trim().is_empty())
}

/// Highest-scoring candidate at or above `threshold` (0-1). Earlier
/// candidates win ties.
pub(crate) fn best_similar<'a, I>(normalized: &str, candidates: I, threshold: f64) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let cutoff = threshold * 100.0;
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in candidates.into_iter().enumerate() {
        let score = similarity::token_sort_ratio(normalized, candidate);
        if score >= cutoff && best.map_or(true, |(_, s)| score > s) {
            best = Some((idx, score));
        }
    }
    best
}

/// Name of the learned entry most similar to `normalized`, if any.
pub fn find_similar(store: &PatternStore, normalized: &str, threshold: f64) -> Option<String> {
    let learned: Vec<(&str, String)> = store
        .entries()
        .iter()
        .filter(|e| e.is_learned())
        .filter_map(|e| learned_form(e).map(|form| (e.name.as_str(), form)))
        .collect();

    best_similar(normalized, learned.iter().map(|(_, form)| form.as_str()), threshold)
        .map(|(idx, _)| learned[idx].0.to_string())
}

/// Word-boundary-anchored tags joined by "anything in between".
pub fn derive_pattern(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!(r"\b{}\b", regex::escape(t)))
        .collect::<Vec<_>>()
        .join(".*")
}

fn new_learned_name(store: &PatternStore) -> String {
    loop {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}_{}", LEARNED_PREFIX, &id[..8]);
        if !store.contains(&name) {
            return name;
        }
    }
}

/// Learn `response` as an answer to `pattern`.
///
/// Write failures leave the in-memory store untouched.
pub fn learn(matcher: &mut Matcher, pattern: &str, response: &str) -> Result<LearnResult> {
    let tags = normalize::tagify(pattern);
    if tags.is_empty() {
        return Ok(LearnResult::skipped(None, "Pattern normalizes to nothing"));
    }
    if response.trim().is_empty() {
        return Ok(LearnResult::skipped(None, "Empty response"));
    }

    let normalized = tags.join(" ");
    let threshold = matcher.settings().dedup_similarity;
    let mut updated = matcher.store().clone();

    let name = match find_similar(&updated, &normalized, threshold) {
        Some(name) => {
            let Some(existing) = updated.get_mut(&name) else {
                return Ok(LearnResult::skipped(Some(name), "Entry vanished"));
            };
            if existing.responses.iter().any(|r| r == response) {
                debug!("Response already known for {}", name);
                return Ok(LearnResult::skipped(Some(name), "Duplicate response"));
            }
            existing.responses.push(response.to_string());
            info!("Merged response into learned pattern {}", name);
            name
        }
        None => {
            let name = new_learned_name(&updated);
            let record = PatternRecord {
                patterns: vec![derive_pattern(&tags)],
                responses: vec![response.to_string()],
                priority: LEARNED_PRIORITY,
                tags: Some(tags),
                normalized: Some(normalized),
                original_query: Some(pattern.to_string()),
            };
            updated.upsert(PatternEntry::from_record(name.clone(), record));
            info!("Learned new pattern {}", name);
            name
        }
    };

    updated.save()?;
    *matcher.store_mut() = updated;
    matcher.reload();
    Ok(LearnResult::learned(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingSettings;
    use crate::knowledge::KnowledgeBase;

    fn matcher() -> Matcher {
        Matcher::new(
            PatternStore::builtin(),
            KnowledgeBase::default(),
            MatchingSettings::default(),
        )
    }

    #[test]
    fn test_derive_pattern() {
        let tags = vec!["weather".to_string(), "c++".to_string()];
        assert_eq!(derive_pattern(&tags), r"\bweather\b.*\bc\+\+\b");
    }

    #[test]
    fn test_learn_creates_entry() {
        let mut m = matcher();
        let result = learn(&mut m, "What is the weather in Paris?", "Sunny").unwrap();
        assert!(result.learned);

        let name = result.entry_name.unwrap();
        assert!(name.starts_with("learned_"));
        let entry = m.store().get(&name).unwrap();
        assert_eq!(entry.normalized.as_deref(), Some("what weather paris"));
        assert_eq!(entry.original_query.as_deref(), Some("What is the weather in Paris?"));
        assert_eq!(entry.priority, LEARNED_PRIORITY);
        assert!(entry.patterns[0].is_regex());
    }

    #[test]
    fn test_learn_merges_and_skips_duplicates() {
        let mut m = matcher();
        let first = learn(&mut m, "weather in Paris", "Sunny").unwrap();
        let name = first.entry_name.unwrap();

        // Same tags in a different order merge
        let second = learn(&mut m, "Paris weather", "Rainy").unwrap();
        assert!(second.learned);
        assert_eq!(second.entry_name.as_deref(), Some(name.as_str()));
        assert_eq!(m.store().get(&name).unwrap().responses.len(), 2);

        let third = learn(&mut m, "Paris weather", "Rainy").unwrap();
        assert!(!third.learned);
        assert_eq!(m.store().get(&name).unwrap().responses.len(), 2);
        assert_eq!(m.store().learned_count(), 1);
    }

    #[test]
    fn test_learn_rejects_empty() {
        let mut m = matcher();
        assert!(!learn(&mut m, "   ", "x").unwrap().learned);
        assert!(!learn(&mut m, "something", " ").unwrap().learned);
        assert_eq!(m.store().learned_count(), 0);
    }

    #[test]
    fn test_builtins_never_merge_targets() {
        let store = PatternStore::builtin();
        assert_eq!(find_similar(&store, "greetings", 0.9), None);
    }
}
