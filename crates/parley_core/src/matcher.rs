//! Multi-strategy matcher.
//!
//! Strategies run in a fixed order and the first success wins:
//! 1. exact / regex scan over every surface pattern
//! 2. knowledge search (tag similarity, then content similarity)
//! 3. semantic tag overlap (0.4 · Jaccard + 0.6 · recall)
//! 4. fuzzy partial similarity over literal patterns (when enabled)
//!
//! Successful results are memoized per normalized text until the next
//! `reload` or `clear_cache`. Misses are never memoized.

use crate::config::MatchingSettings;
use crate::knowledge::KnowledgeBase;
use crate::normalize::ParsedInput;
use crate::pattern::{PatternEntry, PatternStore, SurfacePattern};
use crate::similarity;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

const KNOWLEDGE_CONFIDENCE: f64 = 0.9;
const SEMANTIC_JACCARD_WEIGHT: f64 = 0.4;
const SEMANTIC_RECALL_WEIGHT: f64 = 0.6;
/// Partial knowledge matches only apply to inputs longer than this.
const KNOWLEDGE_PARTIAL_MIN_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Regex,
    Knowledge,
    Semantic,
    Fuzzy,
    None,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchKind::Exact => "exact",
            MatchKind::Regex => "regex",
            MatchKind::Knowledge => "knowledge",
            MatchKind::Semantic => "semantic",
            MatchKind::Fuzzy => "fuzzy",
            MatchKind::None => "none",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// `None` when nothing matched or the entry has no responses
    pub response: Option<String>,
    /// Entry name, or "knowledge" for knowledge hits
    pub source: String,
    pub confidence: f64,
    pub kind: MatchKind,
}

impl MatchResult {
    pub fn none() -> Self {
        Self {
            matched: false,
            response: None,
            source: String::new(),
            confidence: 0.0,
            kind: MatchKind::None,
        }
    }

    fn from_entry(entry: &PatternEntry, confidence: f64, kind: MatchKind) -> Self {
        Self {
            matched: true,
            response: entry.select_response(),
            source: entry.name.clone(),
            confidence,
            kind,
        }
    }

    fn knowledge(content: &str) -> Self {
        Self {
            matched: true,
            response: Some(content.to_string()),
            source: "knowledge".to_string(),
            confidence: KNOWLEDGE_CONFIDENCE,
            kind: MatchKind::Knowledge,
        }
    }
}

pub struct Matcher {
    store: PatternStore,
    knowledge: KnowledgeBase,
    settings: MatchingSettings,
    cache: HashMap<String, MatchResult>,
}

impl Matcher {
    pub fn new(store: PatternStore, knowledge: KnowledgeBase, settings: MatchingSettings) -> Self {
        Self {
            store,
            knowledge,
            settings,
            cache: HashMap::new(),
        }
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PatternStore {
        &mut self.store
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn settings(&self) -> &MatchingSettings {
        &self.settings
    }

    /// Re-read pattern and knowledge records and drop memoized results.
    pub fn reload(&mut self) {
        self.store.reload();
        self.knowledge.reload();
        self.clear_cache();
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    /// Resolve an input against every strategy in order.
    pub fn match_input(&mut self, input: &ParsedInput) -> MatchResult {
        let text = input.normalized.as_str();

        if let Some(hit) = self.cache.get(text) {
            let mut result = hit.clone();
            // Re-pick so a memoized entry still varies its reply
            if let Some(entry) = self.store.get(&result.source) {
                result.response = entry.select_response();
            }
            return result;
        }

        let result = self
            .match_surface(text)
            .or_else(|| self.match_knowledge(text))
            .or_else(|| self.match_semantic(&input.tags))
            .or_else(|| self.match_fuzzy(text))
            .unwrap_or_else(MatchResult::none);

        debug!(
            "Match for {:?}: kind={} source={} confidence={:.2}",
            text, result.kind, result.source, result.confidence
        );

        if result.matched {
            self.cache.insert(text.to_string(), result.clone());
        }
        result
    }

    fn match_surface(&self, text: &str) -> Option<MatchResult> {
        for entry in self.store.entries() {
            for pattern in &entry.patterns {
                if pattern.matches(text) {
                    let kind = if pattern.is_regex() {
                        MatchKind::Regex
                    } else {
                        MatchKind::Exact
                    };
                    return Some(MatchResult::from_entry(entry, 1.0, kind));
                }
            }
        }
        None
    }

    fn match_knowledge(&self, text: &str) -> Option<MatchResult> {
        if self.knowledge.is_empty() || text.is_empty() {
            return None;
        }

        let threshold = f64::from(self.settings.knowledge_threshold);
        let partial_threshold = f64::from(self.settings.knowledge_partial_threshold);
        let allow_partial = text.chars().count() > KNOWLEDGE_PARTIAL_MIN_CHARS;

        let mut best_score = 0.0;
        let mut best_content: Option<&str> = None;

        for entry in self.knowledge.entries() {
            for tag in &entry.tags {
                let tag = tag.to_lowercase();
                if similarity::ratio(&tag, text) >= threshold {
                    return Some(MatchResult::knowledge(&entry.content));
                }
                if allow_partial {
                    let partial = similarity::partial_ratio(&tag, text);
                    if partial >= partial_threshold && partial > best_score {
                        best_score = partial;
                        best_content = Some(&entry.content);
                    }
                }
            }

            let content_score = similarity::token_set_ratio(&entry.content.to_lowercase(), text);
            if content_score > best_score {
                best_score = content_score;
                best_content = Some(&entry.content);
            }
        }

        match best_content {
            Some(content) if best_score >= threshold => Some(MatchResult::knowledge(content)),
            _ => None,
        }
    }

    fn match_semantic(&self, input_tags: &BTreeSet<String>) -> Option<MatchResult> {
        if input_tags.is_empty() {
            return None;
        }

        let mut best: Option<(&PatternEntry, f64)> = None;
        for entry in self.store.entries() {
            let Some(entry_tags) = entry.tag_set() else {
                continue;
            };
            let score = SEMANTIC_JACCARD_WEIGHT * similarity::jaccard(input_tags, &entry_tags)
                + SEMANTIC_RECALL_WEIGHT * similarity::recall(input_tags, &entry_tags);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }

        let (entry, score) = best?;
        let threshold = if entry.is_learned() {
            self.settings.learned_semantic_threshold
        } else {
            self.settings.semantic_threshold
        };

        (score >= threshold).then(|| MatchResult::from_entry(entry, score, MatchKind::Semantic))
    }

    fn match_fuzzy(&self, text: &str) -> Option<MatchResult> {
        if !self.settings.use_fuzzy_matching || text.is_empty() {
            return None;
        }

        let mut best: Option<(&PatternEntry, f64)> = None;
        for entry in self.store.entries() {
            let threshold = if entry.is_learned() {
                self.settings
                    .fuzzy_match_threshold
                    .min(self.settings.learned_fuzzy_cap)
            } else {
                self.settings.fuzzy_match_threshold
            };

            for pattern in &entry.patterns {
                let SurfacePattern::Literal(literal) = pattern else {
                    continue;
                };
                let score = similarity::partial_ratio(text, &literal.to_lowercase());
                if score >= f64::from(threshold) && best.map_or(true, |(_, s)| score > s) {
                    best = Some((entry, score));
                }
            }
        }

        best.map(|(entry, score)| MatchResult::from_entry(entry, score / 100.0, MatchKind::Fuzzy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputSettings;
    use crate::knowledge::KnowledgeEntry;
    use crate::normalize::Normalizer;
    use crate::pattern::PatternRecord;

    fn entry(name: &str, patterns: &[&str], responses: &[&str]) -> PatternEntry {
        PatternEntry::from_record(
            name,
            PatternRecord {
                patterns: patterns.iter().map(|s| s.to_string()).collect(),
                responses: responses.iter().map(|s| s.to_string()).collect(),
                priority: 5,
                tags: None,
                normalized: None,
                original_query: None,
            },
        )
    }

    fn tagged(name: &str, tags: &[&str], response: &str) -> PatternEntry {
        let mut e = entry(name, &[], &[response]);
        e.tags = Some(tags.iter().map(|s| s.to_string()).collect());
        e
    }

    fn parse(text: &str) -> ParsedInput {
        Normalizer::new(InputSettings::default()).parse(text)
    }

    fn matcher(entries: Vec<PatternEntry>) -> Matcher {
        Matcher::new(
            PatternStore::from_entries(entries),
            KnowledgeBase::default(),
            MatchingSettings::default(),
        )
    }

    #[test]
    fn test_regex_and_exact() {
        let mut m = Matcher::new(
            PatternStore::builtin(),
            KnowledgeBase::default(),
            MatchingSettings::default(),
        );

        let hello = m.match_input(&parse("Hello there"));
        assert!(hello.matched);
        assert_eq!(hello.kind, MatchKind::Regex);
        assert_eq!(hello.source, "greetings");
        assert_eq!(hello.confidence, 1.0);

        let morning = m.match_input(&parse("Good Morning!"));
        assert_eq!(morning.kind, MatchKind::Exact);
        assert_eq!(morning.source, "greetings");
    }

    #[test]
    fn test_store_order_wins() {
        let mut m = matcher(vec![
            entry("first", &["pizza"], &["one"]),
            entry("second", &["pizza"], &["two"]),
        ]);
        assert_eq!(m.match_input(&parse("I like pizza")).source, "first");
    }

    #[test]
    fn test_exact_beats_semantic() {
        let mut m = matcher(vec![
            tagged("learned_weather", &["weather", "paris"], "Sunny in Paris"),
            entry("weather_literal", &["weather in paris"], &["Exact answer"]),
        ]);
        let result = m.match_input(&parse("weather in paris"));
        assert_eq!(result.kind, MatchKind::Exact);
        assert_eq!(result.source, "weather_literal");
    }

    #[test]
    fn test_semantic_thresholds() {
        let mut m = matcher(vec![tagged(
            "learned_weather",
            &["weather", "paris", "today"],
            "Sunny",
        )]);
        // jaccard 2/3, recall 2/3 -> 0.667, above the learned threshold
        let result = m.match_input(&parse("paris weather"));
        assert_eq!(result.kind, MatchKind::Semantic);
        assert!((result.confidence - 2.0 / 3.0).abs() < 1e-9);

        let mut standard = matcher(vec![tagged("weather", &["weather", "paris", "today"], "Sunny")]);
        assert!(!standard.match_input(&parse("paris weather")).matched);
    }

    #[test]
    fn test_fuzzy_fallback() {
        let mut m = matcher(vec![entry("hours", &["opening hours"], &["9 to 5"])]);
        let result = m.match_input(&parse("openin hours"));
        assert_eq!(result.kind, MatchKind::Fuzzy);
        assert!(result.confidence >= 0.8);

        let mut off = Matcher::new(
            PatternStore::from_entries(vec![entry("hours", &["opening hours"], &["9 to 5"])]),
            KnowledgeBase::default(),
            MatchingSettings {
                use_fuzzy_matching: false,
                ..MatchingSettings::default()
            },
        );
        assert!(!off.match_input(&parse("openin hours")).matched);
    }

    #[test]
    fn test_knowledge_tag_match() {
        let kb = KnowledgeBase::new(vec![KnowledgeEntry {
            tags: vec!["borrow checker".into()],
            content: "It enforces ownership rules.".into(),
        }]);
        let mut m = Matcher::new(PatternStore::from_entries(vec![]), kb, MatchingSettings::default());

        let result = m.match_input(&parse("borrow checkr"));
        assert_eq!(result.kind, MatchKind::Knowledge);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.response.as_deref(), Some("It enforces ownership rules."));
    }

    fn knowledge_matcher(entries: Vec<KnowledgeEntry>) -> Matcher {
        Matcher::new(
            PatternStore::from_entries(vec![]),
            KnowledgeBase::new(entries),
            MatchingSettings::default(),
        )
    }

    #[test]
    fn test_knowledge_partial_tag_match() {
        let mut m = knowledge_matcher(vec![KnowledgeEntry {
            tags: vec!["rust".into()],
            content: "A systems programming language.".into(),
        }]);

        let result = m.match_input(&parse("tell me about rust"));
        assert_eq!(result.kind, MatchKind::Knowledge);
        assert_eq!(result.response.as_deref(), Some("A systems programming language."));
    }

    #[test]
    fn test_knowledge_content_match_without_tags() {
        let mut m = knowledge_matcher(vec![KnowledgeEntry {
            tags: vec!["landmarks".into()],
            content: "The Eiffel Tower is in Paris".into(),
        }]);

        let result = m.match_input(&parse("where is the eiffel tower in paris"));
        assert_eq!(result.kind, MatchKind::Knowledge);
        assert_eq!(result.response.as_deref(), Some("The Eiffel Tower is in Paris"));
    }

    #[test]
    fn test_knowledge_short_input_skips_partial() {
        let mut m = knowledge_matcher(vec![KnowledgeEntry {
            tags: vec!["rust language".into()],
            content: "Systems language by Mozilla.".into(),
        }]);

        // "rust" sits inside the tag, but four characters is too short
        let result = m.match_input(&parse("rust"));
        assert!(!result.matched);
        assert_ne!(result.kind, MatchKind::Knowledge);

        let result = m.match_input(&parse("what is rust language"));
        assert_eq!(result.kind, MatchKind::Knowledge);
    }

    #[test]
    fn test_misses_are_not_cached() {
        let mut m = matcher(vec![entry("hours", &["opening hours"], &["9 to 5"])]);
        let miss = m.match_input(&parse("quantum chromodynamics"));
        assert_eq!(miss, MatchResult::none());
        assert_eq!(m.cached_results(), 0);

        m.match_input(&parse("opening hours"));
        assert_eq!(m.cached_results(), 1);
        m.clear_cache();
        assert_eq!(m.cached_results(), 0);
    }

    #[test]
    fn test_entry_without_responses() {
        let mut m = matcher(vec![entry("mute", &["silence"], &[])]);
        let result = m.match_input(&parse("silence please"));
        assert!(result.matched);
        assert!(result.response.is_none());
    }
}
