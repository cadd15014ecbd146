//! Input normalization, tagging and validation.
//!
//! Two canonical forms come out of here:
//! - the *normalized* text (trim, case-fold, optional special-char strip,
//!   whitespace collapse), used as cache and match key;
//! - the *tags*, stop-word-filtered tokens used for set similarity and for
//!   the learned-pattern store.

use crate::config::InputSettings;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

static SPECIAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Substrings that reject an input outright when sanitization is on.
const DENYLIST: &[&str] = &["<script", "javascript:", "onerror="];

/// Filler words dropped by [`Normalizer::tagify`].
pub const STOP_WORDS: &[&str] = &[
    // articles
    "a", "an", "the",
    // auxiliaries
    "is", "are", "was", "were", "be", "been", "being",
    "do", "does", "did", "doing",
    "have", "has", "had", "having",
    // pronouns
    "i", "you", "he", "she", "it", "we", "they",
    "me", "him", "her", "us", "them", "my", "your",
    "his", "hers", "its", "our", "their",
    // prepositions
    "in", "on", "at", "to", "for", "of", "with",
    "by", "from", "about", "into", "through",
    "during", "before", "after", "above", "below",
    // conjunctions
    "and", "but", "or", "so", "yet", "nor", "though",
    // determiners and modals
    "this", "that", "these", "those",
    "can", "could", "will", "would", "should",
    "may", "might", "must",
    // filler
    "please", "just", "really", "very",
];

/// Structured form of one utterance. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInput {
    pub raw: String,
    pub normalized: String,
    pub tokens: Vec<String>,
    pub tags: BTreeSet<String>,
}

/// Why an input was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRejection {
    TooShort,
    TooLong,
    Unsafe,
}

impl fmt::Display for InputRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRejection::TooShort => write!(f, "Input too short"),
            InputRejection::TooLong => write!(f, "Input too long"),
            InputRejection::Unsafe => write!(f, "Invalid input detected"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    settings: InputSettings,
}

impl Normalizer {
    pub fn new(settings: InputSettings) -> Self {
        Self { settings }
    }

    /// Canonical comparable form. Idempotent.
    pub fn normalize(&self, raw: &str) -> String {
        let mut text = if self.settings.strip_whitespace {
            raw.trim().to_string()
        } else {
            raw.to_string()
        };

        if self.settings.convert_to_lowercase {
            text = text.to_lowercase();
        }

        if self.settings.remove_special_chars {
            text = SPECIAL_CHARS.replace_all(&text, "").into_owned();
        }

        let collapsed = WHITESPACE.replace_all(&text, " ");
        if self.settings.strip_whitespace {
            collapsed.trim().to_string()
        } else {
            collapsed.into_owned()
        }
    }

    /// Ordered, stop-word-filtered tags. Never empty for input with any
    /// non-whitespace character.
    pub fn tagify(&self, raw: &str) -> Vec<String> {
        tagify(raw)
    }

    /// Tags joined by single spaces; the stored "normalized" form of a
    /// learned entry.
    pub fn normalize_for_pattern(&self, raw: &str) -> String {
        tagify(raw).join(" ")
    }

    pub fn validate(&self, raw: &str) -> Result<(), InputRejection> {
        let len = raw.chars().count();
        if raw.is_empty() || len < self.settings.min_length {
            return Err(InputRejection::TooShort);
        }
        if len > self.settings.max_length {
            return Err(InputRejection::TooLong);
        }
        if self.settings.sanitize {
            let lowered = raw.to_lowercase();
            if DENYLIST.iter().any(|bad| lowered.contains(bad)) {
                return Err(InputRejection::Unsafe);
            }
        }
        Ok(())
    }

    pub fn parse(&self, raw: &str) -> ParsedInput {
        let normalized = self.normalize(raw);
        let tokens = normalized.split_whitespace().map(String::from).collect();
        let tags = tagify(raw).into_iter().collect();
        ParsedInput {
            raw: raw.to_string(),
            normalized,
            tokens,
            tags,
        }
    }
}

/// Configuration-independent tagging used by the matcher, learner and
/// deduplicator alike.
pub fn tagify(raw: &str) -> Vec<String> {
    let folded = raw.to_lowercase();
    let stripped = SPECIAL_CHARS.replace_all(&folded, "");

    let mut tags: Vec<String> = Vec::new();
    for token in stripped.split_whitespace() {
        if token.chars().count() <= 1 || STOP_WORDS.contains(&token) {
            continue;
        }
        if !tags.iter().any(|t| t == token) {
            tags.push(token.to_string());
        }
    }

    if tags.is_empty() {
        let fallback = WHITESPACE.replace_all(stripped.trim(), " ").into_owned();
        if !fallback.is_empty() {
            tags.push(fallback);
        } else if !folded.trim().is_empty() {
            tags.push(folded.trim().to_string());
        }
    }

    tags
}
