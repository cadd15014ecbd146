//! Clause splitting for compound utterances.
//!
//! "Hello! How are you?" becomes ["Hello", "How are you"]. The orchestrator
//! only uses the split when every clause resolves locally.

use once_cell::sync::Lazy;
use regex::Regex;

static CLAUSE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.?!;]+").expect("static regex"));

/// Split on runs of sentence-ending punctuation, dropping empty clauses.
pub fn split(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    CLAUSE_END
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
