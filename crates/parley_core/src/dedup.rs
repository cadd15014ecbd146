//! Offline deduplication of the pattern record.
//!
//! Each entry gets a tag set derived from its surface patterns (regex syntax
//! stripped, alternations split) or, failing that, from its original query.
//! Learned entries whose sorted tag strings are near-identical are merged;
//! built-in entries are only annotated, never merged. Running it twice is a
//! no-op the second time.

use crate::error::{ChatError, Result};
use crate::learner::best_similar;
use crate::normalize;
use crate::pattern::{self, is_learned_name, PatternRecord};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub original: usize,
    pub merged: usize,
    #[serde(rename = "final")]
    pub final_count: usize,
}

/// Regex syntax replaced by spaces before tagging.
const REGEX_SYNTAX: &[&str] = &[r"\b", r"\", ".*", "(", ")"];

/// Sorted, space-joined tags for one record. Empty when nothing survives.
pub fn derive_normalized(name: &str, record: &PatternRecord) -> String {
    let mut keywords: BTreeSet<String> = BTreeSet::new();

    for pat in &record.patterns {
        let mut cleaned = pat.clone();
        for syntax in REGEX_SYNTAX {
            cleaned = cleaned.replace(syntax, " ");
        }
        for alternative in cleaned.split('|') {
            for tag in normalize::tagify(alternative) {
                keywords.extend(tag.split_whitespace().map(String::from));
            }
        }
    }

    if keywords.is_empty() {
        let query = record.original_query.as_deref().unwrap_or(name);
        for tag in normalize::tagify(query) {
            keywords.extend(tag.split_whitespace().map(String::from));
        }
    }

    keywords.into_iter().collect::<Vec<_>>().join(" ")
}

/// Merge near-duplicate learned records, preserving order of survivors.
pub fn deduplicate(
    records: Vec<(String, PatternRecord)>,
    threshold: f64,
) -> (Vec<(String, PatternRecord)>, DedupReport) {
    let original = records.len();
    let mut kept: Vec<(String, PatternRecord)> = Vec::with_capacity(original);
    let mut merged = 0;

    for (name, mut record) in records {
        let normalized = derive_normalized(&name, &record);
        if normalized.is_empty() {
            kept.push((name, record));
            continue;
        }

        let target = if is_learned_name(&name) {
            let candidates: Vec<(usize, &str)> = kept
                .iter()
                .enumerate()
                .filter(|(_, (n, _))| is_learned_name(n))
                .filter_map(|(i, (_, r))| r.normalized.as_deref().map(|form| (i, form)))
                .filter(|(_, form)| !form.is_empty())
                .collect();
            best_similar(&normalized, candidates.iter().map(|(_, f)| *f), threshold)
                .map(|(idx, _)| candidates[idx].0)
        } else {
            None
        };

        match target {
            Some(idx) => {
                let responses = &mut kept[idx].1.responses;
                for response in record.responses {
                    if !responses.contains(&response) {
                        responses.push(response);
                    }
                }
                merged += 1;
            }
            None => {
                record.tags = Some(normalized.split(' ').map(String::from).collect());
                record.normalized = Some(normalized);
                kept.push((name, record));
            }
        }
    }

    let report = DedupReport {
        original,
        merged,
        final_count: kept.len(),
    };
    (kept, report)
}

/// Deduplicate the record file at `path` in place.
pub fn deduplicate_file(path: &Path, threshold: f64) -> Result<DedupReport> {
    let records = pattern::read_records(path)?.ok_or_else(|| ChatError::PatternRecord {
        path: path.to_path_buf(),
        reason: "file not found".to_string(),
    })?;

    let (records, report) = deduplicate(records, threshold);
    pattern::write_records(path, &records)?;

    info!(
        "Deduplicated {}: {} merged, {} -> {} entries",
        path.display(),
        report.merged,
        report.original,
        report.final_count
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(patterns: &[&str], responses: &[&str]) -> PatternRecord {
        PatternRecord {
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            responses: responses.iter().map(|s| s.to_string()).collect(),
            priority: 9,
            tags: None,
            normalized: None,
            original_query: None,
        }
    }

    #[test]
    fn test_derive_normalized_strips_regex() {
        let r = record(&[r"\bweather\b.*\bparis\b"], &["x"]);
        assert_eq!(derive_normalized("learned_1", &r), "paris weather");

        let alt = record(&[r"\b(thank|thanks|thx)\b"], &["x"]);
        assert_eq!(derive_normalized("gratitude", &alt), "thank thanks thx");
    }

    #[test]
    fn test_derive_normalized_falls_back_to_query() {
        let mut r = record(&[], &["x"]);
        r.original_query = Some("Capital of France?".into());
        assert_eq!(derive_normalized("learned_2", &r), "capital france");
    }

    #[test]
    fn test_merges_learned_only() {
        let records = vec![
            ("greetings".to_string(), record(&["hello"], &["Hi"])),
            ("greetings_copy".to_string(), record(&["hello"], &["Hey"])),
            ("learned_a".to_string(), record(&[r"\bweather\b.*\bparis\b"], &["Sunny"])),
            ("learned_b".to_string(), record(&[r"\bparis\b.*\bweather\b"], &["Sunny", "Rainy"])),
            ("learned_c".to_string(), record(&[r"\brust\b.*\blifetimes\b"], &["Scopes"])),
        ];

        let (kept, report) = deduplicate(records, 0.9);
        assert_eq!(report, DedupReport { original: 5, merged: 1, final_count: 4 });

        let names: Vec<&str> = kept.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["greetings", "greetings_copy", "learned_a", "learned_c"]);
        assert_eq!(kept[2].1.responses, vec!["Sunny", "Rainy"]);
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            ("learned_a".to_string(), record(&[r"\bweather\b.*\bparis\b"], &["Sunny"])),
            ("learned_b".to_string(), record(&[r"\bparis\b.*\bweather\b"], &["Rainy"])),
        ];
        let (once, _) = deduplicate(records, 0.9);
        let (twice, report) = deduplicate(once.clone(), 0.9);
        assert_eq!(report.merged, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_deduplicate_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        let records = vec![
            ("learned_a".to_string(), record(&[r"\bweather\b.*\bparis\b"], &["Sunny"])),
            ("learned_b".to_string(), record(&[r"\bparis\b.*\bweather\b"], &["Rainy"])),
        ];
        pattern::write_records(&path, &records).unwrap();

        let report = deduplicate_file(&path, 0.9).unwrap();
        assert_eq!(report.final_count, 1);
        assert_eq!(pattern::read_records(&path).unwrap().unwrap().len(), 1);

        assert!(deduplicate_file(&dir.path().join("missing.json"), 0.9).is_err());
    }
}
