// Per-run aggregation of extraction results across many (script, source)
// pairs. One Aggregator instance covers exactly one top-level input URL;
// callers either construct a fresh instance per URL or call
// `reset_for_new_url` before reuse. Cross-domain isolation is a caller
// contract, verified by tests rather than enforced at runtime.

use crate::report::{self, SummaryStats};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Findings for one fetched script, grouped by category.
#[derive(Debug, Clone)]
pub struct ScriptFindings {
    pub source_url: String,
    pub categories: BTreeMap<String, Vec<String>>,
}

/// Aggregated state for the current run.
///
/// `records` holds at most one entry per script URL, with findings
/// deduplicated per (script, category) pair. `categorized` is the merged
/// pre-dedup view that `flatten` collapses on demand.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: BTreeMap<String, ScriptFindings>,
    categorized: BTreeMap<String, Vec<String>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all per-run state. Must run before processing a new top-level
    /// URL when an instance is reused.
    pub fn reset_for_new_url(&mut self) {
        self.records.clear();
        self.categorized.clear();
    }

    /// Merge one script's extraction output into the run state. Repeated
    /// calls for the same script are tolerated; findings already recorded
    /// for that (script, category) pair are not duplicated.
    pub fn merge(
        &mut self,
        source_url: &str,
        script_url: &str,
        findings: BTreeMap<String, Vec<String>>,
    ) {
        let record = self
            .records
            .entry(script_url.to_string())
            .or_insert_with(|| ScriptFindings {
                source_url: source_url.to_string(),
                categories: BTreeMap::new(),
            });

        for (category, matches) in findings {
            let existing = record.categories.entry(category.clone()).or_default();
            for m in &matches {
                if !existing.contains(m) {
                    existing.push(m.clone());
                }
            }
            self.categorized.entry(category).or_default().extend(matches);
        }
    }

    /// Category -> deduplicated findings in first-seen order. Idempotent:
    /// repeated calls without an intervening `merge` return the same view.
    pub fn flatten(&self) -> BTreeMap<String, Vec<String>> {
        let mut flattened = BTreeMap::new();
        for (category, matches) in &self.categorized {
            let mut seen = HashSet::new();
            let unique: Vec<String> = matches
                .iter()
                .filter(|m| seen.insert(m.as_str()))
                .cloned()
                .collect();
            if !unique.is_empty() {
                flattened.insert(category.clone(), unique);
            }
        }
        flattened
    }

    /// Set union of all findings across categories.
    pub fn flat_list(&self) -> Vec<String> {
        self.categorized
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn stats(&self) -> SummaryStats {
        report::build_summary_stats(self)
    }

    pub fn records(&self) -> impl Iterator<Item = (&String, &ScriptFindings)> {
        self.records.iter()
    }

    pub fn script_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.categorized.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn findings(category: &str, items: &[&str]) -> BTreeMap<String, Vec<String>> {
        let mut map = BTreeMap::new();
        map.insert(
            category.to_string(),
            items.iter().map(|s| s.to_string()).collect(),
        );
        map
    }

    #[test]
    fn test_merge_same_script_twice_no_duplicates() {
        let mut agg = Aggregator::new();
        agg.merge(
            "https://example.com",
            "https://example.com/app.js",
            findings("api_endpoints", &["/api/users"]),
        );
        agg.merge(
            "https://example.com",
            "https://example.com/app.js",
            findings("api_endpoints", &["/api/users", "/api/orders"]),
        );

        let (_, record) = agg.records().next().unwrap();
        assert_eq!(
            record.categories["api_endpoints"],
            vec!["/api/users", "/api/orders"]
        );
    }

    #[test]
    fn test_flat_list_is_union() {
        let mut agg = Aggregator::new();
        agg.merge(
            "https://example.com",
            "https://example.com/a.js",
            findings("api_endpoints", &["/api/users"]),
        );
        agg.merge(
            "https://example.com",
            "https://example.com/b.js",
            findings("websockets", &["wss://example.com/feed", "/api/users"]),
        );

        let flat = agg.flat_list();
        assert_eq!(flat.len(), 2);
        assert!(flat.contains(&"/api/users".to_string()));
        assert!(flat.contains(&"wss://example.com/feed".to_string()));
    }
}
