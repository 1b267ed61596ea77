// Serialization views over aggregator state. All three views are derived
// without mutating the aggregator and can be produced at any point in a run.

use crate::aggregate::Aggregator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const SCHEMA_VERSION: &str = "1.0";
const TOP_CATEGORIES_LIMIT: usize = 10;

fn extraction_date() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// Detailed hierarchy view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedReport {
    pub metadata: DetailedMetadata,
    pub contents_by_source: BTreeMap<String, SourceEntry>,
    pub contents_summary: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedMetadata {
    pub total_sources: usize,
    pub total_js_files: usize,
    pub total_endpoints: usize,
    pub extraction_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub source_url: String,
    pub js_files: BTreeMap<String, ScriptEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub js_url: String,
    pub categories: BTreeMap<String, Vec<String>>,
}

pub fn build_detailed_report(agg: &Aggregator) -> DetailedReport {
    let mut contents_by_source: BTreeMap<String, SourceEntry> = BTreeMap::new();
    let mut contents_summary: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut summary_seen: BTreeMap<String, HashSet<String>> = BTreeMap::new();

    for (js_url, record) in agg.records() {
        let source = contents_by_source
            .entry(record.source_url.clone())
            .or_insert_with(|| SourceEntry {
                source_url: record.source_url.clone(),
                js_files: BTreeMap::new(),
            });
        source.js_files.insert(
            js_url.clone(),
            ScriptEntry {
                js_url: js_url.clone(),
                categories: record.categories.clone(),
            },
        );

        for (category, findings) in &record.categories {
            let seen = summary_seen.entry(category.clone()).or_default();
            let list = contents_summary.entry(category.clone()).or_default();
            for finding in findings {
                if seen.insert(finding.clone()) {
                    list.push(finding.clone());
                }
            }
        }
    }

    let total_js_files = contents_by_source.values().map(|s| s.js_files.len()).sum();
    let total_endpoints = contents_summary.values().map(|f| f.len()).sum();

    DetailedReport {
        metadata: DetailedMetadata {
            total_sources: contents_by_source.len(),
            total_js_files,
            total_endpoints,
            extraction_date: extraction_date(),
        },
        contents_by_source,
        contents_summary,
    }
}

// ---------------------------------------------------------------------------
// Flat record view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRecords {
    pub metadata: FlatMetadata,
    pub endpoints: Vec<FlatRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatMetadata {
    pub total_records: usize,
    pub extraction_date: String,
    pub schema_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRecord {
    pub id: usize,
    pub endpoint: String,
    pub category: String,
    pub source_url: String,
    pub js_url: String,
    pub extraction_date: String,
}

/// Flat records with stable 1-based ids assigned in record iteration order.
pub fn build_flat_records(agg: &Aggregator) -> FlatRecords {
    let date = extraction_date();
    let mut endpoints = Vec::new();
    let mut next_id = 1;

    for (js_url, record) in agg.records() {
        for (category, findings) in &record.categories {
            for finding in findings {
                endpoints.push(FlatRecord {
                    id: next_id,
                    endpoint: finding.clone(),
                    category: category.clone(),
                    source_url: record.source_url.clone(),
                    js_url: js_url.clone(),
                    extraction_date: date.clone(),
                });
                next_id += 1;
            }
        }
    }

    FlatRecords {
        metadata: FlatMetadata {
            total_records: endpoints.len(),
            extraction_date: date,
            schema_version: SCHEMA_VERSION.to_string(),
        },
        endpoints,
    }
}

// ---------------------------------------------------------------------------
// Summary stats view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    pub sources: BTreeMap<String, SourceStats>,
    pub categories: BTreeMap<String, usize>,
    pub overall: OverallStats,
    pub metadata: StatsMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceStats {
    pub js_files_count: usize,
    pub total_endpoints: usize,
    pub categories: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_sources: usize,
    pub total_js_files: usize,
    pub total_endpoints: usize,
    pub unique_endpoints: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsMetadata {
    pub extraction_date: String,
    pub top_categories: Vec<(String, usize)>,
}

pub fn build_summary_stats(agg: &Aggregator) -> SummaryStats {
    let mut sources: BTreeMap<String, SourceStats> = BTreeMap::new();
    let mut category_totals: BTreeMap<String, usize> = BTreeMap::new();
    let mut unique_endpoints: BTreeSet<String> = BTreeSet::new();

    for (_js_url, record) in agg.records() {
        let source = sources.entry(record.source_url.clone()).or_default();
        source.js_files_count += 1;

        for (category, findings) in &record.categories {
            source.total_endpoints += findings.len();
            *source.categories.entry(category.clone()).or_default() += findings.len();
            *category_totals.entry(category.clone()).or_default() += findings.len();
            unique_endpoints.extend(findings.iter().cloned());
        }
    }

    // Descending by total; the sort is stable so ties keep map iteration order.
    let mut top_categories: Vec<(String, usize)> = category_totals
        .iter()
        .map(|(c, n)| (c.clone(), *n))
        .collect();
    top_categories.sort_by(|a, b| b.1.cmp(&a.1));
    top_categories.truncate(TOP_CATEGORIES_LIMIT);

    let overall = OverallStats {
        total_sources: sources.len(),
        total_js_files: sources.values().map(|s| s.js_files_count).sum(),
        total_endpoints: category_totals.values().sum(),
        unique_endpoints: unique_endpoints.len(),
    };

    SummaryStats {
        sources,
        categories: category_totals,
        overall,
        metadata: StatsMetadata {
            extraction_date: extraction_date(),
            top_categories,
        },
    }
}
