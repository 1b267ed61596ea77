use jsift_core::report;
use jsift_core::Aggregator;
use std::collections::{BTreeMap, BTreeSet};

fn findings(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(category, items)| {
            (
                category.to_string(),
                items.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}

#[test]
fn test_flatten_is_idempotent() {
    let mut agg = Aggregator::new();
    agg.merge(
        "https://example.com",
        "https://example.com/app.js",
        findings(&[("api_endpoints", &["/api/users", "/api/orders"][..])]),
    );

    let first = agg.flatten();
    let second = agg.flatten();
    assert_eq!(first, second);
}

#[test]
fn test_repeated_merges_do_not_duplicate() {
    let mut agg = Aggregator::new();
    for _ in 0..3 {
        agg.merge(
            "https://example.com",
            "https://example.com/app.js",
            findings(&[("api_endpoints", &["/api/users"][..])]),
        );
    }

    let flat = agg.flatten();
    assert_eq!(flat["api_endpoints"], vec!["/api/users"]);
    assert_eq!(agg.script_count(), 1);
}

#[test]
fn test_flatten_preserves_first_seen_order() {
    let mut agg = Aggregator::new();
    agg.merge(
        "https://example.com",
        "https://example.com/a.js",
        findings(&[("api_endpoints", &["/api/users", "/api/orders"][..])]),
    );
    agg.merge(
        "https://example.com",
        "https://example.com/b.js",
        findings(&[("api_endpoints", &["/api/orders", "/api/items"][..])]),
    );

    let flat = agg.flatten();
    assert_eq!(
        flat["api_endpoints"],
        vec!["/api/users", "/api/orders", "/api/items"]
    );
}

#[test]
fn test_reset_isolates_urls() {
    let mut agg = Aggregator::new();
    agg.merge(
        "https://one.example",
        "https://one.example/app.js",
        findings(&[("api_endpoints", &["/api/one"][..])]),
    );

    agg.reset_for_new_url();
    assert!(agg.is_empty());

    agg.merge(
        "https://two.example",
        "https://two.example/app.js",
        findings(&[("api_endpoints", &["/api/two"][..])]),
    );

    let flat = agg.flatten();
    assert_eq!(flat["api_endpoints"], vec!["/api/two"]);
}

#[test]
fn test_flat_list_unions_all_categories() {
    let mut agg = Aggregator::new();
    agg.merge(
        "https://example.com",
        "https://example.com/app.js",
        findings(&[
            ("api_endpoints", &["/api/users"][..]),
            ("websockets", &["wss://example.com/live", "/api/users"][..]),
        ]),
    );

    let list = agg.flat_list();
    assert_eq!(list.len(), 2);
    assert!(list.contains(&"/api/users".to_string()));
    assert!(list.contains(&"wss://example.com/live".to_string()));
}

#[test]
fn test_detailed_summary_agrees_with_flatten() {
    let mut agg = Aggregator::new();
    agg.merge(
        "https://example.com",
        "https://example.com/a.js",
        findings(&[("api_endpoints", &["/api/users", "/api/orders"][..])]),
    );
    agg.merge(
        "https://other.example",
        "https://other.example/b.js",
        findings(&[
            ("api_endpoints", &["/api/users"][..]),
            ("websockets", &["wss://other.example/live"][..]),
        ]),
    );

    let detailed = report::build_detailed_report(&agg);
    let flat = agg.flatten();

    let summary_keys: BTreeSet<_> = detailed.contents_summary.keys().collect();
    let flat_keys: BTreeSet<_> = flat.keys().collect();
    assert_eq!(summary_keys, flat_keys);

    for (category, members) in &flat {
        let summary: BTreeSet<_> = detailed.contents_summary[category].iter().collect();
        let flattened: BTreeSet<_> = members.iter().collect();
        assert_eq!(summary, flattened, "category {category} diverged");
    }

    assert_eq!(detailed.metadata.total_sources, 2);
    assert_eq!(detailed.metadata.total_js_files, 2);
}

#[test]
fn test_stats_track_raw_and_unique_counts() {
    let mut agg = Aggregator::new();
    agg.merge(
        "https://example.com",
        "https://example.com/a.js",
        findings(&[("api_endpoints", &["/api/users"][..])]),
    );
    agg.merge(
        "https://example.com",
        "https://example.com/b.js",
        findings(&[("api_endpoints", &["/api/users"][..])]),
    );

    let stats = agg.stats();
    // Raw counts keep the per-script duplicate; unique counts collapse it.
    assert_eq!(stats.overall.total_endpoints, 2);
    assert_eq!(stats.overall.unique_endpoints, 1);
    assert_eq!(stats.sources["https://example.com"].js_files_count, 2);
}
