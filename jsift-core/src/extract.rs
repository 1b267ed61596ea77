// Pattern extraction engine: applies a compiled category -> pattern mapping
// to one text blob and returns filtered, deduplicated findings per category.

use crate::templates::TemplateSet;
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Matches longer than this are treated as noise (minified bundles, data URIs).
const MAX_MATCH_LEN: usize = 200;

/// Benign substrings that regularly show up in JS bundles but never point at
/// anything worth reviewing: XML namespaces, vendor legal links, framework
/// error-page URLs.
const DENYLIST: [&str; 14] = [
    "facebook.com/legal/license",
    "w3.org",
    "adobe.com",
    "macromedia.com",
    "xmlns",
    "xap/1.0",
    "math/mathml",
    "xlink",
    "namespace",
    "xml:lang",
    "errors/",
    "react.dev/errors",
    "invariant/",
    "selfxss",
];

const WEBSOCKET_MARKERS: [&str; 4] = ["ws://", "wss://", "websocket", "socket.io"];
const API_ENDPOINT_MARKERS: [&str; 4] = ["api", "rest", "graphql", "webhook"];
const API_DOMAIN_MARKERS: [&str; 4] = ["api.", "graph.", "maps.googleapis", "youtube.googleapis"];
const MIN_TOKEN_LEN: usize = 10;

/// Category names containing these words hold credential-like patterns where
/// case matters; everything else is matched case-insensitively.
const CASE_SENSITIVE_MARKERS: [&str; 4] = ["token", "key", "secret", "auth"];

struct CompiledCategory {
    name: String,
    patterns: Vec<Regex>,
}

/// A set of compiled per-category patterns, built once per run.
pub struct Extractor {
    categories: Vec<CompiledCategory>,
    skipped_patterns: usize,
}

impl Extractor {
    /// Compile a template set. Patterns that fail to compile are reported and
    /// skipped; remaining patterns in the same category still apply.
    pub fn compile(templates: &TemplateSet) -> Self {
        let mut categories = Vec::new();
        let mut skipped_patterns = 0;

        for (name, raw_patterns) in templates.iter() {
            let case_insensitive = !is_case_sensitive_category(name);
            let mut patterns = Vec::new();

            for raw in raw_patterns {
                match RegexBuilder::new(raw)
                    .case_insensitive(case_insensitive)
                    .multi_line(true)
                    .build()
                {
                    Ok(re) => patterns.push(re),
                    Err(e) => {
                        warn!("Invalid pattern in category '{}': {}", name, e);
                        skipped_patterns += 1;
                    }
                }
            }

            if !patterns.is_empty() {
                categories.push(CompiledCategory {
                    name: name.clone(),
                    patterns,
                });
            }
        }

        Self {
            categories,
            skipped_patterns,
        }
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn skipped_pattern_count(&self) -> usize {
        self.skipped_patterns
    }

    /// Run every category's patterns over one text blob. Returns
    /// category -> findings, deduplicated in first-seen order. Categories with
    /// no surviving findings are omitted.
    pub fn extract(&self, text: &str) -> BTreeMap<String, Vec<String>> {
        let mut results = BTreeMap::new();

        for category in &self.categories {
            let mut findings: Vec<String> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();

            for re in &category.patterns {
                for caps in re.captures_iter(text) {
                    let raw = if caps.len() > 1 {
                        // First non-empty capture group, per match.
                        (1..caps.len())
                            .filter_map(|i| caps.get(i))
                            .map(|m| m.as_str().trim())
                            .find(|s| !s.is_empty())
                    } else {
                        caps.get(0).map(|m| m.as_str().trim())
                    };

                    let Some(m) = raw else { continue };
                    if is_false_positive(m, &category.name) {
                        continue;
                    }
                    if seen.insert(m.to_string()) {
                        findings.push(m.to_string());
                    }
                }
            }

            if !findings.is_empty() {
                debug!("{}: {} findings", category.name, findings.len());
                results.insert(category.name.clone(), findings);
            }
        }

        results
    }
}

fn is_case_sensitive_category(name: &str) -> bool {
    let lower = name.to_lowercase();
    CASE_SENSITIVE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Category-agnostic checks first, then the per-category rules.
fn is_false_positive(m: &str, category: &str) -> bool {
    if m.is_empty() || m.len() > MAX_MATCH_LEN {
        return true;
    }

    let lower = m.to_lowercase();
    if DENYLIST.iter().any(|bad| lower.contains(bad)) {
        return true;
    }

    match category {
        "websockets" => !WEBSOCKET_MARKERS.iter().any(|w| lower.contains(w)),
        "api_endpoints" => {
            !API_ENDPOINT_MARKERS.iter().any(|w| lower.contains(w)) && !m.starts_with("/v")
        }
        "api_keys_tokens" => m.len() < MIN_TOKEN_LEN,
        "external_api_domains" => !API_DOMAIN_MARKERS.iter().any(|w| lower.contains(w)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_sensitive_category_detection() {
        assert!(is_case_sensitive_category("api_keys_tokens"));
        assert!(is_case_sensitive_category("authentication_endpoints"));
        assert!(is_case_sensitive_category("client_secrets"));
        assert!(!is_case_sensitive_category("api_endpoints"));
        assert!(!is_case_sensitive_category("websockets"));
    }

    #[test]
    fn test_denylist_rejects_namespaces() {
        assert!(is_false_positive("xmlns:xlink", "api_endpoints"));
        assert!(is_false_positive("http://www.w3.org/2000/svg", "api_endpoints"));
    }

    #[test]
    fn test_overlong_match_rejected() {
        let long = "a".repeat(201);
        assert!(is_false_positive(&long, "api_endpoints"));
    }

    #[test]
    fn test_websocket_rule() {
        assert!(!is_false_positive("wss://push.example.com/feed", "websockets"));
        assert!(is_false_positive("/static/app.js", "websockets"));
    }

    #[test]
    fn test_api_endpoint_rule() {
        assert!(!is_false_positive("/api/v1/users", "api_endpoints"));
        assert!(!is_false_positive("/v2/accounts", "api_endpoints"));
        assert!(is_false_positive("/images/logo.png", "api_endpoints"));
    }

    #[test]
    fn test_token_length_rule() {
        assert!(is_false_positive("abc123", "api_keys_tokens"));
        assert!(!is_false_positive("sk_live_abcdef1234567890", "api_keys_tokens"));
    }
}
