// Mermaid flowchart generation from detailed report snapshots. The diagram
// is budget-bounded: renderers choke past a few hundred edges, so every
// appended line is checked against the edge and text limits and high-value
// categories are laid out first.

use crate::priority::{self, CategoryTiers, TIER_HIGH, TIER_LOW};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

pub const DEFAULT_MAX_EDGES: usize = 450;
pub const DEFAULT_MAX_TEXT_SIZE: usize = 50_000;

const LABEL_MAX_LEN: usize = 50;
const CATEGORY_CAP_EARLY: usize = 15;
const CATEGORY_CAP_LATE: usize = 8;
const FINDING_CAP_HIGH: usize = 8;
const FINDING_CAP_NORMAL: usize = 5;
const FINDING_CAP_TIGHT: usize = 3;

/// Findings for one domain, re-keyed from the per-script hierarchy.
#[derive(Debug, Clone, Default)]
pub struct DomainGroup {
    pub source_url: String,
    pub categories: BTreeMap<String, Vec<String>>,
}

/// Picks the first repaired snapshot that actually carries the detailed
/// hierarchy. Older runs may have appended stats or flat views to the same
/// file.
pub fn first_detailed_snapshot(values: &[Value]) -> Option<&Value> {
    values.iter().find(|v| v.get("contents_by_source").is_some())
}

/// Flattens a detailed snapshot to domain -> category -> findings, dropping
/// the script layer. Findings are deduplicated per category in first-seen
/// order.
pub fn reorganize_by_domain(snapshot: &Value) -> BTreeMap<String, DomainGroup> {
    let mut grouped: BTreeMap<String, DomainGroup> = BTreeMap::new();
    let mut seen: HashMap<(String, String), HashSet<String>> = HashMap::new();

    let Some(by_source) = snapshot.get("contents_by_source").and_then(Value::as_object) else {
        return grouped;
    };

    for (source_url, source_data) in by_source {
        let Some(domain) = crate::extract_domain(source_url) else {
            debug!("skipping source with unparseable url: {source_url}");
            continue;
        };

        let group = grouped.entry(domain.clone()).or_insert_with(|| DomainGroup {
            source_url: source_url.clone(),
            categories: BTreeMap::new(),
        });

        let Some(js_files) = source_data.get("js_files").and_then(Value::as_object) else {
            continue;
        };
        for js_data in js_files.values() {
            let Some(categories) = js_data.get("categories").and_then(Value::as_object) else {
                continue;
            };
            for (category, findings) in categories {
                let Some(findings) = findings.as_array() else {
                    continue;
                };
                if findings.is_empty() {
                    continue;
                }
                let key = (domain.clone(), category.clone());
                let seen_here = seen.entry(key).or_default();
                let list = group.categories.entry(category.clone()).or_default();
                for finding in findings.iter().filter_map(Value::as_str) {
                    if seen_here.insert(finding.to_string()) {
                        list.push(finding.to_string());
                    }
                }
            }
        }
    }

    grouped
}

/// Budget-bounded Mermaid builder. One builder produces one diagram.
pub struct FlowchartBuilder {
    max_edges: usize,
    max_text_size: usize,
    tiers: CategoryTiers,
}

impl Default for FlowchartBuilder {
    fn default() -> Self {
        Self {
            max_edges: DEFAULT_MAX_EDGES,
            max_text_size: DEFAULT_MAX_TEXT_SIZE,
            tiers: CategoryTiers::default(),
        }
    }
}

impl FlowchartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_edges: usize, max_text_size: usize) -> Self {
        Self {
            max_edges,
            max_text_size,
            ..Self::default()
        }
    }

    pub fn with_tiers(mut self, tiers: CategoryTiers) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn build(&self, grouped: &BTreeMap<String, DomainGroup>) -> Flowchart {
        let mut state = BuildState::new(self.max_edges, self.max_text_size);

        state.push_node("flowchart LR");
        state.push_node("    START([Website Map])");
        state.push_node("");
        state.push_node("    %% Styling");
        state.push_node(
            "    classDef domainStyle fill:#e3f2fd,stroke:#1976d2,stroke-width:3px,color:#000",
        );
        state.push_node(
            "    classDef categoryStyle fill:#f3e5f5,stroke:#7b1fa2,stroke-width:2px,color:#000",
        );
        state.push_node(
            "    classDef endpointStyle fill:#fff3e0,stroke:#f57c00,stroke-width:2px,color:#000",
        );
        state.push_node(
            "    classDef highPriority fill:#ffebee,stroke:#d32f2f,stroke-width:3px,color:#000",
        );
        state.push_node("");

        'domains: for (domain, group) in grouped {
            let domain_id = state.unique_id(&format!("domain_{domain}"));
            if !state.push_node(&format!("    {domain_id}[\"{}\"]", clean_label(domain))) {
                break;
            }
            if !state.push_edge(&format!("    START --> {domain_id}")) {
                break;
            }
            state.domain_nodes.push(domain_id.clone());

            // Tier first, then descending finding count.
            let mut sorted: Vec<(&String, &Vec<String>)> = group
                .categories
                .iter()
                .filter(|(_, findings)| !findings.is_empty())
                .collect();
            sorted.sort_by_key(|(category, findings)| {
                (self.tiers.tier_of(category), usize::MAX - findings.len())
            });

            let category_cap = if state.text_size < self.max_text_size * 3 / 10 {
                CATEGORY_CAP_EARLY
            } else {
                CATEGORY_CAP_LATE
            };

            for (category, findings) in sorted.iter().take(category_cap) {
                let tier = self.tiers.tier_of(category);
                if tier == TIER_LOW && state.text_size > self.max_text_size * 6 / 10 {
                    continue;
                }

                let cat_id = state.unique_id(&format!("cat_{category}_{domain}"));
                if !state.push_node(&format!(
                    "    {cat_id}[\"{}\"]",
                    clean_label(&title_case(category))
                )) {
                    break;
                }
                if !state.push_edge(&format!("    {domain_id} --> {cat_id}")) {
                    break;
                }
                state.category_nodes.push(cat_id.clone());

                let mut finding_cap = if tier == TIER_HIGH {
                    FINDING_CAP_HIGH
                } else {
                    FINDING_CAP_NORMAL
                };
                if state.text_size > self.max_text_size / 2 {
                    finding_cap = FINDING_CAP_TIGHT;
                }

                let shown = prioritize_findings(findings, finding_cap);
                for finding in &shown {
                    let node_id = state.unique_id(&format!("ep_{category}_{domain}"));
                    if !state.push_node(&format!("    {node_id}[\"{}\"]", clean_label(finding))) {
                        break;
                    }
                    if !state.push_edge(&format!("    {cat_id} --> {node_id}")) {
                        break;
                    }
                    if tier == TIER_HIGH {
                        state.high_priority_nodes.push(node_id);
                    } else {
                        state.finding_nodes.push(node_id);
                    }
                    if state.at_limit() {
                        break;
                    }
                }

                if findings.len() > shown.len() {
                    let more_id = state.unique_id(&format!("more_{category}_{domain}"));
                    let remaining = findings.len() - shown.len();
                    if state.push_node(&format!("    {more_id}[\"...+{remaining} more\"]")) {
                        state.push_edge(&format!("    {cat_id} --> {more_id}"));
                        state.category_nodes.push(more_id);
                    }
                }

                if state.at_limit() {
                    break;
                }
            }

            if sorted.len() > category_cap {
                let more_id = state.unique_id(&format!("more_cats_{domain}"));
                let remaining = sorted.len() - category_cap;
                if state.push_node(&format!(
                    "    {more_id}[\"...+{remaining} more categories\"]"
                )) {
                    state.push_edge(&format!("    {domain_id} --> {more_id}"));
                    state.category_nodes.push(more_id);
                }
            }

            if state.at_limit() {
                break 'domains;
            }
        }

        let truncated = state.at_limit();
        if truncated {
            let mut warning = String::from("Showing prioritized results only");
            if state.edge_count >= state.max_edges {
                warning.push_str(&format!("<br/>Edge limit: {}", state.max_edges));
            }
            if state.text_size >= state.max_text_size {
                warning.push_str("<br/>Text size limit reached");
            }
            // The warning must appear even with no edge budget left, so its
            // text is checked but its root edge is best-effort.
            if state.push_warning_node(&format!("    WARNING[\"{warning}\"]")) {
                state.push_edge("    START --> WARNING");
            }
        }

        state.push_node("");
        state.push_node("    %% Apply styles");
        for (nodes, class) in [
            (state.domain_nodes.clone(), "domainStyle"),
            (state.category_nodes.clone(), "categoryStyle"),
            (state.finding_nodes.clone(), "endpointStyle"),
            (state.high_priority_nodes.clone(), "highPriority"),
        ] {
            if !nodes.is_empty() {
                let line = format!("    class {} {class}", nodes.join(","));
                state.push_node(&line);
            }
        }

        Flowchart {
            text: state.lines.join("\n"),
            edge_count: state.edge_count,
            text_size: state.text_size,
            truncated,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flowchart {
    pub text: String,
    pub edge_count: usize,
    pub text_size: usize,
    pub truncated: bool,
}

struct BuildState {
    max_edges: usize,
    max_text_size: usize,
    edge_count: usize,
    text_size: usize,
    lines: Vec<String>,
    id_counters: HashMap<String, usize>,
    domain_nodes: Vec<String>,
    category_nodes: Vec<String>,
    finding_nodes: Vec<String>,
    high_priority_nodes: Vec<String>,
}

impl BuildState {
    fn new(max_edges: usize, max_text_size: usize) -> Self {
        Self {
            max_edges,
            max_text_size,
            edge_count: 0,
            text_size: 0,
            lines: Vec::new(),
            id_counters: HashMap::new(),
            domain_nodes: Vec::new(),
            category_nodes: Vec::new(),
            finding_nodes: Vec::new(),
            high_priority_nodes: Vec::new(),
        }
    }

    fn at_limit(&self) -> bool {
        self.edge_count >= self.max_edges || self.text_size >= self.max_text_size
    }

    fn push_node(&mut self, line: &str) -> bool {
        let cost = line.len() + 1;
        if self.text_size + cost > self.max_text_size {
            return false;
        }
        self.lines.push(line.to_string());
        self.text_size += cost;
        true
    }

    // Same text accounting as push_node; kept separate so the warning path
    // reads as deliberate at the call site.
    fn push_warning_node(&mut self, line: &str) -> bool {
        self.push_node(line)
    }

    fn push_edge(&mut self, line: &str) -> bool {
        if self.edge_count >= self.max_edges {
            return false;
        }
        let cost = line.len() + 1;
        if self.text_size + cost > self.max_text_size {
            return false;
        }
        self.lines.push(line.to_string());
        self.edge_count += 1;
        self.text_size += cost;
        true
    }

    /// Slugs the base and appends a numeric suffix on reuse, so repeated
    /// bases (one per finding under a category) stay distinct.
    fn unique_id(&mut self, base: &str) -> String {
        let mut slug = String::with_capacity(base.len());
        let mut last_underscore = true;
        for c in base.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c);
                last_underscore = false;
            } else if !last_underscore {
                slug.push('_');
                last_underscore = true;
            }
        }
        let slug = slug.trim_end_matches('_').to_string();
        let slug = if slug.is_empty() { "node".to_string() } else { slug };

        let counter = self.id_counters.entry(slug.clone()).or_insert(0);
        *counter += 1;
        if *counter == 1 {
            slug
        } else {
            format!("{slug}_{}", *counter - 1)
        }
    }
}

/// Stable sort by path tier, then the first `cap` survivors.
fn prioritize_findings(findings: &[String], cap: usize) -> Vec<String> {
    let mut ranked: Vec<&String> = findings.iter().collect();
    ranked.sort_by_key(|f| priority::finding_tier(f));
    ranked.into_iter().take(cap).cloned().collect()
}

/// Mermaid label escaping: brackets break node syntax and double quotes end
/// the label, so both are stripped before truncation.
fn clean_label(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '[' && *c != ']')
        .map(|c| if c == '"' { '\'' } else { c })
        .collect();
    if cleaned.chars().count() > LABEL_MAX_LEN {
        let head: String = cleaned.chars().take(LABEL_MAX_LEN - 3).collect();
        format!("{head}...")
    } else {
        cleaned
    }
}

fn title_case(category: &str) -> String {
    category
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
