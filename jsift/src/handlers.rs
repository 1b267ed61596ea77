use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use jsift_core::graph::{self, FlowchartBuilder};
use jsift_core::store::DomainStore;
use jsift_core::templates::TemplateSet;
use jsift_core::{extract_domain, report, Aggregator, Extractor};
use jsift_scanner::{script_links, Fetcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TEMPLATES: &str = include_str!("../templates/default.yaml");

// Helper functions shared by the scan and graph handlers

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line into a usable URL, adding a scheme if missing
pub fn parse_url_line(line: &str) -> Option<String> {
    match jsift_scanner::ensure_scheme(line) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("⚠️  Skipping invalid URL '{}'", line);
            None
        }
    }
}

/// Loads the template set from a user-supplied path or the bundled default.
pub fn load_templates(path: Option<&String>) -> Result<TemplateSet, String> {
    let templates = match path {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            TemplateSet::from_file(Path::new(expanded.as_ref()))
                .map_err(|e| format!("Failed to load templates from {}: {}", raw, e))?
        }
        None => TemplateSet::from_str(DEFAULT_TEMPLATES)
            .map_err(|e| format!("Bundled templates are invalid: {}", e))?,
    };

    if templates.is_empty() {
        return Err("Template set contains no usable categories".to_string());
    }
    Ok(templates)
}

fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(msg);
    pb
}

pub async fn handle_scan(sub_matches: &ArgMatches) {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let template_path = sub_matches.get_one::<String>("templates");
    let output_dir = sub_matches.get_one::<String>("output").unwrap();
    let timeout = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);

    let urls = match load_urls_from_source(url, hosts_file) {
        Ok(urls) => urls,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let templates = match load_templates(template_path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let extractor = Extractor::compile(&templates);
    if extractor.skipped_pattern_count() > 0 {
        println!(
            "{} {} template pattern(s) failed to compile and were skipped",
            "⚠".yellow(),
            extractor.skipped_pattern_count()
        );
    }

    let output_root = PathBuf::from(shellexpand::tilde(output_dir).as_ref());
    let fetcher = Fetcher::with_timeout(timeout);

    println!(
        "\n🔎 Scanning {} host(s) with {} categories\n",
        urls.len().to_string().cyan(),
        templates.len().to_string().cyan()
    );

    let mut cleared_domains: HashSet<String> = HashSet::new();
    let mut aggregator = Aggregator::new();

    for url in &urls {
        // One URL at a time; state never leaks between hosts.
        aggregator.reset_for_new_url();
        scan_one_url(
            url,
            &fetcher,
            &extractor,
            &mut aggregator,
            &output_root,
            &mut cleared_domains,
        )
        .await;
    }

    println!(
        "\n{} Scan complete. Reports written to {}",
        "✓".green().bold(),
        output_root.display().to_string().bright_white()
    );
}

async fn scan_one_url(
    url: &str,
    fetcher: &Fetcher,
    extractor: &Extractor,
    aggregator: &mut Aggregator,
    output_root: &Path,
    cleared_domains: &mut HashSet<String>,
) {
    let Some(domain) = extract_domain(url) else {
        eprintln!("✗ Could not extract domain from {}, skipping", url);
        return;
    };

    println!("{}", "━".repeat(60).bright_blue());
    println!("  {}", url.bright_white().bold());
    println!("{}", "━".repeat(60).bright_blue());

    let store = DomainStore::new(output_root, &domain);
    if cleared_domains.insert(domain.clone())
        && let Err(e) = store.clear()
    {
        eprintln!("✗ Failed to prepare output directory for {}: {}", domain, e);
        return;
    }

    let pb = spinner(format!("Fetching {}", url));
    let html = match fetcher.fetch(url).await {
        Ok(Some(body)) => body,
        Ok(None) => {
            pb.finish_and_clear();
            println!("{} No usable content from {}", "⚠".yellow(), url);
            write_reports(&store, aggregator);
            return;
        }
        Err(e) => {
            pb.finish_and_clear();
            eprintln!("✗ Failed to fetch {}: {}", url, e);
            write_reports(&store, aggregator);
            return;
        }
    };
    pb.finish_and_clear();

    let scripts = script_links(&html, url);
    println!(
        "{} Found {} script reference(s)",
        "→".blue(),
        scripts.len().to_string().cyan()
    );

    for (i, script_url) in scripts.iter().enumerate() {
        let pb = spinner(format!(
            "[{}/{}] {}",
            i + 1,
            scripts.len(),
            script_url
        ));
        match fetcher.fetch(script_url).await {
            Ok(Some(body)) => {
                let findings = extractor.extract(&body);
                if !findings.is_empty() {
                    debug!("{}: findings in {} categories", script_url, findings.len());
                    aggregator.merge(url, script_url, findings);
                }
            }
            Ok(None) => warn!("no usable content from {script_url}"),
            Err(e) => warn!("failed to fetch {script_url}: {e}"),
        }
        pb.finish_and_clear();
    }

    let flat = aggregator.flatten();
    let total: usize = flat.values().map(Vec::len).sum();
    if total > 0 {
        println!(
            "{} {} finding(s) across {} categories",
            "✓".green().bold(),
            total.to_string().cyan(),
            flat.len().to_string().cyan()
        );
    } else {
        println!("{} No findings for {}", "→".blue(), url);
    }

    write_reports(&store, aggregator);
}

/// All views are written even with zero findings: empty collections mark a
/// domain as processed, which is distinct from never having been scanned.
fn write_reports(store: &DomainStore, aggregator: &Aggregator) {
    if let Err(e) = store.append_found_txt(&aggregator.flatten()) {
        eprintln!("✗ Failed to write findings file: {}", e);
    }

    let detailed = report::build_detailed_report(aggregator);
    let flat = report::build_flat_records(aggregator);
    let stats = aggregator.stats();

    for (path, result) in [
        (
            store.detailed_path(),
            store.append_json(&store.detailed_path(), &detailed),
        ),
        (
            store.flat_path(),
            store.append_json(&store.flat_path(), &flat),
        ),
        (
            store.stats_path(),
            store.append_json(&store.stats_path(), &stats),
        ),
    ] {
        match result {
            Ok(()) => println!(
                "{} Saved {}",
                "✓".green(),
                path.display().to_string().bright_white()
            ),
            Err(e) => eprintln!("✗ Failed to write {}: {}", path.display(), e),
        }
    }
}

pub fn handle_graph(sub_matches: &ArgMatches) {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let output_dir = sub_matches.get_one::<String>("output").unwrap();
    let max_edges = *sub_matches.get_one::<usize>("max-edges").unwrap();
    let max_text_size = *sub_matches.get_one::<usize>("max-text-size").unwrap();

    let urls = match load_urls_from_source(url, hosts_file) {
        Ok(urls) => urls,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let output_root = PathBuf::from(shellexpand::tilde(output_dir).as_ref());
    let builder = FlowchartBuilder::with_limits(max_edges, max_text_size);

    let domains: Vec<String> = {
        let mut seen = HashSet::new();
        urls.iter()
            .filter_map(|u| extract_domain(u))
            .filter(|d| seen.insert(d.clone()))
            .collect()
    };

    println!("\n📈 Building flowcharts for {} domain(s)\n", domains.len());

    for domain in &domains {
        let store = DomainStore::new(&output_root, domain);
        match build_domain_flowchart(&store, &builder) {
            Ok(Some(chart)) => {
                println!(
                    "{} {} ({} edges{})",
                    "✓".green().bold(),
                    store.flowchart_path().display().to_string().bright_white(),
                    chart.edge_count.to_string().cyan(),
                    if chart.truncated { ", truncated" } else { "" }
                );
            }
            Ok(None) => {
                println!("{} No scan data for {}, skipping", "→".blue(), domain);
            }
            Err(e) => {
                eprintln!("✗ Failed to build flowchart for {}: {}", domain, e);
            }
        }
    }
}

/// Reads the appended detailed report file, repairs it into an array of
/// snapshots, and renders the first usable one.
pub fn build_domain_flowchart(
    store: &DomainStore,
    builder: &FlowchartBuilder,
) -> Result<Option<jsift_core::Flowchart>, String> {
    let path = store.detailed_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(format!("{}: {}", path.display(), e)),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let snapshots = jsift_core::repair::repair_concatenated_json(&raw);
    let Some(snapshot) = graph::first_detailed_snapshot(&snapshots) else {
        return Ok(None);
    };

    let grouped = graph::reorganize_by_domain(snapshot);
    let chart = builder.build(&grouped);
    store
        .write_flowchart(&chart.text)
        .map_err(|e| e.to_string())?;
    Ok(Some(chart))
}
