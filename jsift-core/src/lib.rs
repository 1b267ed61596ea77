pub mod aggregate;
pub mod error;
pub mod extract;
pub mod graph;
pub mod priority;
pub mod repair;
pub mod report;
pub mod store;
pub mod templates;

pub use aggregate::Aggregator;
pub use error::CoreError;
pub use extract::Extractor;
pub use graph::{Flowchart, FlowchartBuilder};
pub use priority::CategoryTiers;
pub use templates::TemplateSet;

use colored::Colorize;
use url::Url;

/// Extract the bare domain from a URL, stripping any `www.` prefix.
/// Returns `None` when the URL has no host (e.g. relative paths).
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let domain = host.strip_prefix("www.").unwrap_or(host);
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

pub fn print_banner() {
    println!(
        "{}",
        r#"
   _     _  __ _
  (_)___(_)/ _| |_
  | / __| | |_| __|
  | \__ \ |  _| |_
 _/ |___/_|_|  \__|
|__/
"#
        .bright_cyan()
    );
    println!(
        "  {} {}",
        "jsift".bright_white().bold(),
        env!("CARGO_PKG_VERSION").cyan()
    );
    println!("  {}\n", "For authorized security testing only.".yellow());
}
