use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

// Bundlers inject script URLs from string literals as often as from tags,
// so DOM parsing alone misses most of them.
fn js_literal_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::RegexBuilder::new(r#"["']([^"']*\.js[^"']*)["']"#)
            .case_insensitive(true)
            .build()
            .expect("script literal regex is valid")
    })
}

/// Collects script URLs referenced by a page: `<script src>` attributes
/// first, then quoted `.js` string literals anywhere in the document.
/// Relative references are resolved against `base_url`; malformed ones are
/// skipped. The result is deduplicated in first-seen order.
pub fn script_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        debug!("unparseable base url: {base_url}");
        return Vec::new();
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut links: Vec<String> = Vec::new();

    let document = Html::parse_document(html);
    let selector = Selector::parse("script[src]").expect("static selector is valid");
    for element in document.select(&selector) {
        if let Some(src) = element.value().attr("src")
            && let Some(resolved) = resolve(&base, src)
            && seen.insert(resolved.clone())
        {
            links.push(resolved);
        }
    }

    for caps in js_literal_re().captures_iter(html) {
        let raw = &caps[1];
        if let Some(resolved) = resolve(&base, raw)
            && seen.insert(resolved.clone())
        {
            links.push(resolved);
        }
    }

    links
}

/// Unescapes JSON-style slashes and quotes, then resolves against the base.
fn resolve(base: &Url, raw: &str) -> Option<String> {
    let cleaned = raw
        .replace("\\/", "/")
        .replace("\\\"", "\"")
        .replace("\\'", "'");

    if cleaned.is_empty() || cleaned.contains('\\') {
        debug!("skipping malformed script reference: {raw}");
        return None;
    }

    let resolved = if cleaned.starts_with("//") {
        Url::parse(&format!("https:{cleaned}")).ok()?
    } else if cleaned.starts_with("http://") || cleaned.starts_with("https://") {
        Url::parse(&cleaned).ok()?
    } else {
        base.join(&cleaned).ok()?
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com/app/";

    #[test]
    fn test_script_tags_are_collected() {
        let html = r#"<html><head>
            <script src="/static/main.js"></script>
            <script src="https://cdn.example.net/lib.js"></script>
        </head></html>"#;
        let links = script_links(html, BASE);
        assert_eq!(
            links,
            vec![
                "https://example.com/static/main.js",
                "https://cdn.example.net/lib.js"
            ]
        );
    }

    #[test]
    fn test_quoted_literals_are_collected() {
        let html = r#"<script>loadChunk("chunks/vendor.js");</script>"#;
        let links = script_links(html, BASE);
        assert_eq!(links, vec!["https://example.com/app/chunks/vendor.js"]);
    }

    #[test]
    fn test_escaped_slashes_are_unescaped() {
        let html = r#"<script>var cfg = {"bundle": "\/assets\/app.js"};</script>"#;
        let links = script_links(html, BASE);
        assert_eq!(links, vec!["https://example.com/assets/app.js"]);
    }

    #[test]
    fn test_protocol_relative_gets_https() {
        let html = r#"<script src="//cdn.example.net/lib.js"></script>"#;
        let links = script_links(html, BASE);
        assert_eq!(links, vec!["https://cdn.example.net/lib.js"]);
    }

    #[test]
    fn test_duplicates_collapse_in_first_seen_order() {
        let html = r#"
            <script src="/a.js"></script>
            <script>preload("/a.js"); preload("/b.js");</script>
        "#;
        let links = script_links(html, BASE);
        assert_eq!(
            links,
            vec!["https://example.com/a.js", "https://example.com/b.js"]
        );
    }

    #[test]
    fn test_malformed_references_are_skipped() {
        let html = r#"<script>bad("C:\\builds\\weird.js"); ok("/fine.js");</script>"#;
        let links = script_links(html, BASE);
        assert_eq!(links, vec!["https://example.com/fine.js"]);
    }

    #[test]
    fn test_unparseable_base_yields_nothing() {
        let html = r#"<script src="/a.js"></script>"#;
        assert!(script_links(html, "not a url").is_empty());
    }
}
