// Priority tiers drive graph layout: tier 1 categories render first and
// get the largest per-node finding caps.

use std::collections::BTreeMap;

pub const TIER_HIGH: u8 = 1;
pub const TIER_MEDIUM: u8 = 2;
pub const TIER_LOW: u8 = 3;

const HIGH_PRIORITY_CATEGORIES: &[&str] = &[
    "admin_endpoints",
    "authentication_endpoints",
    "api_keys_tokens",
    "security_endpoints",
    "payment_endpoints",
    "api_endpoints",
    "user_management",
    "webhooks_callbacks",
    "external_apis",
];

const MEDIUM_PRIORITY_CATEGORIES: &[&str] = &[
    "ajax_endpoints",
    "http_api_calls",
    "graphql_endpoints",
    "websockets",
    "file_operations",
    "analytics_tracking",
];

const HIGH_PRIORITY_PATHS: &[&str] = &[
    "/admin", "/api/", "/auth", "/login", "/oauth", "/token", "/payment",
    "/billing", "/webhook", "/2fa", "/password", "/reset", "/verify",
];

const MEDIUM_PRIORITY_PATHS: &[&str] = &[
    "/ajax", "/graphql", "/rest", "/rpc", "/upload", "/download", "/user",
    "/profile", "/settings", "/config",
];

/// Category-to-tier mapping. The defaults cover the bundled template set;
/// callers with custom templates can override individual categories.
#[derive(Debug, Clone)]
pub struct CategoryTiers {
    tiers: BTreeMap<String, u8>,
}

impl Default for CategoryTiers {
    fn default() -> Self {
        let mut tiers = BTreeMap::new();
        for category in HIGH_PRIORITY_CATEGORIES {
            tiers.insert((*category).to_string(), TIER_HIGH);
        }
        for category in MEDIUM_PRIORITY_CATEGORIES {
            tiers.insert((*category).to_string(), TIER_MEDIUM);
        }
        Self { tiers }
    }
}

impl CategoryTiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, category: &str, tier: u8) {
        self.tiers.insert(category.to_string(), tier);
    }

    /// Unknown categories fall through to the lowest tier.
    pub fn tier_of(&self, category: &str) -> u8 {
        self.tiers.get(category).copied().unwrap_or(TIER_LOW)
    }
}

/// Scores an individual finding by path vocabulary. Used to pick which
/// findings survive a per-node cap.
pub fn finding_tier(finding: &str) -> u8 {
    let lower = finding.to_lowercase();
    if HIGH_PRIORITY_PATHS.iter().any(|p| lower.contains(p)) {
        TIER_HIGH
    } else if MEDIUM_PRIORITY_PATHS.iter().any(|p| lower.contains(p)) {
        TIER_MEDIUM
    } else {
        TIER_LOW
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tiers_cover_known_categories() {
        let tiers = CategoryTiers::default();
        assert_eq!(tiers.tier_of("api_endpoints"), TIER_HIGH);
        assert_eq!(tiers.tier_of("websockets"), TIER_MEDIUM);
        assert_eq!(tiers.tier_of("something_else"), TIER_LOW);
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut tiers = CategoryTiers::default();
        tiers.set("websockets", TIER_HIGH);
        assert_eq!(tiers.tier_of("websockets"), TIER_HIGH);
    }

    #[test]
    fn finding_tier_scores_by_path() {
        assert_eq!(finding_tier("/api/v1/users"), TIER_HIGH);
        assert_eq!(finding_tier("https://x.test/graphql"), TIER_MEDIUM);
        assert_eq!(finding_tier("/static/logo.png"), TIER_LOW);
    }
}
