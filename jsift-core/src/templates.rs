// Pattern template loading. Templates are YAML mappings of
// category name -> list of regex patterns, supplied as opaque configuration.

use crate::error::{CoreError, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Metadata keys that may appear alongside categories in a template file.
/// These are never pattern categories.
const RESERVED_KEYS: [&str; 4] = ["info", "id", "variables", "requests"];

const MAX_CATEGORY_NAME_LEN: usize = 100;

/// A parsed template file: category name -> ordered pattern list.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    categories: BTreeMap<String, Vec<String>>,
}

impl TemplateSet {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(content)?;
        let mapping = match doc {
            Value::Mapping(m) => m,
            _ => {
                return Err(CoreError::Template(
                    "template root must be a mapping of category -> patterns".to_string(),
                ));
            }
        };

        let mut categories = BTreeMap::new();
        for (key, value) in mapping {
            let name = match key {
                Value::String(s) => s,
                other => {
                    warn!("Skipping non-string category key: {:?}", other);
                    continue;
                }
            };

            if RESERVED_KEYS.contains(&name.as_str()) {
                debug!("Skipping reserved template key: {}", name);
                continue;
            }
            if !is_valid_category_name(&name) {
                warn!("Skipping invalid category name: {:.50}", name);
                continue;
            }

            let patterns = match value {
                Value::Sequence(seq) => seq
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) if !s.trim().is_empty() => Some(s),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
                Value::String(s) => vec![s],
                other => {
                    warn!("Skipping category '{}' with non-list patterns: {:?}", name, other);
                    continue;
                }
            };

            if patterns.is_empty() {
                warn!("Category '{}' has no patterns, skipping", name);
                continue;
            }

            categories.insert(name, patterns);
        }

        debug!("Loaded {} template categories", categories.len());
        Ok(Self { categories })
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.categories.iter()
    }
}

/// Category names that look like stray regex fragments are rejected.
fn is_valid_category_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_CATEGORY_NAME_LEN {
        return false;
    }
    !name
        .chars()
        .any(|c| matches!(c, '(' | ')' | '\\' | '+' | '*' | '?' | '[' | ']'))
}
