// Output files are appended to across runs, so a report file on disk is
// usually a concatenation of JSON values rather than one valid document.
// Repair folds whatever is readable into a single array.

use serde_json::Value;
use tracing::warn;

/// Parses a string that may contain one JSON value, several concatenated
/// values, or trailing garbage. Every value that parses cleanly is kept;
/// parsing stops at the first invalid byte. Never fails.
pub fn repair_concatenated_json(raw: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut stream = serde_json::Deserializer::from_str(raw).into_iter::<Value>();
    while let Some(item) = stream.next() {
        match item {
            Ok(value) => values.push(value),
            Err(err) => {
                warn!("stopping json repair at offset {}: {err}", stream.byte_offset());
                break;
            }
        }
    }
    values
}

/// Like [`repair_concatenated_json`], but re-serializes the result as one
/// well-formed array document.
pub fn repair_to_array_string(raw: &str) -> String {
    let values = repair_concatenated_json(raw);
    serde_json::to_string_pretty(&Value::Array(values))
        .unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_becomes_one_element() {
        let values = repair_concatenated_json(r#"{"a": 1}"#);
        assert_eq!(values, vec![json!({"a": 1})]);
    }

    #[test]
    fn concatenated_objects_all_survive() {
        let values = repair_concatenated_json("{\"a\": 1}\n{\"b\": 2}{\"c\": 3}");
        assert_eq!(values.len(), 3);
        assert_eq!(values[1], json!({"b": 2}));
    }

    #[test]
    fn garbage_yields_empty() {
        assert!(repair_concatenated_json("not json at all").is_empty());
        assert!(repair_concatenated_json("").is_empty());
    }

    #[test]
    fn valid_prefix_survives_trailing_garbage() {
        let values = repair_concatenated_json("{\"a\": 1} oops {\"b\": 2}");
        assert_eq!(values, vec![json!({"a": 1})]);
    }

    #[test]
    fn array_string_is_parseable() {
        let repaired = repair_to_array_string("{\"a\": 1}{\"b\": 2}");
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed.len(), 2);
    }
}
