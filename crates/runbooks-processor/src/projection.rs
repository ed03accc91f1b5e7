//! Searchable-content projection (spec §4.C4): "a compact text derived from
//! (a) all headings, (b) all list items, (c) the first ~1 KiB of body, (d)
//! for structured payloads, flattened keys and string leaves to depth ≤ 3,
//! (e) for YAML-like text, top-level keys and values."

const BODY_PREFIX_BYTES: usize = 1024;
const MAX_FLATTEN_DEPTH: usize = 3;

/// Text-based formats (markdown/html/plain text, after normalization).
pub fn build_from_text(content: &str) -> String {
    let mut parts: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#') || line.starts_with("- ") || line.starts_with("* "))
        .map(str::to_string)
        .collect();

    let prefix: String = content.chars().take(BODY_PREFIX_BYTES).collect();
    parts.push(prefix);
    parts.join("\n")
}

/// Structured (JSON/XML-tree) formats: flattened keys and string leaves to
/// a bounded depth.
pub fn build_from_structured(value: &serde_json::Value) -> String {
    let mut out = Vec::new();
    flatten(value, 0, &mut out);
    out.join(" ")
}

fn flatten(value: &serde_json::Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_FLATTEN_DEPTH {
        return;
    }
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                out.push(key.clone());
                flatten(val, depth + 1, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                flatten(item, depth + 1, out);
            }
        }
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Bool(b) => out.push(b.to_string()),
        serde_json::Value::Null => {}
    }
}

/// YAML-like text: top-level keys and values only (not recursed).
pub fn build_from_yaml(value: &serde_yaml::Value) -> String {
    let mut out = Vec::new();
    if let serde_yaml::Value::Mapping(map) = value {
        for (key, val) in map {
            if let Some(key) = key.as_str() {
                out.push(key.to_string());
            }
            match val {
                serde_yaml::Value::String(s) => out.push(s.clone()),
                serde_yaml::Value::Number(n) => out.push(n.to_string()),
                serde_yaml::Value::Bool(b) => out.push(b.to_string()),
                _ => {}
            }
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_projection_keeps_headings_and_lists_plus_prefix() {
        let content = "# Title\nsome body text\n- step one\n- step two";
        let projection = build_from_text(content);
        assert!(projection.contains("# Title"));
        assert!(projection.contains("- step one"));
    }

    #[test]
    fn structured_projection_stops_at_depth_three() {
        let value = json!({"a": {"b": {"c": {"d": "too deep"}}}});
        let projection = build_from_structured(&value);
        assert!(!projection.contains("too deep"));
        assert!(projection.contains('a'));
    }

    #[test]
    fn yaml_projection_is_top_level_only() {
        let value: serde_yaml::Value = serde_yaml::from_str("name: svc\nnested:\n  x: 1").unwrap();
        let projection = build_from_yaml(&value);
        assert!(projection.contains("name"));
        assert!(projection.contains("svc"));
        assert!(!projection.contains('1'));
    }
}
