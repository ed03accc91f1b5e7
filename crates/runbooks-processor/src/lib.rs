//! Content processor (spec §4.C4): turns a raw upstream payload into
//! `(title, content, searchable_content, metadata)`.

pub mod config;
pub mod format;
pub mod xml_tree;
mod frontmatter;
mod markup;
mod projection;

use std::collections::HashMap;

use runbooks_core::{CoreError, CoreResult};

pub use config::ProcessorConfig;
pub use format::Format;

/// The output of [`process`], ready to drop into a [`runbooks_core::Document`].
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub title: String,
    pub content: String,
    pub searchable_content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub format: Format,
}

/// Normalizes a raw payload into a canonical document.
///
/// `hint` is an explicit format override (configured per adapter/source);
/// `mime` is a `Content-Type`-style hint; `path_or_url` supplies an
/// extension to fall back on; `title_hint` is used verbatim when the format
/// doesn't carry its own title (e.g. plain text).
pub fn process(
    raw: &str,
    hint: Option<&str>,
    mime: Option<&str>,
    path_or_url: &str,
    title_hint: Option<&str>,
    config: &ProcessorConfig,
) -> CoreResult<ProcessedDocument> {
    let size_bytes = raw.len() as u64;
    if size_bytes > config.size_cap_bytes {
        return Err(CoreError::PayloadTooLarge {
            size_bytes,
            cap_bytes: config.size_cap_bytes,
        });
    }

    let format = Format::detect(hint, mime, path_or_url, raw);
    let mut metadata = HashMap::new();

    let (content, searchable_content, title) = match format {
        Format::Markdown | Format::PlainText => {
            let (front, body) = frontmatter::extract(raw);
            if let Some(front) = front {
                merge_front_matter(&mut metadata, &front);
            }
            let normalized = if format == Format::Markdown {
                markup::normalize_markdown(body)
            } else {
                markup::normalize_plain_text(body)
            };
            let searchable = projection::build_from_text(&normalized);
            let title = title_hint
                .map(str::to_string)
                .or_else(|| first_heading(&normalized))
                .unwrap_or_else(|| title_from_path(path_or_url));
            (normalized, searchable, title)
        }
        Format::Html => {
            let normalized = markup::normalize_html(raw);
            let searchable = projection::build_from_text(&normalized);
            let title = title_hint
                .map(str::to_string)
                .or_else(|| first_heading(&normalized))
                .unwrap_or_else(|| title_from_path(path_or_url));
            (normalized, searchable, title)
        }
        Format::Json => {
            let tree: serde_json::Value = serde_json::from_str(raw).map_err(|err| CoreError::Parse {
                context: path_or_url.to_string(),
                message: err.to_string(),
            })?;
            metadata.insert("parsed".to_string(), tree.clone());
            let searchable = projection::build_from_structured(&tree);
            let content = serde_json::to_string_pretty(&tree).unwrap_or_else(|_| raw.to_string());
            let title = title_hint
                .map(str::to_string)
                .or_else(|| tree.get("title").and_then(|v| v.as_str()).map(str::to_string))
                .unwrap_or_else(|| title_from_path(path_or_url));
            (content, searchable, title)
        }
        Format::Yaml => {
            let parsed: serde_yaml::Value =
                serde_yaml::from_str(raw).map_err(|err| CoreError::Parse {
                    context: path_or_url.to_string(),
                    message: err.to_string(),
                })?;
            if let Some(map) = parsed.as_mapping() {
                let front = serde_yaml::Value::Mapping(map.clone());
                merge_front_matter(&mut metadata, &front);
            }
            let searchable = projection::build_from_yaml(&parsed);
            let title = title_hint
                .map(str::to_string)
                .unwrap_or_else(|| title_from_path(path_or_url));
            (raw.to_string(), searchable, title)
        }
        Format::Xml => {
            let tree = xml_tree::parse(raw).map_err(|err| CoreError::Parse {
                context: path_or_url.to_string(),
                message: err.to_string(),
            })?;
            metadata.insert("parsed".to_string(), tree.clone());
            let searchable = projection::build_from_structured(&tree);
            let normalized = markup::normalize_html(raw);
            let title = title_hint
                .map(str::to_string)
                .or_else(|| tree.get("title").and_then(|v| v.as_str()).map(str::to_string))
                .unwrap_or_else(|| title_from_path(path_or_url));
            (normalized, searchable, title)
        }
    };

    Ok(ProcessedDocument {
        title,
        content,
        searchable_content,
        metadata,
        format,
    })
}

fn merge_front_matter(metadata: &mut HashMap<String, serde_json::Value>, front: &serde_yaml::Value) {
    if let Some(author) = front.get("author").and_then(|v| v.as_str()) {
        metadata.insert("author".to_string(), serde_json::Value::String(author.to_string()));
    }
    if let Some(tags) = front.get("tags") {
        if let Ok(value) = serde_json::to_value(tags) {
            metadata.insert("tags".to_string(), value);
        }
    }
}

fn first_heading(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.trim_start().starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|s| !s.is_empty())
}

fn title_from_path(path_or_url: &str) -> String {
    path_or_url
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path_or_url)
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(path_or_url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processes_markdown_with_front_matter() {
        let raw = "---\nauthor: jill\ntags: [ops]\n---\n# Incident Response\nRestart the service.";
        let doc = process(raw, None, None, "runbook.md", None, &ProcessorConfig::default()).unwrap();
        assert_eq!(doc.title, "Incident Response");
        assert_eq!(
            doc.metadata.get("author").and_then(|v| v.as_str()),
            Some("jill")
        );
        assert!(doc.searchable_content.contains("# Incident Response"));
    }

    #[test]
    fn processes_html_stripping_scripts() {
        let raw = "<html><body><script>evil()</script><h1>Title</h1><p>body text</p></body></html>";
        let doc = process(raw, None, Some("text/html"), "page", None, &ProcessorConfig::default()).unwrap();
        assert!(!doc.content.contains("evil"));
        assert_eq!(doc.title, "Title");
    }

    #[test]
    fn processes_json_keeping_parsed_tree() {
        let raw = r#"{"title": "Disk Full", "steps": ["check df -h", "clear logs"]}"#;
        let doc = process(raw, None, Some("application/json"), "alert.json", None, &ProcessorConfig::default())
            .unwrap();
        assert_eq!(doc.title, "Disk Full");
        assert!(doc.metadata.contains_key("parsed"));
        assert!(doc.searchable_content.contains("check df -h"));
    }

    #[test]
    fn rejects_oversized_payloads() {
        let config = ProcessorConfig { size_cap_bytes: 4 };
        let err = process("way too long", None, None, "f.txt", None, &config).unwrap_err();
        assert_eq!(err.code(), "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn falls_back_to_filename_title() {
        let doc = process("just body text, no heading", None, None, "notes/db-outage.txt", None, &ProcessorConfig::default())
            .unwrap();
        assert_eq!(doc.title, "db-outage");
    }
}
