//! Format detection (spec §4.C4: "explicit hint if configured, else MIME,
//! else URL/extension, else sniff").

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Markdown,
    Html,
    Json,
    Yaml,
    Xml,
    PlainText,
}

impl Format {
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Some(Format::Markdown),
            "html" | "htm" => Some(Format::Html),
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "xml" => Some(Format::Xml),
            "text" | "plain" | "plaintext" => Some(Format::PlainText),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or(mime).trim();
        match mime {
            "text/markdown" | "text/x-markdown" => Some(Format::Markdown),
            "text/html" | "application/xhtml+xml" => Some(Format::Html),
            "application/json" | "text/json" => Some(Format::Json),
            "application/yaml" | "text/yaml" | "application/x-yaml" => Some(Format::Yaml),
            "application/xml" | "text/xml" => Some(Format::Xml),
            "text/plain" => Some(Format::PlainText),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(Format::Markdown),
            "html" | "htm" => Some(Format::Html),
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "xml" => Some(Format::Xml),
            "txt" | "rst" | "adoc" | "asciidoc" => Some(Format::PlainText),
            _ => None,
        }
    }

    /// Last-resort content sniff: cheap prefix checks, in the order the spec
    /// lists MIME/extension (JSON/XML are unambiguous on their first
    /// non-whitespace byte; HTML is detected by a doctype/tag opener;
    /// everything else falls back to plain text).
    pub fn sniff(body: &str) -> Self {
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Format::Json
        } else if trimmed.starts_with("<?xml") {
            Format::Xml
        } else if trimmed.starts_with("<!DOCTYPE html") || trimmed.starts_with("<html") {
            Format::Html
        } else if trimmed.starts_with('<') && trimmed.contains('>') {
            Format::Xml
        } else if trimmed.starts_with("# ") || trimmed.contains("\n## ") {
            Format::Markdown
        } else {
            Format::PlainText
        }
    }

    pub fn detect(
        hint: Option<&str>,
        mime: Option<&str>,
        path_or_url: &str,
        body: &str,
    ) -> Self {
        hint.and_then(Format::from_hint)
            .or_else(|| mime.and_then(Format::from_mime))
            .or_else(|| Format::from_path(path_or_url))
            .unwrap_or_else(|| Format::sniff(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_wins_over_everything_else() {
        let detected = Format::detect(Some("yaml"), Some("application/json"), "f.md", "{}");
        assert_eq!(detected, Format::Yaml);
    }

    #[test]
    fn falls_back_through_mime_then_extension_then_sniff() {
        assert_eq!(
            Format::detect(None, Some("text/html"), "f.md", "plain"),
            Format::Html
        );
        assert_eq!(Format::detect(None, None, "f.json", "plain"), Format::Json);
        assert_eq!(Format::detect(None, None, "f", "{\"a\":1}"), Format::Json);
        assert_eq!(Format::detect(None, None, "f", "just words"), Format::PlainText);
    }
}
