//! Front-matter extraction (spec §4.C4: "front-matter (author, tags) when
//! present").

use once_cell::sync::Lazy;
use regex::Regex;

static FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\s*\n(.*?)\n---\s*\n?").unwrap());

/// Splits a fenced `---\n…\n---` YAML front-matter block off the front of
/// `text`, returning the parsed mapping (if any) and the remaining body.
pub fn extract(text: &str) -> (Option<serde_yaml::Value>, &str) {
    match FRONT_MATTER.captures(text) {
        Some(caps) => {
            let yaml = &caps[1];
            let rest = &text[caps.get(0).unwrap().end()..];
            match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
                Ok(value) => (Some(value), rest),
                Err(err) => {
                    tracing::debug!(error = %err, "front-matter present but not valid YAML, skipping");
                    (None, text)
                }
            }
        }
        None => (None, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_author_and_tags() {
        let doc = "---\nauthor: jill\ntags: [ops, db]\n---\n# Body\ntext";
        let (front, rest) = extract(doc);
        let front = front.expect("front matter should parse");
        assert_eq!(front["author"].as_str(), Some("jill"));
        assert!(rest.trim_start().starts_with("# Body"));
    }

    #[test]
    fn absent_front_matter_leaves_text_untouched() {
        let doc = "# Just a heading\nbody";
        let (front, rest) = extract(doc);
        assert!(front.is_none());
        assert_eq!(rest, doc);
    }
}
