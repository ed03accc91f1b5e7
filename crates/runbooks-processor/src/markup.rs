//! Markup-to-text normalization (spec §4.C4): strip scripts/styles/nav/
//! footer; collapse headings to `#…` lines; ordered/unordered lists to
//! bullet lines; inline code to backticks; block code to fenced. Provider
//! macro blocks (info/warning/note/tip/code/expand) are tagged with
//! bracketed markers, not dropped.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</\1>").unwrap());
static NAV_FOOTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(nav|footer|header)\b[^>]*>.*?</\1>").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<h([1-6])[^>]*>(.*?)</h\1>").unwrap());
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<li[^>]*>(.*?)</li>").unwrap());
static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<code[^>]*>(.*?)</code>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static MACRO_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\{(info|warning|note|tip|expand)(?::([^}]*))?\}(.*?)\{\1\}").unwrap()
});
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Converts an HTML fragment into the normalized text shape the spec
/// describes. Markdown/plain text pass through with only macro-block and
/// whitespace normalization, since they're already line-oriented.
pub fn normalize_html(html: &str) -> String {
    let mut text = html.to_string();
    text = SCRIPT_STYLE.replace_all(&text, "").into_owned();
    text = NAV_FOOTER.replace_all(&text, "").into_owned();
    text = CODE_BLOCK
        .replace_all(&text, |caps: &regex::Captures| {
            format!("\n```\n{}\n```\n", strip_tags(&caps[1]))
        })
        .into_owned();
    text = HEADING
        .replace_all(&text, |caps: &regex::Captures| {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("\n{} {}\n", "#".repeat(level), strip_tags(&caps[2]).trim())
        })
        .into_owned();
    text = LIST_ITEM
        .replace_all(&text, |caps: &regex::Captures| {
            format!("\n- {}", strip_tags(&caps[1]).trim())
        })
        .into_owned();
    text = INLINE_CODE
        .replace_all(&text, |caps: &regex::Captures| {
            format!("`{}`", strip_tags(&caps[1]))
        })
        .into_owned();
    text = ANY_TAG.replace_all(&text, "").into_owned();
    text = normalize_macro_blocks(&text);
    collapse_whitespace(&text)
}

/// Markdown/plain-text macro blocks use provider wiki-style `{info}…{info}`
/// fences; tag them as `[INFO] …` rather than dropping them.
pub fn normalize_macro_blocks(text: &str) -> String {
    MACRO_BLOCK
        .replace_all(text, |caps: &regex::Captures| {
            let kind = caps[1].to_ascii_uppercase();
            let body = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
            format!("\n[{kind}] {body}\n")
        })
        .into_owned()
}

fn strip_tags(fragment: &str) -> String {
    ANY_TAG.replace_all(fragment, "").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    let decoded = decode_entities(text);
    WHITESPACE_RUN.replace_all(&decoded, "\n\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

/// Markdown ordered/unordered lists are already line-oriented; this only
/// applies macro-block tagging and whitespace normalization.
pub fn normalize_markdown(markdown: &str) -> String {
    collapse_whitespace(&normalize_macro_blocks(markdown))
}

pub fn normalize_plain_text(text: &str) -> String {
    collapse_whitespace(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_blocks() {
        let html = "<html><head><style>body{}</style></head><body><script>alert(1)</script><p>hi</p></body></html>";
        let text = normalize_html(html);
        assert!(!text.contains("alert"));
        assert!(text.contains("hi"));
    }

    #[test]
    fn collapses_headings_and_lists() {
        let html = "<h1>Title</h1><ul><li>one</li><li>two</li></ul>";
        let text = normalize_html(html);
        assert!(text.contains("# Title"));
        assert!(text.contains("- one"));
        assert!(text.contains("- two"));
    }

    #[test]
    fn preserves_code_blocks_fenced() {
        let html = "<pre>let x = 1;</pre>";
        let text = normalize_html(html);
        assert!(text.contains("```"));
        assert!(text.contains("let x = 1;"));
    }

    #[test]
    fn tags_macro_blocks_instead_of_dropping() {
        let text = normalize_markdown("{warning}disk is full{warning}\nbody");
        assert!(text.contains("[WARNING] disk is full"));
    }
}
