//! Fetched web pages and uploaded HTML, one block per paragraph.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::traits::fetcher::FetchedPage;
use crate::types::block::{anchor_units, AnchorUnit};
use crate::types::source::{NormalizedSource, SourceMetadata};

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).expect("valid regex"));
    };
}

pattern!(SCRIPT, r"(?is)<script[^>]*>.*?</script>");
pattern!(STYLE, r"(?is)<style[^>]*>.*?</style>");
pattern!(HEAD, r"(?is)<head[^>]*>.*?</head>");
pattern!(COMMENT, r"(?s)<!--.*?-->");
pattern!(HEADING, r"(?is)<h[1-6][^>]*>(.*?)</h[1-6]>");
pattern!(PARAGRAPH, r"(?is)<p(?:\s[^>]*)?>(.*?)</p>");
pattern!(LIST_ITEM, r"(?is)<li[^>]*>(.*?)</li>");
pattern!(LINE_BREAK, r"(?i)<br\s*/?>");
pattern!(BLOCK_END, r"(?i)</(?:div|section|article|header|footer|table|tr|ul|ol|blockquote)>");
pattern!(TAG, r"<[^>]+>");
pattern!(INLINE_SPACE, r"[ \t\u{a0}]+");
pattern!(BLANK_LINES, r"\n\s*\n");
pattern!(TITLE, r"(?is)<title[^>]*>(.*?)</title>");
pattern!(ENTITY, r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([a-zA-Z]+));");

/// Convert HTML to plain text with blank lines between blocks.
pub fn html_to_text(html: &str) -> String {
    let mut text = COMMENT.replace_all(html, "").into_owned();
    text = SCRIPT.replace_all(&text, "").into_owned();
    text = STYLE.replace_all(&text, "").into_owned();
    text = HEAD.replace_all(&text, "").into_owned();

    text = HEADING.replace_all(&text, "\n\n$1\n\n").into_owned();
    text = PARAGRAPH.replace_all(&text, "\n\n$1\n\n").into_owned();
    text = LIST_ITEM.replace_all(&text, "- $1\n").into_owned();
    text = LINE_BREAK.replace_all(&text, "\n").into_owned();
    text = BLOCK_END.replace_all(&text, "\n\n").into_owned();
    text = TAG.replace_all(&text, "").into_owned();

    text = decode_entities(&text);

    let lines: Vec<String> = text
        .lines()
        .map(|line| INLINE_SPACE.replace_all(line, " ").trim().to_string())
        .collect();
    lines.join("\n").trim().to_string()
}

/// Extract the document title.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter(|t| !t.is_empty())
}

/// Split text into paragraphs on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    BLANK_LINES.split(text).collect()
}

/// Normalize a fetched page into `block N` blocks.
pub fn normalize_page(source: &str, page: &FetchedPage) -> NormalizedSource {
    let (text, title) = if page.is_html() {
        (html_to_text(&page.body), extract_title(&page.body))
    } else {
        (page.body.clone(), None)
    };

    let blocks = anchor_units(split_paragraphs(&text), AnchorUnit::Block, source);

    NormalizedSource {
        metadata: SourceMetadata::WebPage {
            url: page.url.clone(),
            title,
            content_type: page.content_type.clone(),
            blocks: blocks.len(),
        },
        blocks,
    }
}

/// Decode named and numeric (`&#8217;`, `&#xE9;`) character references in
/// one pass. Unknown names and invalid code points are left as written.
pub(crate) fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                match &caps[3] {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>ACME &amp; Co</title><style>p { color: red; }</style></head>
<body>
<script>var tracking = true;</script>
<h1>About ACME</h1>
<p>ACME builds
industrial pumps.</p>
<p>   </p>
<ul><li>Founded 1998</li><li>Based in Monterrey</li></ul>
<div>Contact us<br/>sales@acme.test</div>
</body></html>"#;

    #[test]
    fn test_numeric_entities_decoded() {
        assert_eq!(decode_entities("ACME&#8217;s caf&#xE9; &amp; bar"), "ACME\u{2019}s caf\u{e9} & bar");
        assert_eq!(decode_entities("&#X41;&#39;&nbsp;x"), "A' x");
        // Escaped once means literal text, not markup
        assert_eq!(decode_entities("&amp;lt;p&amp;gt;"), "&lt;p&gt;");
        assert_eq!(decode_entities("&#xD800; &bogus; & alone"), "&#xD800; &bogus; & alone");
    }

    #[test]
    fn test_html_to_text_strips_markup() {
        let text = html_to_text(PAGE);
        assert!(text.contains("About ACME"));
        assert!(text.contains("ACME builds\nindustrial pumps."));
        assert!(text.contains("- Founded 1998"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title(PAGE), Some("ACME & Co".to_string()));
        assert_eq!(extract_title("<html><body>none</body></html>"), None);
    }

    #[test]
    fn test_normalize_page_blocks() {
        let page = FetchedPage::new("https://acme.test/about", PAGE).with_content_type("text/html");
        let source = normalize_page("https://acme.test/about", &page);

        let texts: Vec<&str> = source.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts[0], "About ACME");
        assert_eq!(texts[1], "ACME builds\nindustrial pumps.");
        assert_eq!(source.blocks[0].anchor.to_string(), "block 1");
        assert!(texts.iter().all(|t| !t.trim().is_empty()));

        match &source.metadata {
            SourceMetadata::WebPage { url, title, blocks, .. } => {
                assert_eq!(url, "https://acme.test/about");
                assert_eq!(title.as_deref(), Some("ACME & Co"));
                assert_eq!(*blocks, source.blocks.len());
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[test]
    fn test_plain_page_splits_on_blank_lines() {
        let page = FetchedPage::new("https://acme.test/robots", "first para\nstill first\n\n\n second ")
            .with_content_type("text/plain");
        let source = normalize_page("https://acme.test/robots", &page);
        assert_eq!(source.blocks.len(), 2);
        assert_eq!(source.blocks[1].text, "second");
    }
}
