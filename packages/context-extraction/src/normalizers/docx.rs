//! Word-processor documents (DOCX), one block per non-blank paragraph.

use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use super::web::decode_entities;
use crate::error::{SourceError, SourceResult};
use crate::types::block::{anchor_units, AnchorUnit};
use crate::types::source::{NormalizedSource, SourceMetadata};

const DOCUMENT_PART: &str = "word/document.xml";

static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>.*?</w:p>").expect("valid regex"));

static RUN_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>|<w:br\s*/>").expect("valid regex")
});

/// Normalize a DOCX into `paragraph N` blocks.
pub fn normalize(source: &str, bytes: &[u8]) -> SourceResult<NormalizedSource> {
    let xml = read_document_xml(source, bytes)?;
    let paragraphs = paragraphs(&xml);
    let blocks = anchor_units(&paragraphs, AnchorUnit::Paragraph, source);

    Ok(NormalizedSource {
        metadata: SourceMetadata::Docx {
            source: source.to_string(),
            paragraphs: paragraphs.len(),
            blocks: blocks.len(),
        },
        blocks,
    })
}

fn read_document_xml(source: &str, bytes: &[u8]) -> SourceResult<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| SourceError::read(source, e))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| SourceError::read(source, format!("{DOCUMENT_PART}: {e}")))?;

    let mut raw = Vec::new();
    part.read_to_end(&mut raw)
        .map_err(|e| SourceError::read(source, e))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Text of every paragraph in document order, blank ones included.
fn paragraphs(xml: &str) -> Vec<String> {
    PARAGRAPH
        .find_iter(xml)
        .map(|p| {
            let mut text = String::new();
            for cap in RUN_CONTENT.captures_iter(p.as_str()) {
                match cap.get(1) {
                    Some(t) => text.push_str(&decode_entities(t.as_str())),
                    None if cap[0].starts_with("<w:tab") => text.push('\t'),
                    None => text.push('\n'),
                }
            }
            text
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file(DOCUMENT_PART, options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    const BODY: &str = r#"<?xml version="1.0"?>
<w:document><w:body>
<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>ACME Corp brief</w:t></w:r></w:p>
<w:p/>
<w:p w:rsidR="00AB"><w:r><w:t xml:space="preserve">Reduce costs </w:t></w:r><w:r><w:t>&amp; integrate SAP</w:t></w:r></w:p>
<w:p><w:r><w:t>   </w:t></w:r></w:p>
<w:p><w:r><w:t>Budget</w:t><w:tab/><w:t>limited</w:t></w:r></w:p>
</w:body></w:document>"#;

    #[test]
    fn test_paragraphs_keep_blanks_for_counting() {
        let paras = paragraphs(BODY);
        assert_eq!(paras.len(), 5);
        assert_eq!(paras[0], "ACME Corp brief");
        assert_eq!(paras[2], "Reduce costs & integrate SAP");
        assert_eq!(paras[4], "Budget\tlimited");
    }

    #[test]
    fn test_normalize_anchors_retained_paragraphs() {
        let source = normalize("brief.docx", &docx_bytes(BODY)).unwrap();
        let anchors: Vec<String> = source.blocks.iter().map(|b| b.anchor.to_string()).collect();
        assert_eq!(anchors, vec!["paragraph 1", "paragraph 2", "paragraph 3"]);

        match source.metadata {
            SourceMetadata::Docx { paragraphs, blocks, .. } => {
                assert_eq!(paragraphs, 5);
                assert_eq!(blocks, 3);
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[test]
    fn test_character_references_decoded() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>ACME&#8217;s caf&#xE9; &lt;pilot&gt;</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(paragraphs(xml), vec!["ACME\u{2019}s caf\u{e9} <pilot>"]);
    }

    #[test]
    fn test_not_a_zip_is_read_error() {
        let result = normalize("brief.docx", b"plain bytes");
        assert!(matches!(result, Err(SourceError::SourceRead { .. })));
    }
}
