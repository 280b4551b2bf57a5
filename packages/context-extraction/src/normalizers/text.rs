//! Line-oriented plain text.

use tracing::debug;

use crate::types::block::{anchor_units, AnchorUnit};
use crate::types::source::{NormalizedSource, SourceMetadata, TextEncoding};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode bytes as UTF-8, falling back to Latin-1.
///
/// Latin-1 maps every byte to a char, so decoding never fails.
pub fn decode(bytes: &[u8]) -> (String, TextEncoding) {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(e) => {
            debug!(valid_up_to = e.valid_up_to(), "Not UTF-8, decoding as Latin-1");
            (bytes.iter().map(|&b| char::from(b)).collect(), TextEncoding::Latin1)
        }
    }
}

/// Normalize a text document into `line N` blocks.
pub fn normalize(source: &str, bytes: &[u8]) -> NormalizedSource {
    let (text, encoding) = decode(bytes);
    let lines: Vec<&str> = text.lines().collect();
    let blocks = anchor_units(&lines, AnchorUnit::Line, source);

    NormalizedSource {
        metadata: SourceMetadata::Text {
            source: source.to_string(),
            lines: lines.len(),
            blocks: blocks.len(),
            encoding,
        },
        blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("año".as_bytes());
        let (text, enc) = decode(&bytes);
        assert_eq!(text, "año");
        assert_eq!(enc, TextEncoding::Utf8);
    }

    #[test]
    fn test_decode_falls_back_to_latin1() {
        // "año" in Latin-1
        let (text, enc) = decode(&[0x61, 0xF1, 0x6F]);
        assert_eq!(text, "año");
        assert_eq!(enc, TextEncoding::Latin1);
    }

    #[test]
    fn test_normalize_drops_blank_lines() {
        let source = normalize("brief.txt", b"ACME Corp\n\n   \nReduce costs\r\nIntegrate SAP ERP\n");
        let anchors: Vec<String> = source.blocks.iter().map(|b| b.anchor.to_string()).collect();
        assert_eq!(anchors, vec!["line 1", "line 2", "line 3"]);
        assert_eq!(source.blocks[2].text, "Integrate SAP ERP");

        match source.metadata {
            SourceMetadata::Text { lines, blocks, .. } => {
                assert_eq!(lines, 5);
                assert_eq!(blocks, 3);
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_empty() {
        let source = normalize("empty.txt", b"");
        assert!(source.blocks.is_empty());
        assert_eq!(source.metadata.block_count(), 0);
    }
}
