//! Paginated documents (PDF), one block per non-blank page.

use tracing::{debug, warn};

use crate::error::{SourceError, SourceResult};
use crate::types::block::{anchor_units, AnchorUnit};
use crate::types::source::{NormalizedSource, SourceMetadata};

/// Normalize a PDF into `page N` blocks.
///
/// A page whose text can't be extracted counts as blank rather than
/// failing the document; only an unreadable file is an error.
pub fn normalize(source: &str, bytes: &[u8]) -> SourceResult<NormalizedSource> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| SourceError::read(source, e))?;
    let pages = doc.get_pages();

    let texts: Vec<String> = pages
        .keys()
        .map(|&number| match doc.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                warn!(source = %source, page = number, error = %e, "Page text extraction failed");
                String::new()
            }
        })
        .collect();

    let blocks = anchor_units(&texts, AnchorUnit::Page, source);
    debug!(source = %source, pages = texts.len(), retained = blocks.len(), "PDF normalized");

    Ok(NormalizedSource {
        metadata: SourceMetadata::Pdf {
            source: source.to_string(),
            pages: texts.len(),
            blocks: blocks.len(),
        },
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_read_error() {
        let result = normalize("broken.pdf", b"definitely not a pdf");
        assert!(matches!(result, Err(SourceError::SourceRead { .. })));
    }
}
