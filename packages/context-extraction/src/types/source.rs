//! Input sources and their provenance metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::block::TextBlock;

/// Supported input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Paginated document (PDF)
    Pdf,
    /// Word-processor document (DOCX)
    Docx,
    /// Line-oriented plain text
    Text,
    /// Fetched web page
    WebPage,
}

impl SourceKind {
    /// Sniff the kind from a file name's extension.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::Text),
            "htm" | "html" => Some(Self::WebPage),
            _ => None,
        }
    }

    /// Sniff the kind from a MIME content type.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" | "text/markdown" => Some(Self::Text),
            "text/html" | "application/xhtml+xml" => Some(Self::WebPage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "text",
            Self::WebPage => "web_page",
        }
    }
}

/// One input handed to the normalizer.
#[derive(Debug, Clone)]
pub enum SourceInput {
    /// Uploaded bytes with their original name
    Document {
        name: String,
        bytes: Vec<u8>,
        /// Kind declared by the boundary layer, trusted when present
        kind: Option<SourceKind>,
        content_type: Option<String>,
    },
    /// A page to fetch
    Url(String),
}

impl SourceInput {
    /// Create a document input whose kind is sniffed from its name.
    pub fn document(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Document {
            name: name.into(),
            bytes: bytes.into(),
            kind: None,
            content_type: None,
        }
    }

    /// Create a plain-text input.
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Document {
            name: name.into(),
            bytes: text.into().into_bytes(),
            kind: Some(SourceKind::Text),
            content_type: Some("text/plain".to_string()),
        }
    }

    /// Create a URL input.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Declare the kind explicitly.
    pub fn with_kind(self, declared: SourceKind) -> Self {
        match self {
            Self::Document {
                name,
                bytes,
                content_type,
                ..
            } => Self::Document {
                name,
                bytes,
                kind: Some(declared),
                content_type,
            },
            url => url,
        }
    }

    /// Attach the content type reported by the uploader.
    pub fn with_content_type(self, ct: impl Into<String>) -> Self {
        match self {
            Self::Document {
                name, bytes, kind, ..
            } => Self::Document {
                name,
                bytes,
                kind,
                content_type: Some(ct.into()),
            },
            url => url,
        }
    }

    /// File name or URL.
    pub fn identifier(&self) -> &str {
        match self {
            Self::Document { name, .. } => name,
            Self::Url(url) => url,
        }
    }

    /// Resolve the kind: declared, then extension, then content type.
    pub fn resolve_kind(&self) -> Option<SourceKind> {
        match self {
            Self::Document {
                name,
                kind,
                content_type,
                ..
            } => kind
                .or_else(|| SourceKind::from_name(name))
                .or_else(|| content_type.as_deref().and_then(SourceKind::from_content_type)),
            Self::Url(_) => Some(SourceKind::WebPage),
        }
    }
}

/// Text encoding a document was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// Provenance of the blocks produced from one input.
///
/// Each variant keeps the shape natural to its kind, so a merged run can
/// report page counts for one file and paragraph counts for another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceMetadata {
    Pdf {
        source: String,
        pages: usize,
        blocks: usize,
    },
    Docx {
        source: String,
        paragraphs: usize,
        blocks: usize,
    },
    Text {
        source: String,
        lines: usize,
        blocks: usize,
        encoding: TextEncoding,
    },
    WebPage {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        blocks: usize,
    },
}

impl SourceMetadata {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Pdf { .. } => SourceKind::Pdf,
            Self::Docx { .. } => SourceKind::Docx,
            Self::Text { .. } => SourceKind::Text,
            Self::WebPage { .. } => SourceKind::WebPage,
        }
    }

    /// Number of retained blocks.
    pub fn block_count(&self) -> usize {
        match self {
            Self::Pdf { blocks, .. }
            | Self::Docx { blocks, .. }
            | Self::Text { blocks, .. }
            | Self::WebPage { blocks, .. } => *blocks,
        }
    }
}

/// Output of normalizing one input.
#[derive(Debug, Clone)]
pub struct NormalizedSource {
    pub blocks: Vec<TextBlock>,
    pub metadata: SourceMetadata,
}

/// Metadata of a merged run, keyed by source in input order.
pub type MergedMetadata = IndexMap<String, SourceMetadata>;

/// An input that could not be normalized, kept for the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedInput {
    pub source: String,
    pub error: String,
}

/// All inputs of one run merged into a single logical input.
#[derive(Debug, Clone, Default)]
pub struct NormalizedInput {
    /// Blocks of every input, concatenated in input order
    pub blocks: Vec<TextBlock>,

    /// One entry per successfully normalized input
    pub metadata: MergedMetadata,

    /// Inputs that failed and were left out
    pub skipped: Vec<SkippedInput>,
}

impl NormalizedInput {
    /// Combined text of all blocks.
    pub fn combined_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
