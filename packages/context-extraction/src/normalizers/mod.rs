//! Source normalizers.
//!
//! Each supported input kind is turned into an ordered sequence of anchored
//! [`TextBlock`](crate::types::block::TextBlock)s plus metadata describing
//! where they came from:
//!
//! - [`pdf`] - one block per page (`page N`)
//! - [`docx`] - one block per paragraph (`paragraph N`)
//! - [`text`] - one block per line (`line N`)
//! - [`web`] - one block per paragraph of a fetched page (`block N`)
//!
//! [`Normalizer`] dispatches on the resolved [`SourceKind`] and merges many
//! inputs into one [`NormalizedInput`].

pub mod docx;
pub mod http;
pub mod pdf;
pub mod text;
pub mod web;

pub use http::HttpFetcher;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{SourceError, SourceResult};
use crate::traits::fetcher::{FetchedPage, PageFetcher};
use crate::types::source::{
    NormalizedInput, NormalizedSource, SkippedInput, SourceInput, SourceKind,
};

/// Turns raw inputs into anchored text blocks.
///
/// URL inputs need a [`PageFetcher`]; without one they fail with a read
/// error, which keeps offline runs free of network I/O.
#[derive(Clone, Default)]
pub struct Normalizer {
    fetcher: Option<Arc<dyn PageFetcher>>,
}

impl Normalizer {
    /// Create a normalizer without page fetching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fetcher used for URL inputs.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Normalize one input, keyed by its file name or URL.
    pub async fn normalize(&self, input: &SourceInput) -> SourceResult<NormalizedSource> {
        self.normalize_as(input, input.identifier()).await
    }

    /// Normalize every input and merge the results in input order.
    ///
    /// An input that fails is left out of the blocks and metadata and
    /// recorded in [`NormalizedInput::skipped`]; the remaining inputs still
    /// make up the run.
    pub async fn normalize_all(&self, inputs: &[SourceInput]) -> NormalizedInput {
        let mut merged = NormalizedInput::default();

        for input in inputs {
            let key = unique_key(&merged, input.identifier());
            match self.normalize_as(input, &key).await {
                Ok(source) => {
                    merged.blocks.extend(source.blocks);
                    merged.metadata.insert(key, source.metadata);
                }
                Err(e) => {
                    warn!(source = %key, error = %e, "Skipping input that could not be normalized");
                    merged.skipped.push(SkippedInput {
                        source: key,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            inputs = inputs.len(),
            sources = merged.metadata.len(),
            skipped = merged.skipped.len(),
            blocks = merged.blocks.len(),
            "Inputs normalized"
        );

        merged
    }

    async fn normalize_as(&self, input: &SourceInput, key: &str) -> SourceResult<NormalizedSource> {
        let kind = input
            .resolve_kind()
            .ok_or_else(|| SourceError::UnsupportedSourceKind {
                name: input.identifier().to_string(),
            })?;

        debug!(source = %key, kind = kind.as_str(), "Normalizing input");

        match input {
            SourceInput::Url(url) => {
                let page = self.fetch(key, url).await?;
                Ok(web::normalize_page(key, &page))
            }
            SourceInput::Document {
                bytes,
                content_type,
                ..
            } => match kind {
                SourceKind::Pdf => pdf::normalize(key, bytes),
                SourceKind::Docx => docx::normalize(key, bytes),
                SourceKind::Text => Ok(text::normalize(key, bytes)),
                SourceKind::WebPage => {
                    // Uploaded HTML is read like a page that was already fetched
                    let (body, _) = text::decode(bytes);
                    let mut page = FetchedPage::new(key, body);
                    page.content_type = Some(content_type.clone().unwrap_or_else(|| "text/html".to_string()));
                    Ok(web::normalize_page(key, &page))
                }
            },
        }
    }

    async fn fetch(&self, key: &str, url: &str) -> SourceResult<FetchedPage> {
        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| SourceError::read(key, "no page fetcher configured"))?;

        Ok(fetcher.fetch(url).await?)
    }
}

/// Key for a source, suffixed `#2`, `#3`... when the name is already taken.
fn unique_key(merged: &NormalizedInput, name: &str) -> String {
    let taken = |key: &str| {
        merged.metadata.contains_key(key) || merged.skipped.iter().any(|s| s.source == key)
    };

    if !taken(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name}#{n}"))
        .find(|key| !taken(key))
        .unwrap_or_else(|| name.to_string())
}
