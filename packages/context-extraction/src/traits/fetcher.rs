//! Page fetcher trait for web page inputs.
//!
//! Fetching is the only I/O the normalizer performs. It sits behind a
//! trait so runs can be tested against canned pages and so URL safety
//! checks can wrap any implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, FetchResult};
use crate::security::UrlValidator;

/// Raw body of a fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: String,

    /// Response body, decoded as text
    pub body: String,

    /// MIME type from the response headers
    pub content_type: Option<String>,

    /// When the content was fetched
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    /// Create a new fetched page.
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            content_type: None,
            fetched_at: Utc::now(),
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// True when the body should be treated as HTML.
    pub fn is_html(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => ct.contains("html"),
            None => {
                let head = self.body.trim_start();
                let doctype = head
                    .get(..5)
                    .is_some_and(|p| p.eq_ignore_ascii_case("<!doc"));
                head.starts_with('<') && (doctype || head.to_ascii_lowercase().contains("<html"))
            }
        }
    }
}

/// Fetches one page by URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a single URL.
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage>;

    /// Get the fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// A fetcher that validates URLs before fetching (SSRF protection).
///
/// # Example
///
/// ```rust,ignore
/// let fetcher = ValidatedFetcher::new(HttpFetcher::new()?);
/// let page = fetcher.fetch("https://example.com/about").await?;
/// ```
pub struct ValidatedFetcher<F: PageFetcher> {
    inner: F,
    validator: UrlValidator,
}

impl<F: PageFetcher> ValidatedFetcher<F> {
    /// Create a new validated fetcher with default security rules.
    pub fn new(fetcher: F) -> Self {
        Self {
            inner: fetcher,
            validator: UrlValidator::new(),
        }
    }

    /// Create with a custom validator.
    pub fn with_validator(fetcher: F, validator: UrlValidator) -> Self {
        Self {
            inner: fetcher,
            validator,
        }
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for ValidatedFetcher<F> {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.validator
            .validate_with_dns(url)
            .await
            .map_err(FetchError::Security)?;

        self.inner.fetch(url).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
