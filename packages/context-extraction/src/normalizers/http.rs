//! HTTP page fetcher.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::{redirect, Response};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::normalizers::text;
use crate::security::UrlValidator;
use crate::traits::fetcher::{FetchedPage, PageFetcher};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// Pages larger than this are refused rather than normalized.
pub const DEFAULT_MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

/// Fetches a single page over HTTP.
///
/// Redirects are followed here rather than by reqwest, so every hop goes
/// through the same SSRF checks as the first URL. The first URL itself is
/// checked by [`ValidatedFetcher`](crate::traits::fetcher::ValidatedFetcher);
/// wrap the fetcher in one before handing it user-supplied URLs.
///
/// ```rust,ignore
/// let fetcher = ValidatedFetcher::new(HttpFetcher::new()?);
/// let page = fetcher.fetch("https://acme.example/about").await?;
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    agent: String,
    max_bytes: usize,
    redirect_rules: UrlValidator,
}

impl HttpFetcher {
    pub fn new() -> FetchResult<Self> {
        reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()
            .map(Self::with_client)
            .map_err(|e| FetchError::Http(Box::new(e)))
    }

    /// Use a preconfigured HTTP client.
    ///
    /// The client should not follow redirects itself, otherwise hops skip
    /// validation.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            agent: concat!("context-extraction/", env!("CARGO_PKG_VERSION")).to_string(),
            max_bytes: DEFAULT_MAX_PAGE_BYTES,
            redirect_rules: UrlValidator::new(),
        }
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Rules applied to every redirect target.
    pub fn with_redirect_validator(mut self, validator: UrlValidator) -> Self {
        self.redirect_rules = validator;
        self
    }

    fn too_large(&self, url: &str) -> FetchError {
        FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
    }

    async fn get(&self, target: Url, url: &str) -> FetchResult<Response> {
        self.client
            .get(target)
            .header(USER_AGENT, &self.agent)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Page request failed");
                if e.is_timeout() {
                    FetchError::Timeout { url: url.to_string() }
                } else {
                    FetchError::Http(Box::new(e))
                }
            })
    }

    /// Read the body chunk by chunk, refusing it once it passes the cap.
    async fn read_body(&self, url: &str, mut response: Response) -> FetchResult<Vec<u8>> {
        if response
            .content_length()
            .is_some_and(|len| len as usize > self.max_bytes)
        {
            return Err(self.too_large(url));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                warn!(url = %url, limit = self.max_bytes, "Page body over the size cap");
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Absolute target of a redirect reply, resolved against the current URL.
fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        let mut current = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;

        let mut hops = 0;
        let response = loop {
            debug!(url = %current, hops, "Fetching page");
            let response = self.get(current.clone(), url).await?;
            if !response.status().is_redirection() {
                break response;
            }

            let next = redirect_target(&current, &response).ok_or_else(|| {
                FetchError::Http(format!("redirect from {current} has no usable Location").into())
            })?;
            hops += 1;
            if hops > MAX_REDIRECTS {
                return Err(FetchError::Http(
                    format!("more than {MAX_REDIRECTS} redirects fetching {url}").into(),
                ));
            }
            self.redirect_rules.validate_with_dns(next.as_str()).await.map_err(|e| {
                warn!(from = %current, to = %next, error = %e, "Redirect refused");
                FetchError::Security(e)
            })?;
            current = next;
        };

        if let Err(e) = response.error_for_status_ref() {
            return Err(FetchError::Http(Box::new(e)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = self.read_body(url, response).await?;
        let (body, _) = text::decode(&bytes);
        debug!(url = %url, bytes = bytes.len(), hops, "Page fetched");

        let page = FetchedPage::new(url, body);
        Ok(match content_type {
            Some(ct) => page.with_content_type(ct),
            None => page,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
