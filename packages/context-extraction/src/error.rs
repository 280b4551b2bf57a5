//! Typed errors for the context extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Only failures that stop a run (or a single input) are errors. A language
//! model returning unusable text is not an error: it becomes a
//! [`SentinelFailure`](crate::types::record::SentinelFailure) that keeps
//! flowing through the pipeline as data.

use thiserror::Error;

/// Errors that stop a pipeline run or prevent it from being built.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable credential for the model collaborator
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The caller abandoned the run
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Model call failed (network, timeout, non-2xx reply)
    #[error("model error: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Input could not be normalized
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while normalizing one input.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Kind could not be determined from the name, extension or content type
    #[error("unsupported source kind: {name}")]
    UnsupportedSourceKind { name: String },

    /// Bytes could not be decoded into text
    #[error("failed to read {source_id}: {reason}")]
    SourceRead { source_id: String, reason: String },

    /// Page could not be fetched
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

impl SourceError {
    pub(crate) fn read(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceRead {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Why a page URL could not be turned into a body.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Refused before any request was made
    #[error("refused URL: {0}")]
    Security(#[from] SecurityError),

    #[error("request failed: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("not a URL: {url}")]
    InvalidUrl { url: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("page at {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// SSRF refusals raised by [`UrlValidator`](crate::security::UrlValidator).
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Anything other than http or https
    #[error("scheme `{0}` is not fetched")]
    DisallowedScheme(String),

    /// Internal host name, e.g. `localhost` or a metadata service
    #[error("host {0} is internal")]
    BlockedHost(String),

    /// Literal or resolved address inside a private range
    #[error("address {0} is in an internal range")]
    BlockedCidr(String),

    #[error("URL names no host")]
    NoHost,

    #[error("could not resolve {0}")]
    DnsResolution(String),

    #[error("malformed URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A candidate record that does not fit the business context schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// Top-level value is not a JSON object
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// Key outside the schema
    #[error("unknown field `{field}`")]
    UnknownField { field: String },

    /// Value has the wrong shape for its field
    #[error("field `{field}`: expected {expected}, found {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Integer field out of range
    #[error("field `{field}`: {value} is not a non-negative whole number")]
    OutOfRange { field: String, value: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for normalization.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type alias for page fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;
