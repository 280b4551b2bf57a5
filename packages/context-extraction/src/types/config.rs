//! Configuration for the pipeline and for individual runs.

use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::security::AICredentials;

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Compact schema description sent to the model during extraction.
pub const DEFAULT_SCHEMA: &str = r#"{
    "client_name": "string | null",
    "industry": "string | null",
    "location": "string | null",
    "engagement_age": "integer (years) | null",
    "business_overview": "string | null",
    "objectives": ["string"],
    "company_info": "string | null",
    "additional_context_questions": ["string"],
    "potential_future_opportunities": ["string"]
}"#;

/// Configuration threaded from the coordinator into every agent.
///
/// Nothing in the pipeline reads the environment; build this value once
/// (by hand, or with [`PipelineConfig::from_env`] in a binary) and hand it
/// over at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model credentials. `None` fails construction of a real model client.
    pub credentials: Option<AICredentials>,

    /// Per-request timeout for model calls.
    ///
    /// Default: 60 seconds.
    pub request_timeout: Duration,

    /// Schema description given to the extraction prompt.
    pub default_schema: String,

    /// Whether runs enrich when the caller doesn't say.
    ///
    /// Default: false (enrichment is opt-in).
    pub enrich_by_default: bool,

    /// Optional cap on block text embedded in one extraction prompt.
    ///
    /// Blocks past the cap are left out and the prompt says so.
    /// Default: `None`, every block is sent.
    pub max_prompt_chars: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            request_timeout: Duration::from_secs(60),
            default_schema: DEFAULT_SCHEMA.to_string(),
            enrich_by_default: false,
            max_prompt_chars: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from environment variables.
    ///
    /// Reads `OPENAI_API_KEY`, `OPENAI_MODEL`, `OPENAI_BASE_URL`,
    /// `MODEL_TIMEOUT_SECS` and `MAX_PROMPT_CHARS`. A missing key leaves `credentials` empty; the
    /// failure surfaces when a model client is built.
    pub fn from_env() -> Result<Self> {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let credentials = std::env::var("OPENAI_API_KEY").ok().map(|key| {
            let creds = AICredentials::new(key, &model);
            match std::env::var("OPENAI_BASE_URL") {
                Ok(url) => creds.with_base_url(url),
                Err(_) => creds,
            }
        });

        let timeout_secs = match std::env::var("MODEL_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                PipelineError::Config(format!("MODEL_TIMEOUT_SECS must be a number, got {raw}"))
            })?,
            Err(_) => 60,
        };

        let max_prompt_chars = match std::env::var("MAX_PROMPT_CHARS") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<usize>().map_err(|_| {
                PipelineError::Config(format!("MAX_PROMPT_CHARS must be a number, got {raw}"))
            })?),
            _ => None,
        };

        Ok(Self {
            credentials,
            request_timeout: Duration::from_secs(timeout_secs),
            max_prompt_chars,
            ..Self::default()
        })
    }

    /// Set the model credentials.
    pub fn with_credentials(mut self, credentials: AICredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the model request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the extraction schema description.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Enrich runs by default.
    pub fn with_enrich_by_default(mut self, enrich: bool) -> Self {
        self.enrich_by_default = enrich;
        self
    }

    /// Cap the block text sent in one extraction prompt.
    pub fn with_max_prompt_chars(mut self, max: usize) -> Self {
        self.max_prompt_chars = Some(max);
        self
    }

    /// Credentials, or `MissingCredential` when absent or blank.
    pub fn require_credentials(&self) -> Result<&AICredentials> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            PipelineError::MissingCredential("OPENAI_API_KEY must be set".to_string())
        })?;
        creds.ensure_present()?;
        Ok(creds)
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Allow the enrichment stage. `None` falls back to the config default.
    pub enrich: Option<bool>,

    /// Schema description override for this run's extraction.
    pub schema: Option<String>,

    /// Client name supplied by the caller. Replaces whatever the model
    /// extracted, before enrichment looks the client up.
    pub client_name: Option<String>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or forbid enrichment for this run.
    pub fn with_enrich(mut self, enrich: bool) -> Self {
        self.enrich = Some(enrich);
        self
    }

    /// Override the extraction schema for this run.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }
}
