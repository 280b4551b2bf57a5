//! OpenAI-compatible chat completions client.
//!
//! # Example
//!
//! ```rust,ignore
//! use context_extraction::ai::OpenAI;
//!
//! let config = PipelineConfig::from_env()?;
//! let model = OpenAI::from_config(&config)?;
//! let coordinator = Coordinator::new(model, config);
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::security::{AICredentials, SecretString};
use crate::traits::model::LanguageModel;
use crate::types::config::PipelineConfig;

const MAX_REPLY_TOKENS: u32 = 4096;

/// System message sent with every prompt.
const SYSTEM_MESSAGE: &str = "You are a careful business analyst. You answer with a single JSON object and never invent facts that are not supported by the material or by reliable public sources.";

/// Chat completions client.
///
/// Stateless apart from the HTTP connection pool, so one handle can be
/// shared by every concurrent run.
#[derive(Clone)]
pub struct OpenAI {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for OpenAI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAI")
            .field("api_key", &self.api_key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAI {
    /// Create a client, failing fast on an empty key.
    pub fn new(credentials: &AICredentials) -> Result<Self> {
        credentials.ensure_present()?;
        debug!(
            model = %credentials.model,
            endpoint = credentials.endpoint(),
            key = %credentials.api_key.hint(),
            "OpenAI client configured"
        );

        Ok(Self {
            client: Client::new(),
            api_key: credentials.api_key.clone(),
            model: credentials.model.clone(),
            base_url: credentials.endpoint().to_string(),
            timeout: Duration::from_secs(60),
        })
    }

    /// Create a client from pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(config.require_credentials()?)?.with_timeout(config.request_timeout))
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = CompletionBody {
            model: &self.model,
            messages: [
                Turn { role: "system", content: SYSTEM_MESSAGE },
                Turn { role: "user", content: prompt },
            ],
            temperature: 0.0,
            max_tokens: MAX_REPLY_TOKENS,
            response_format: JsonMode { kind: "json_object" },
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "Submitting chat completion");

        let reply = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(model = %self.model, timed_out = e.is_timeout(), error = %e, "Model call failed");
                PipelineError::Model(Box::new(e))
            })?;

        let status = reply.status();
        if !status.is_success() {
            let detail = reply.text().await.unwrap_or_default();
            warn!(model = %self.model, %status, "Model endpoint refused the call");
            return Err(PipelineError::Model(
                format!("chat completions returned {status}: {detail}").into(),
            ));
        }

        let completion: Completion = reply
            .json()
            .await
            .map_err(|e| PipelineError::Model(Box::new(e)))?;

        completion
            .first_content()
            .ok_or_else(|| PipelineError::Model("completion carried no message content".into()))
    }
}

#[async_trait]
impl LanguageModel for OpenAI {
    async fn submit(&self, prompt: &str) -> Result<String> {
        self.complete(prompt).await
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Request body, borrowed from the client and the prompt.
#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: [Turn<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: JsonMode,
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct JsonMode {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Reply,
}

#[derive(Deserialize)]
struct Reply {
    content: Option<String>,
}

impl Completion {
    fn first_content(self) -> Option<String> {
        self.choices.into_iter().find_map(|c| c.message.content)
    }
}
