//! Model credentials.
//!
//! The API key lives in a `secrecy` box for its whole life; the only way
//! to read it is [`SecretString::expose`], which the model client calls when
//! it builds the `Authorization` header.

use secrecy::ExposeSecret;
use std::fmt;

use crate::error::{PipelineError, Result};
use crate::types::config::DEFAULT_BASE_URL;

const REDACTED: &str = "[REDACTED]";

/// A secret that prints as `[REDACTED]` in `Debug` and `Display`.
#[derive(Clone)]
pub struct SecretString(secrecy::SecretString);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(secrecy::SecretString::from(value.into()))
    }

    /// Read the secret. Call only at the point of use.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.expose().trim().is_empty()
    }

    /// Short masked form for start-up logs, e.g. `sk-…7f3a`.
    pub fn hint(&self) -> String {
        let key = self.expose().trim();
        let chars: Vec<char> = key.chars().collect();
        if chars.len() < 12 {
            return REDACTED.to_string();
        }
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}…{tail}")
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Key, chat model and endpoint for the model collaborator.
#[derive(Clone)]
pub struct AICredentials {
    pub api_key: SecretString,
    pub model: String,
    /// OpenAI-compatible endpoint; the public API when unset
    pub base_url: Option<String>,
}

impl AICredentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            model: model.into(),
            base_url: None,
        }
    }

    /// Point at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = (!url.trim().is_empty()).then_some(url);
        self
    }

    /// Base URL without a trailing slash.
    pub fn endpoint(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// `MissingCredential` unless both the key and the model name are set.
    pub fn ensure_present(&self) -> Result<()> {
        if self.api_key.is_blank() {
            return Err(PipelineError::MissingCredential(
                "OPENAI_API_KEY is empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(PipelineError::MissingCredential(
                "no chat model configured".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for AICredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AICredentials")
            .field("api_key", &self.api_key)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint())
            .finish()
    }
}
