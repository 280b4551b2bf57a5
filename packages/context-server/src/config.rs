use anyhow::{Context, Result};
use context_extraction::{AnalysisMode, PipelineConfig};
use dotenvy::dotenv;
use std::env;

/// Default upload limit for one request (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub app_name: String,
    /// Allowed CORS origins; empty means any origin
    pub allowed_origins: Vec<String>,
    pub analysis_mode: AnalysisMode,
    pub max_upload_bytes: usize,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let enrich_by_default = match env::var("ENRICH_BY_DEFAULT") {
            Ok(raw) => parse_bool(&raw).context("ENRICH_BY_DEFAULT must be true or false")?,
            Err(_) => false,
        };

        let pipeline = PipelineConfig::from_env()
            .context("Failed to load pipeline settings")?
            .with_enrich_by_default(enrich_by_default);

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            app_name: env::var("APP_NAME")
                .unwrap_or_else(|_| "Client Context Analyzer API".to_string()),
            allowed_origins: parse_origins(env::var("CORS_ALLOWED_ORIGINS").ok().as_deref()),
            analysis_mode: env::var("ANALYSIS_MODE")
                .unwrap_or_default()
                .parse()
                .context("ANALYSIS_MODE must be 'agentic' or 'heuristic'")?,
            max_upload_bytes: match env::var("MAX_UPLOAD_BYTES") {
                Ok(raw) => raw.parse().context("MAX_UPLOAD_BYTES must be a number")?,
                Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
            },
            pipeline,
        })
    }
}

/// Comma-separated origins; `*` or nothing means any.
pub fn parse_origins(raw: Option<&str>) -> Vec<String> {
    let origins: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if origins.iter().any(|o| o == "*") {
        Vec::new()
    } else {
        origins
    }
}

/// Lenient boolean used for env vars and form fields.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert!(parse_origins(None).is_empty());
        assert!(parse_origins(Some("*")).is_empty());
        assert!(parse_origins(Some("https://a.test, *")).is_empty());
        assert_eq!(
            parse_origins(Some("https://a.test, https://b.test,")),
            vec!["https://a.test", "https://b.test"]
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
