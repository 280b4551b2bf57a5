//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use context_extraction::{
    AnalysisMode, Analyzer, Coordinator, HttpFetcher, Normalizer, PageFetcher, ValidatedFetcher,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::routes::{analyze_handler, health_handler, root_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub app_name: Arc<str>,
    pub analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(app_name: impl Into<String>, analyzer: Analyzer) -> Self {
        Self {
            app_name: Arc::from(app_name.into()),
            analyzer: Arc::new(analyzer),
        }
    }
}

/// Build the analyzer for the configured mode.
///
/// In agentic mode a missing model credential fails here, before the
/// server accepts a single request.
pub fn build_analyzer(config: &Config) -> Result<Analyzer> {
    // Page fetches go through SSRF validation
    let fetcher: Arc<dyn PageFetcher> = Arc::new(ValidatedFetcher::new(
        HttpFetcher::new().context("Failed to build HTTP client")?,
    ));

    let analyzer = match config.analysis_mode {
        AnalysisMode::Agentic => {
            let coordinator = Coordinator::from_config(config.pipeline.clone())
                .context("Failed to build extraction pipeline")?
                .with_fetcher(fetcher);
            Analyzer::agentic(coordinator)
        }
        AnalysisMode::Heuristic => Analyzer::heuristic(Normalizer::new().with_fetcher(fetcher)),
    };

    tracing::info!(mode = ?analyzer.mode(), "Analyzer ready");
    Ok(analyzer)
}

/// Build the application from configuration.
pub fn build_app(config: &Config) -> Result<Router> {
    let analyzer = build_analyzer(config)?;
    let state = AppState::new(config.app_name.clone(), analyzer);
    Ok(build_router(
        state,
        &config.allowed_origins,
        config.max_upload_bytes,
    ))
}

/// Build the Axum router around prepared state.
pub fn build_router(state: AppState, allowed_origins: &[String], max_upload_bytes: usize) -> Router {
    let cors = cors_layer(allowed_origins);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/context/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
    use context_extraction::{AICredentials, PipelineConfig};

    fn config(mode: AnalysisMode, pipeline: PipelineConfig) -> Config {
        Config {
            port: 8000,
            app_name: "Client Context Analyzer API".to_string(),
            allowed_origins: vec!["https://app.test".to_string(), "not a header\n".to_string()],
            analysis_mode: mode,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            pipeline,
        }
    }

    #[test]
    fn test_agentic_without_key_fails_at_startup() {
        let result = build_app(&config(AnalysisMode::Agentic, PipelineConfig::default()));
        let error = result.err().unwrap();
        assert!(format!("{error:#}").contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_agentic_with_key_builds() {
        let pipeline =
            PipelineConfig::default().with_credentials(AICredentials::new("sk-test", "gpt-4o"));
        let analyzer = build_analyzer(&config(AnalysisMode::Agentic, pipeline)).unwrap();
        assert_eq!(analyzer.mode(), AnalysisMode::Agentic);
    }

    #[test]
    fn test_heuristic_needs_no_key() {
        assert!(build_app(&config(AnalysisMode::Heuristic, PipelineConfig::default())).is_ok());
    }
}
