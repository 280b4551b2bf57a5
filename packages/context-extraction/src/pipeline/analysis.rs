//! Request-level analysis: one call from an upload form to a summary.
//!
//! Wraps either the model-backed [`Coordinator`] or the model-free
//! [`HeuristicAnalyzer`] behind the same request and response shapes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::normalizers::Normalizer;
use crate::pipeline::coordinator::{normalize_entry, Coordinator};
use crate::pipeline::heuristics::HeuristicAnalyzer;
use crate::types::config::RunOptions;
use crate::types::record::{BusinessContextRecord, Outcome};
use crate::types::run::{EnrichmentOutcome, LogEntry};
use crate::types::source::SourceInput;

/// Source key given to text pasted directly into the request.
pub const RAW_TEXT_SOURCE: &str = "raw_text_blocks";

const HEURISTIC_NO_ENRICHMENT: &str = "Enrichment needs the model-backed agentic mode.";

/// How requests are analysed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Full model-backed pipeline
    #[default]
    Agentic,
    /// Keyword rules only, no model
    Heuristic,
}

impl FromStr for AnalysisMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agentic" | "" => Ok(Self::Agentic),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(PipelineError::Config(format!(
                "unknown analysis mode '{other}' (expected 'agentic' or 'heuristic')"
            ))),
        }
    }
}

/// One analysis request.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeRequest {
    /// Written verbatim into the summary when given
    pub client_name: Option<String>,

    /// Pasted text, one block per entry
    pub raw_text_blocks: Vec<String>,

    /// Uploaded documents and URLs
    pub inputs: Vec<SourceInput>,

    /// Per-request enrichment override
    pub enrich: Option<bool>,
}

impl AnalyzeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_text_blocks<I, S>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw_text_blocks.extend(blocks.into_iter().map(Into::into));
        self
    }

    pub fn with_input(mut self, input: SourceInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_enrich(mut self, enrich: bool) -> Self {
        self.enrich = Some(enrich);
        self
    }

    /// All sources of the request; pasted text comes first.
    pub fn sources(&self) -> Vec<SourceInput> {
        let mut sources = Vec::with_capacity(self.inputs.len() + 1);
        let pasted: Vec<&str> = self
            .raw_text_blocks
            .iter()
            .map(|b| b.as_str())
            .filter(|b| !b.trim().is_empty())
            .collect();
        if !pasted.is_empty() {
            sources.push(SourceInput::text(RAW_TEXT_SOURCE, pasted.join("\n")));
        }
        sources.extend(self.inputs.iter().cloned());
        sources
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Completed,
    Failed,
}

/// Result of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisStatus,
    pub mode: AnalysisMode,

    /// The record, or the sentinel the pipeline ended with
    pub summary: Outcome<BusinessContextRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentOutcome>,

    pub log: Vec<LogEntry>,
}

/// Turns requests into responses in the configured mode.
#[derive(Clone)]
pub enum Analyzer {
    Agentic(Coordinator),
    Heuristic {
        normalizer: Normalizer,
        rules: HeuristicAnalyzer,
    },
}

impl Analyzer {
    pub fn agentic(coordinator: Coordinator) -> Self {
        Self::Agentic(coordinator)
    }

    pub fn heuristic(normalizer: Normalizer) -> Self {
        Self::Heuristic {
            normalizer,
            rules: HeuristicAnalyzer::new(),
        }
    }

    pub fn mode(&self) -> AnalysisMode {
        match self {
            Self::Agentic(_) => AnalysisMode::Agentic,
            Self::Heuristic { .. } => AnalysisMode::Heuristic,
        }
    }

    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeResponse> {
        self.analyze_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Analyse a request; only cancellation is returned as an error.
    pub async fn analyze_with_cancel(
        &self,
        request: AnalyzeRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalyzeResponse> {
        let sources = request.sources();
        let span = info_span!("analyze", mode = ?self.mode(), sources = sources.len());
        self.execute(request, sources, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        request: AnalyzeRequest,
        sources: Vec<SourceInput>,
        cancel: &CancellationToken,
    ) -> Result<AnalyzeResponse> {
        let (mut summary, enrichment, log, analysis_id) = match self {
            Self::Agentic(coordinator) => {
                let options = RunOptions {
                    enrich: request.enrich,
                    client_name: request.client_name.clone(),
                    ..RunOptions::default()
                };
                let run = coordinator.run_with_cancel(&sources, &options, cancel).await?;
                (run.final_record, run.enrichment, run.log, run.run_id)
            }
            Self::Heuristic { normalizer, rules } => {
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                let normalized = normalizer.normalize_all(&sources).await;
                let record = rules.analyze(
                    request.client_name.as_deref(),
                    &normalized.combined_text(),
                );
                let log = vec![normalize_entry(&normalized)];
                let enrichment = (request.enrich == Some(true)).then(|| {
                    info!("Enrichment requested but unavailable in heuristic mode");
                    EnrichmentOutcome::Skipped {
                        reason: HEURISTIC_NO_ENRICHMENT.to_string(),
                        record: Outcome::Ok(record.clone()),
                    }
                });
                (Outcome::Ok(record), enrichment, log, Uuid::now_v7())
            }
        };

        if let (Outcome::Ok(record), Some(name)) = (&mut summary, &request.client_name) {
            record.client_name = Some(name.clone());
        }

        let status = if summary.is_ok() {
            AnalysisStatus::Completed
        } else {
            AnalysisStatus::Failed
        };
        info!(analysis_id = %analysis_id, status = ?status, "Analysis finished");

        Ok(AnalyzeResponse {
            analysis_id,
            status,
            mode: self.mode(),
            summary,
            enrichment,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use crate::types::config::PipelineConfig;
    use crate::types::run::Step;
    use serde_json::json;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("agentic".parse::<AnalysisMode>().unwrap(), AnalysisMode::Agentic);
        assert_eq!(" Heuristic ".parse::<AnalysisMode>().unwrap(), AnalysisMode::Heuristic);
        assert!("magic".parse::<AnalysisMode>().is_err());
    }

    #[test]
    fn test_pasted_blocks_become_one_text_source() {
        let request = AnalyzeRequest::new()
            .with_text_blocks(["ACME wants to optimize", "  ", "Budget is tight"])
            .with_input(SourceInput::text("brief.txt", "more"));

        let sources = request.sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].identifier(), RAW_TEXT_SOURCE);
        assert_eq!(sources[1].identifier(), "brief.txt");
    }

    #[tokio::test]
    async fn test_heuristic_mode_preserves_client_name() {
        let analyzer = Analyzer::heuristic(Normalizer::new());
        let response = analyzer
            .analyze(
                AnalyzeRequest::new()
                    .with_client_name("  ACME Corp ")
                    .with_text_blocks(["ACME busca optimizar su cadena de suministro."]),
            )
            .await
            .unwrap();

        assert_eq!(response.status, AnalysisStatus::Completed);
        assert_eq!(response.mode, AnalysisMode::Heuristic);
        let summary = response.summary.as_ok().unwrap();
        assert_eq!(summary.client_name.as_deref(), Some("  ACME Corp "));
        assert_eq!(summary.objectives, vec!["Optimize operational processes"]);
        assert_eq!(response.log.len(), 1);
        assert_eq!(response.log[0].step, Step::Normalize);
    }

    #[tokio::test]
    async fn test_agentic_mode_overrides_model_client_name() {
        let model = MockModel::new().with_json(json!({
            "client_name": "Acme",
            "objectives": ["Reduce costs", "Integrate SAP ERP"],
        }));
        let analyzer = Analyzer::agentic(Coordinator::new(model.clone(), PipelineConfig::default()));

        let response = analyzer
            .analyze(
                AnalyzeRequest::new()
                    .with_client_name("ACME Corp")
                    .with_input(SourceInput::text("a.txt", "We need to reduce costs"))
                    .with_input(SourceInput::text("b.txt", "and integrate SAP ERP")),
            )
            .await
            .unwrap();

        assert_eq!(response.status, AnalysisStatus::Completed);
        let summary = response.summary.as_ok().unwrap();
        assert_eq!(summary.client_name.as_deref(), Some("ACME Corp"));
        assert!(!summary.objectives.is_empty());
        assert_eq!(response.log.len(), 3);
    }

    #[tokio::test]
    async fn test_client_name_reaches_enrichment_when_material_lacks_it() {
        let model = MockModel::new()
            .with_json(json!({"objectives": ["Reduce costs"]}))
            .with_json(json!({"industry": "Logistics", "location": "Lima, Peru"}));
        let analyzer = Analyzer::agentic(Coordinator::new(model.clone(), PipelineConfig::default()));

        let response = analyzer
            .analyze(
                AnalyzeRequest::new()
                    .with_client_name("ACME Corp")
                    .with_text_blocks(["We need to reduce costs"])
                    .with_enrich(true),
            )
            .await
            .unwrap();

        assert_eq!(model.call_count(), 2);
        assert_eq!(response.enrichment.as_ref().unwrap().status(), "enriched");
        assert!(model.prompts()[1].contains("ACME Corp"));

        let summary = response.summary.as_ok().unwrap();
        assert_eq!(summary.client_name.as_deref(), Some("ACME Corp"));
        assert_eq!(summary.location.as_deref(), Some("Lima, Peru"));
        assert_eq!(summary.objectives, vec!["Reduce costs"]);
    }

    #[tokio::test]
    async fn test_heuristic_mode_reports_enrichment_unavailable() {
        let analyzer = Analyzer::heuristic(Normalizer::new());
        let response = analyzer
            .analyze(
                AnalyzeRequest::new()
                    .with_text_blocks(["Integrate SAP"])
                    .with_enrich(true),
            )
            .await
            .unwrap();

        let enrichment = response.enrichment.unwrap();
        assert_eq!(enrichment.status(), "skipped");
        assert!(matches!(
            enrichment,
            EnrichmentOutcome::Skipped { ref reason, .. } if reason == HEURISTIC_NO_ENRICHMENT
        ));

        let plain = analyzer
            .analyze(AnalyzeRequest::new().with_text_blocks(["Integrate SAP"]))
            .await
            .unwrap();
        assert!(plain.enrichment.is_none());
    }

    #[tokio::test]
    async fn test_sentinel_summary_is_failed_status() {
        let model = MockModel::new()
            .with_response("no json here")
            .with_response("still none");
        let analyzer = Analyzer::agentic(Coordinator::new(model, PipelineConfig::default()));

        let response = analyzer
            .analyze(
                AnalyzeRequest::new()
                    .with_client_name("ACME")
                    .with_text_blocks(["Some brief"]),
            )
            .await
            .unwrap();

        assert_eq!(response.status, AnalysisStatus::Failed);
        assert!(response.summary.failure().is_some());

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["status"], "failed");
        assert_eq!(body["summary"]["raw_response"], "still none");
    }
}
