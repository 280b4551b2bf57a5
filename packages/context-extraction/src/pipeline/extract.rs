//! Extraction agent: anchored text blocks in, candidate record out.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::pipeline::prompts::{format_blocks, format_extract_prompt};
use crate::pipeline::recovery::recover_candidate;
use crate::traits::model::LanguageModel;
use crate::types::block::TextBlock;
use crate::types::config::PipelineConfig;
use crate::types::record::{CandidateRecord, Outcome};

/// What one extraction produced.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Candidate record, or the sentinel that replaced it
    pub candidate: Outcome<CandidateRecord>,

    /// False when there was no text to send
    pub model_called: bool,

    /// Blocks left out of the prompt to fit the budget
    pub omitted_blocks: usize,
}

/// Asks the model to fill the schema from the given blocks.
///
/// Exactly one model call per invocation and no retries. A failed call or
/// an unparseable reply becomes a sentinel rather than an error.
#[derive(Clone)]
pub struct ExtractionAgent {
    model: Arc<dyn LanguageModel>,
    default_schema: String,
    max_prompt_chars: Option<usize>,
}

impl ExtractionAgent {
    pub fn new(model: Arc<dyn LanguageModel>, config: &PipelineConfig) -> Self {
        Self {
            model,
            default_schema: config.default_schema.clone(),
            max_prompt_chars: config.max_prompt_chars,
        }
    }

    /// Extract a candidate record.
    ///
    /// `schema` overrides the configured schema description for this call.
    pub async fn extract(
        &self,
        blocks: &[TextBlock],
        metadata: &Value,
        schema: Option<&str>,
    ) -> Extraction {
        if blocks.is_empty() {
            info!("No text blocks, returning the no-content candidate");
            return Extraction {
                candidate: Outcome::Ok(CandidateRecord::no_content()),
                model_called: false,
                omitted_blocks: 0,
            };
        }

        let (rendered, omitted_blocks) = format_blocks(blocks, self.max_prompt_chars);
        if omitted_blocks > 0 {
            warn!(
                blocks = blocks.len(),
                omitted = omitted_blocks,
                "Prompt budget reached, trailing blocks left out"
            );
        }

        let schema = schema.unwrap_or(&self.default_schema);
        let prompt = format_extract_prompt(schema, metadata, &rendered);
        debug!(
            model = self.model.name(),
            blocks = blocks.len(),
            prompt_chars = prompt.len(),
            "Submitting extraction prompt"
        );

        let candidate = match self.model.submit(&prompt).await {
            Ok(response) => recover_candidate(&response),
            Err(e) => {
                warn!(error = %e, "Extraction model call failed");
                Outcome::failed(format!("Model call failed: {e}"), "")
            }
        };

        match &candidate {
            Outcome::Ok(c) => info!(fields = c.0.len(), "Extraction produced a candidate"),
            Outcome::Failed(f) => warn!(error = %f.error, "Extraction produced a sentinel"),
        }

        Extraction {
            candidate,
            model_called: true,
            omitted_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use crate::types::block::{anchor_units, AnchorUnit};
    use crate::types::record::NO_CONTENT;
    use serde_json::json;

    fn agent(model: &MockModel) -> ExtractionAgent {
        ExtractionAgent::new(Arc::new(model.clone()), &PipelineConfig::default())
    }

    fn blocks() -> Vec<TextBlock> {
        anchor_units(["ACME Corp wants to reduce costs", "Integrate SAP ERP"], AnchorUnit::Line, "brief.txt")
    }

    #[tokio::test]
    async fn test_one_call_with_blocks_and_schema() {
        let model = MockModel::new().with_json(json!({"client_name": "ACME Corp"}));
        let extraction = agent(&model).extract(&blocks(), &json!({}), None).await;

        assert!(extraction.model_called);
        assert_eq!(model.call_count(), 1);
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("[brief.txt | line 2] Integrate SAP ERP"));
        assert!(prompt.contains("potential_future_opportunities"));

        let candidate = extraction.candidate.as_ok().unwrap();
        assert_eq!(candidate.get("client_name").unwrap(), "ACME Corp");
    }

    #[tokio::test]
    async fn test_schema_override() {
        let model = MockModel::new().with_response("{}");
        agent(&model)
            .extract(&blocks(), &json!({}), Some("{\"only\": \"this\"}"))
            .await;
        assert!(model.prompts()[0].contains("{\"only\": \"this\"}"));
    }

    #[tokio::test]
    async fn test_prose_reply_becomes_sentinel() {
        let model = MockModel::new().with_response("Sorry, I can't help with that.");
        let extraction = agent(&model).extract(&blocks(), &json!({}), None).await;

        let failure = extraction.candidate.failure().unwrap();
        assert_eq!(failure.raw_response, "Sorry, I can't help with that.");
    }

    #[tokio::test]
    async fn test_model_error_becomes_sentinel() {
        let model = MockModel::new().with_error("request timed out");
        let extraction = agent(&model).extract(&blocks(), &json!({}), None).await;

        let failure = extraction.candidate.failure().unwrap();
        assert!(failure.error.contains("request timed out"));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_blocks_no_call() {
        let model = MockModel::new();
        let extraction = agent(&model).extract(&[], &json!({}), None).await;

        assert!(!extraction.model_called);
        assert_eq!(model.call_count(), 0);
        let candidate = extraction.candidate.as_ok().unwrap();
        assert_eq!(candidate.get("business_overview").unwrap(), NO_CONTENT);
        assert_eq!(candidate.get("objectives").unwrap(), &json!([]));
    }
}
