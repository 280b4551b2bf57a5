//! Pipeline coordinator.
//!
//! Owns the fixed stage order for one run:
//!
//! ```text
//! Normalize (per input, merged) → Extract → Validate [→ Repair] [→ Enrich]
//! ```
//!
//! Stages never short-circuit: a sentinel from one stage is handed to the
//! next as data, so the log always shows every attempt that was made. The
//! only errors a run can return are cancellation by the caller; a missing
//! credential already failed when the coordinator was built.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::normalizers::Normalizer;
use crate::pipeline::enrich::EnrichmentAgent;
use crate::pipeline::extract::{Extraction, ExtractionAgent};
use crate::pipeline::prompts::prompt_version;
use crate::pipeline::validate::{Validation, ValidationAgent, ValidationState};
use crate::traits::fetcher::PageFetcher;
use crate::traits::model::LanguageModel;
use crate::types::block::fingerprint;
use crate::types::config::{PipelineConfig, RunOptions};
use crate::types::record::{BusinessContextRecord, Outcome};
use crate::types::run::{EnrichmentOutcome, LogEntry, PipelineRun, Step};
use crate::types::source::{NormalizedInput, SourceInput};

/// Runs the extraction pipeline.
///
/// Cheap to clone and safe to share: the only state is the immutable
/// configuration and a stateless model handle.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = Coordinator::from_config(PipelineConfig::from_env()?)?;
/// let run = coordinator
///     .run(&[SourceInput::document("brief.pdf", bytes)], false)
///     .await?;
/// println!("{}", serde_json::to_string_pretty(&run.final_record)?);
/// ```
#[derive(Clone)]
pub struct Coordinator {
    config: PipelineConfig,
    normalizer: Normalizer,
    extractor: ExtractionAgent,
    validator: ValidationAgent,
    enricher: EnrichmentAgent,
}

impl Coordinator {
    /// Build a coordinator around any model.
    pub fn new(model: impl LanguageModel + 'static, config: PipelineConfig) -> Self {
        Self::with_shared_model(Arc::new(model), config)
    }

    /// Build a coordinator around a model handle shared with other owners.
    pub fn with_shared_model(model: Arc<dyn LanguageModel>, config: PipelineConfig) -> Self {
        Self {
            normalizer: Normalizer::new(),
            extractor: ExtractionAgent::new(model.clone(), &config),
            validator: ValidationAgent::new(model.clone()),
            enricher: EnrichmentAgent::new(model),
            config,
        }
    }

    /// Build a coordinator backed by the OpenAI client.
    ///
    /// Fails with [`PipelineError::MissingCredential`] before any stage can
    /// run when the configuration has no usable key.
    #[cfg(feature = "openai")]
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let model = crate::ai::OpenAI::from_config(&config)?;
        Ok(Self::new(model, config))
    }

    /// Set the fetcher used for URL inputs.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.normalizer = self.normalizer.with_fetcher(fetcher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `inputs`.
    pub async fn run(&self, inputs: &[SourceInput], enrich_allowed: bool) -> Result<PipelineRun> {
        let options = RunOptions::new().with_enrich(enrich_allowed);
        self.run_with_cancel(inputs, &options, &CancellationToken::new())
            .await
    }

    /// Run with per-run options.
    pub async fn run_with_options(
        &self,
        inputs: &[SourceInput],
        options: &RunOptions,
    ) -> Result<PipelineRun> {
        self.run_with_cancel(inputs, options, &CancellationToken::new())
            .await
    }

    /// Run, checking `cancel` before each stage.
    ///
    /// A model call already in flight is allowed to finish; nothing after
    /// it is scheduled.
    pub async fn run_with_cancel(
        &self,
        inputs: &[SourceInput],
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun> {
        let run_id = Uuid::now_v7();
        let span = info_span!("pipeline_run", run_id = %run_id, inputs = inputs.len());
        self.execute(run_id, inputs, options, cancel)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        inputs: &[SourceInput],
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun> {
        let started_at = Utc::now();
        let enrich_allowed = options.enrich.unwrap_or(self.config.enrich_by_default);
        let mut log = Vec::new();

        info!(enrich_allowed, "Pipeline run starting");

        // 1. Normalize
        check(cancel)?;
        let normalized = self.normalizer.normalize_all(inputs).await;
        log.push(normalize_entry(&normalized));

        // 2. Extract
        check(cancel)?;
        let metadata = serde_json::to_value(&normalized.metadata)?;
        let extraction = self
            .extractor
            .extract(&normalized.blocks, &metadata, options.schema.as_deref())
            .await;
        log.push(extract_entry(&extraction, normalized.blocks.len()));

        // 3. Validate, repairing at most once
        check(cancel)?;
        let validation = self.validator.validate(&extraction.candidate).await;
        log.push(validate_entry(&validation));
        if let Some(entry) = repair_entry(&validation) {
            log.push(entry);
        }

        let mut validated = validation.record;
        if let Some(name) = &options.client_name {
            apply_client_name(&mut validated, name);
        }

        // 4. Enrich, only when allowed
        let (mut final_record, enrichment) = if enrich_allowed {
            check(cancel)?;
            let outcome = self.enricher.enrich(validated, true).await;
            log.push(enrich_entry(&outcome));
            (outcome.final_record(), Some(outcome))
        } else {
            (validated, None)
        };
        if let Some(name) = &options.client_name {
            apply_client_name(&mut final_record, name);
        }

        info!(
            succeeded = final_record.is_ok(),
            steps = log.len(),
            "Pipeline run finished"
        );

        Ok(PipelineRun {
            run_id,
            started_at,
            finished_at: Utc::now(),
            final_record,
            enrichment,
            log,
        })
    }
}

/// Caller-supplied names win over extracted ones, verbatim.
pub(crate) fn apply_client_name(record: &mut Outcome<BusinessContextRecord>, name: &str) {
    if let Outcome::Ok(record) = record {
        record.client_name = Some(name.to_string());
    }
}

fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        info!("Run cancelled by caller");
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

pub(crate) fn normalize_entry(normalized: &NormalizedInput) -> LogEntry {
    let description = format!(
        "Normalized {} source(s) into {} text block(s){}",
        normalized.metadata.len(),
        normalized.blocks.len(),
        match normalized.skipped.len() {
            0 => String::new(),
            n => format!("; skipped {n} input(s)"),
        }
    );

    LogEntry::new(
        Step::Normalize,
        description,
        json!({
            "metadata": normalized.metadata,
            "skipped": normalized.skipped,
            "blocks": normalized.blocks.len(),
            "fingerprint": fingerprint(&normalized.blocks),
        }),
    )
}

fn extract_entry(extraction: &Extraction, blocks: usize) -> LogEntry {
    let description = match (&extraction.candidate, extraction.model_called) {
        (Outcome::Ok(_), false) => "No content to extract; produced the empty candidate".to_string(),
        (Outcome::Ok(_), true) => "Extracted candidate record".to_string(),
        (Outcome::Failed(f), _) => format!("Extraction failed: {}", f.error),
    };

    LogEntry::new(
        Step::Extract,
        description,
        json!({
            "candidate": extraction.candidate,
            "blocks": blocks,
            "omitted_blocks": extraction.omitted_blocks,
            "model_called": extraction.model_called,
            "prompt_version": prompt_version(),
        }),
    )
}

fn validate_entry(validation: &Validation) -> LogEntry {
    let (description, payload) = match &validation.direct_error {
        None => (
            "Candidate matches schema".to_string(),
            json!({
                "valid": true,
                "record": validation.record,
                "evidence": validation.evidence,
                "notes": validation.notes,
            }),
        ),
        Some(error) => (
            format!("Candidate failed schema validation: {error}"),
            json!({
                "valid": false,
                "error": error,
            }),
        ),
    };
    LogEntry::new(Step::Validate, description, payload)
}

fn repair_entry(validation: &Validation) -> Option<LogEntry> {
    let repair = validation.repair.as_ref()?;
    let description = match validation.state {
        ValidationState::Repaired => "Repaired candidate matches schema".to_string(),
        _ => format!(
            "Repair failed: {}",
            repair.record.failure().map(|f| f.error.as_str()).unwrap_or("unknown error")
        ),
    };

    Some(LogEntry::new(
        Step::Repair,
        description,
        json!({
            "state": validation.state,
            "record": repair.record,
            "evidence": validation.evidence,
            "notes": validation.notes,
        }),
    ))
}

fn enrich_entry(outcome: &EnrichmentOutcome) -> LogEntry {
    let description = match outcome {
        EnrichmentOutcome::NotPermitted { message, .. } => message.clone(),
        EnrichmentOutcome::Skipped { reason, .. } => format!("Enrichment skipped: {reason}"),
        EnrichmentOutcome::Enriched(e) => {
            format!("Enriched record ({} field source(s))", e.sources.len())
        }
        EnrichmentOutcome::Failed { failure, .. } => {
            format!("Enrichment failed, kept prior record: {}", failure.error)
        }
    };

    let payload = serde_json::to_value(outcome).unwrap_or(Value::Null);
    LogEntry::new(Step::Enrich, description, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use crate::types::record::NO_CONTENT;
    use serde_json::json;

    fn coordinator(model: &MockModel) -> Coordinator {
        Coordinator::new(model.clone(), PipelineConfig::default())
    }

    fn brief() -> Vec<SourceInput> {
        vec![SourceInput::text("brief.txt", "ACME Corp\nWe want to reduce costs")]
    }

    #[tokio::test]
    async fn test_happy_path_without_enrichment() {
        let model = MockModel::new().with_json(json!({
            "client_name": {"value": "ACME Corp", "evidence": "brief.txt | line 1"},
            "objectives": [{"value": "Reduce costs"}],
        }));

        // The wrapper inside a list is invalid, so this also exercises repair
        let model = model.with_json(json!({"client_name": "ACME Corp", "objectives": ["Reduce costs"]}));

        let run = coordinator(&model).run(&brief(), false).await.unwrap();

        assert_eq!(
            run.steps(),
            vec![Step::Normalize, Step::Extract, Step::Validate, Step::Repair]
        );
        assert!(run.enrichment.is_none());
        assert_eq!(run.final_record.as_ok().unwrap().objectives, vec!["Reduce costs"]);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_normalize_entry_carries_metadata_and_fingerprint() {
        let model = MockModel::new().with_json(json!({"client_name": "ACME Corp"}));
        let run = coordinator(&model).run(&brief(), false).await.unwrap();

        let payload = &run.log[0].payload;
        assert_eq!(payload["metadata"]["brief.txt"]["kind"], "text");
        assert_eq!(payload["blocks"], 2);
        assert_eq!(payload["fingerprint"].as_str().unwrap().len(), 64);
        assert_eq!(run.log.len(), 3);
    }

    #[tokio::test]
    async fn test_enrichment_adds_one_step() {
        let model = MockModel::new()
            .with_json(json!({"client_name": "ACME Corp"}))
            .with_json(json!({"client_name": "ACME Corp", "industry": "Manufacturing", "sources": {"industry": "https://acme.test"}}));

        let run = coordinator(&model).run(&brief(), true).await.unwrap();

        assert_eq!(
            run.steps(),
            vec![Step::Normalize, Step::Extract, Step::Validate, Step::Enrich]
        );
        assert_eq!(
            run.final_record.as_ok().unwrap().industry.as_deref(),
            Some("Manufacturing")
        );
        assert_eq!(run.enrichment.as_ref().unwrap().status(), "enriched");
    }

    #[tokio::test]
    async fn test_caller_client_name_is_what_enrichment_looks_up() {
        let model = MockModel::new()
            .with_json(json!({"client_name": "Acme Anvils", "objectives": ["Reduce costs"]}))
            .with_json(json!({"client_name": "ACME Corp", "industry": "Logistics", "sources": {"industry": "https://acme.test"}}));

        let options = RunOptions::new().with_enrich(true).with_client_name("ACME Corp");
        let run = coordinator(&model).run_with_options(&brief(), &options).await.unwrap();

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("ACME Corp"));
        assert!(!prompts[1].contains("Acme Anvils"));

        let record = run.final_record.as_ok().unwrap();
        assert_eq!(record.client_name.as_deref(), Some("ACME Corp"));
        assert_eq!(record.industry.as_deref(), Some("Logistics"));
    }

    #[tokio::test]
    async fn test_large_input_reaches_prompt_whole_by_default() {
        let mut body: String = (1..=2000)
            .map(|n| format!("Line {n} of the supplier review notes\n"))
            .collect();
        body.push_str("The client is based in Lima");

        let model = MockModel::new().with_json(json!({"client_name": "ACME Corp", "location": "Lima"}));
        let run = coordinator(&model)
            .run(&[SourceInput::text("review.txt", body)], false)
            .await
            .unwrap();

        assert_eq!(run.log[1].payload["omitted_blocks"], 0);
        assert!(model.prompts()[0].contains("[review.txt | line 2001] The client is based in Lima"));
    }

    #[tokio::test]
    async fn test_prompt_cap_is_opt_in() {
        let body: String = (1..=50).map(|n| format!("Line number {n}\n")).collect();
        let model = MockModel::new().with_json(json!({"client_name": "ACME Corp"}));
        let coordinator = Coordinator::new(
            model.clone(),
            PipelineConfig::default().with_max_prompt_chars(200),
        );

        let run = coordinator
            .run(&[SourceInput::text("notes.txt", body)], false)
            .await
            .unwrap();

        assert!(run.log[1].payload["omitted_blocks"].as_u64().unwrap() > 0);
        assert!(!model.prompts()[0].contains("Line number 50"));
    }

    #[tokio::test]
    async fn test_enrich_by_default_from_config() {
        let model = MockModel::new().with_json(json!({"client_name": "ACME Corp"}));
        let coordinator = Coordinator::new(
            model.clone(),
            PipelineConfig::default().with_enrich_by_default(true),
        );

        // Explicit opt-out wins over the default
        let options = RunOptions::new().with_enrich(false);
        let run = coordinator.run_with_options(&brief(), &options).await.unwrap();
        assert_eq!(run.log.len(), 3);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_yields_no_content_record() {
        let model = MockModel::new();
        let run = coordinator(&model)
            .run(&[SourceInput::text("blank.txt", "  \n\n\t\n")], false)
            .await
            .unwrap();

        let record = run.final_record.as_ok().unwrap();
        assert_eq!(record.business_overview.as_deref(), Some(NO_CONTENT));
        assert_eq!(record.company_info.as_deref(), Some(NO_CONTENT));
        assert!(record.objectives.is_empty());
        assert!(record.additional_context_questions.is_empty());
        assert!(record.potential_future_opportunities.is_empty());
        assert_eq!(model.call_count(), 0);
        assert_eq!(run.log.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_run_schedules_nothing() {
        let model = MockModel::new().with_json(json!({}));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator(&model)
            .run_with_cancel(&brief(), &RunOptions::new(), &cancel)
            .await;

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_schema_override_reaches_prompt() {
        let model = MockModel::new().with_json(json!({}));
        let options = RunOptions::new().with_schema("{\"client_name\": \"string\"}");
        coordinator(&model).run_with_options(&brief(), &options).await.unwrap();

        assert!(model.prompts()[0].contains("{\"client_name\": \"string\"}"));
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_from_config_without_key_is_hard_stop() {
        let result = Coordinator::from_config(PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::MissingCredential(_))));
    }
}
