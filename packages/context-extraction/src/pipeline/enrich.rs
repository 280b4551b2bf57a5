//! Enrichment agent: fills gaps from public knowledge, opt-in per run.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::pipeline::prompts::format_enrich_prompt;
use crate::pipeline::recovery::recover_object;
use crate::pipeline::schema::coerce_value;
use crate::traits::model::LanguageModel;
use crate::types::record::{BusinessContextRecord, Outcome, SentinelFailure};
use crate::types::run::{EnrichedRecord, EnrichmentOutcome};

/// Reason given when an upstream stage already failed.
pub const UPSTREAM_FAILED: &str = "Upstream stage failed; nothing to enrich.";

/// Reason given when the record identifies nothing to look up.
pub const NOTHING_TO_LOOK_UP: &str = "Record has no identifying data to look up.";

/// Asks the model to fill missing fields and cite a source for each.
///
/// Fail-closed: without permission no call is made. At most one call per
/// invocation and no repair of a bad reply; on failure the prior record is
/// returned unchanged alongside the sentinel.
#[derive(Clone)]
pub struct EnrichmentAgent {
    model: Arc<dyn LanguageModel>,
}

impl EnrichmentAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn enrich(
        &self,
        record: Outcome<BusinessContextRecord>,
        allowed: bool,
    ) -> EnrichmentOutcome {
        if !allowed {
            info!("Enrichment not permitted for this run");
            return EnrichmentOutcome::not_permitted(record);
        }

        let prior = match record {
            Outcome::Ok(prior) => prior,
            failed @ Outcome::Failed(_) => {
                info!("Skipping enrichment of a failed record");
                return EnrichmentOutcome::Skipped {
                    reason: UPSTREAM_FAILED.to_string(),
                    record: failed,
                };
            }
        };

        if prior.lacks_identifying_data() {
            info!("Skipping enrichment, record has no identifying data");
            return EnrichmentOutcome::Skipped {
                reason: NOTHING_TO_LOOK_UP.to_string(),
                record: Outcome::Ok(prior),
            };
        }

        let prompt = format_enrich_prompt(&prior);
        let response = match self.model.submit(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Enrichment model call failed");
                return EnrichmentOutcome::Failed {
                    failure: SentinelFailure::new(format!("Model call failed: {e}"), ""),
                    record: Outcome::Ok(prior),
                };
            }
        };

        let coerced = recover_object(&response).and_then(|map| {
            coerce_value(&Value::Object(map)).map_err(|e| {
                SentinelFailure::new(format!("Enriched JSON invalid: {e}"), response.as_str())
            })
        });

        match coerced {
            Ok(coerced) => {
                let record = keep_prior_values(prior, coerced.record);
                info!(sources = coerced.sources.len(), "Record enriched");
                EnrichmentOutcome::Enriched(EnrichedRecord {
                    record,
                    sources: coerced.sources,
                    notes: coerced.notes,
                })
            }
            Err(failure) => {
                warn!(error = %failure.error, "Enrichment reply unusable, keeping prior record");
                EnrichmentOutcome::Failed {
                    failure,
                    record: Outcome::Ok(prior),
                }
            }
        }
    }
}

/// Take the enriched record, restoring any field the model emptied.
fn keep_prior_values(
    prior: BusinessContextRecord,
    mut enriched: BusinessContextRecord,
) -> BusinessContextRecord {
    fn keep_text(slot: &mut Option<String>, prior: Option<String>) {
        if slot.as_deref().map_or(true, |s| s.trim().is_empty()) && prior.is_some() {
            *slot = prior;
        }
    }
    fn keep_list(slot: &mut Vec<String>, prior: Vec<String>) {
        if slot.is_empty() {
            *slot = prior;
        }
    }

    keep_text(&mut enriched.client_name, prior.client_name);
    keep_text(&mut enriched.industry, prior.industry);
    keep_text(&mut enriched.location, prior.location);
    keep_text(&mut enriched.business_overview, prior.business_overview);
    keep_text(&mut enriched.company_info, prior.company_info);
    if enriched.engagement_age.is_none() {
        enriched.engagement_age = prior.engagement_age;
    }
    keep_list(&mut enriched.objectives, prior.objectives);
    keep_list(
        &mut enriched.additional_context_questions,
        prior.additional_context_questions,
    );
    keep_list(
        &mut enriched.potential_future_opportunities,
        prior.potential_future_opportunities,
    );
    enriched
}
