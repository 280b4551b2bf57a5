//! Validation agent: schema coercion with a single repair attempt.
//!
//! ```text
//! Direct ──ok──> Valid
//!   │
//!   └─err──> Repair ──ok──> Repaired
//!              │
//!              └─err──> RepairFailed (sentinel)
//! ```
//!
//! There is no loop back to `Direct` and never a second repair.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::pipeline::prompts::format_repair_prompt;
use crate::pipeline::recovery::recover_object;
use crate::pipeline::schema::{coerce_candidate, coerce_value, Coerced};
use crate::traits::model::LanguageModel;
use crate::types::record::{BusinessContextRecord, CandidateRecord, Outcome, SentinelFailure};

/// Terminal state of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// Direct coercion succeeded
    Valid,
    /// Direct coercion failed, the repaired candidate passed
    Repaired,
    /// Direct coercion failed and so did the repair
    RepairFailed,
}

/// The repair attempt, when one was made.
#[derive(Debug, Clone, Serialize)]
pub struct RepairAttempt {
    /// Raw model reply (empty when the call itself failed)
    pub response: String,

    /// Repaired record or the terminal sentinel
    pub record: Outcome<BusinessContextRecord>,
}

/// Result of validating one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub state: ValidationState,

    /// Final record, or the repair sentinel
    pub record: Outcome<BusinessContextRecord>,

    /// Why direct coercion failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairAttempt>,

    /// Evidence collected from the candidate (or its repair)
    pub evidence: BTreeMap<String, Value>,

    /// Notes on missing or ambiguous fields
    pub notes: BTreeMap<String, String>,
}

impl Validation {
    pub fn repair_attempted(&self) -> bool {
        self.repair.is_some()
    }

    fn valid(coerced: Coerced) -> Self {
        Self {
            state: ValidationState::Valid,
            record: Outcome::Ok(coerced.record),
            direct_error: None,
            repair: None,
            evidence: coerced.evidence,
            notes: coerced.notes,
        }
    }

    fn after_repair(direct_error: String, response: String, result: Result<Coerced, SentinelFailure>) -> Self {
        match result {
            Ok(coerced) => Self {
                state: ValidationState::Repaired,
                record: Outcome::Ok(coerced.record.clone()),
                direct_error: Some(direct_error),
                repair: Some(RepairAttempt {
                    response,
                    record: Outcome::Ok(coerced.record),
                }),
                evidence: coerced.evidence,
                notes: coerced.notes,
            },
            Err(failure) => Self {
                state: ValidationState::RepairFailed,
                record: Outcome::Failed(failure.clone()),
                direct_error: Some(direct_error),
                repair: Some(RepairAttempt {
                    response,
                    record: Outcome::Failed(failure),
                }),
                evidence: BTreeMap::new(),
                notes: BTreeMap::new(),
            },
        }
    }
}

/// Coerces candidates into [`BusinessContextRecord`], repairing once.
#[derive(Clone)]
pub struct ValidationAgent {
    model: Arc<dyn LanguageModel>,
}

impl ValidationAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Validate a candidate (or a sentinel flowing in from extraction).
    ///
    /// A sentinel never matches the schema, so it always goes to repair
    /// with its raw text as context.
    pub async fn validate(&self, candidate: &Outcome<CandidateRecord>) -> Validation {
        let (direct, invalid) = match candidate {
            Outcome::Ok(c) => (coerce_candidate(c), c.clone().into_value()),
            Outcome::Failed(f) => {
                let value = f.to_value();
                (coerce_value(&value), value)
            }
        };

        let error = match direct {
            Ok(coerced) => {
                debug!("Candidate matches schema");
                return Validation::valid(coerced);
            }
            Err(e) => e.to_string(),
        };

        info!(error = %error, "Candidate failed schema coercion, attempting repair");
        let prompt = format_repair_prompt(&invalid, &error);

        let (response, result) = match self.model.submit(&prompt).await {
            Ok(response) => {
                let result = recover_object(&response).and_then(|map| {
                    coerce_value(&Value::Object(map)).map_err(|e| {
                        SentinelFailure::new(format!("Repaired JSON still invalid: {e}"), response.as_str())
                    })
                });
                (response, result)
            }
            Err(e) => {
                warn!(error = %e, "Repair model call failed");
                (String::new(), Err(SentinelFailure::new(format!("Model call failed: {e}"), "")))
            }
        };

        match &result {
            Ok(_) => info!("Repair produced a valid record"),
            Err(f) => warn!(error = %f.error, "Repair failed"),
        }

        Validation::after_repair(error, response, result)
    }
}
