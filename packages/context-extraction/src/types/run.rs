//! Run log, enrichment results and the per-request run value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::types::record::{BusinessContextRecord, Outcome, SentinelFailure};

/// Message returned when a run did not permit enrichment.
pub const ENRICHMENT_NOT_PERMITTED: &str = "Enrichment not permitted for this run.";

/// Pipeline stage a log entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Normalize,
    Extract,
    Validate,
    Repair,
    Enrich,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normalize => "normalize",
            Self::Extract => "extract",
            Self::Validate => "validate",
            Self::Repair => "repair",
            Self::Enrich => "enrich",
        };
        f.write_str(s)
    }
}

/// One entry of the execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub step: Step,
    pub description: String,
    /// Snapshot of the stage's output
    pub payload: Value,
}

impl LogEntry {
    pub fn new(step: Step, description: impl Into<String>, payload: Value) -> Self {
        Self {
            step,
            description: description.into(),
            payload,
        }
    }
}

/// A record after a successful enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Schema-valid record including the enriched fields
    pub record: BusinessContextRecord,

    /// Source reference (URL or citation) per enriched field
    #[serde(default)]
    pub sources: BTreeMap<String, Value>,

    /// Why a field was left unfilled
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
}

/// What the enrichment stage did.
///
/// Every variant except `Enriched` keeps the record it was given, so prior
/// validated data is never dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    /// The run did not allow enrichment; no model call was made
    NotPermitted {
        message: String,
        record: Outcome<BusinessContextRecord>,
    },

    /// Nothing to enrich from; no model call was made
    Skipped {
        reason: String,
        record: Outcome<BusinessContextRecord>,
    },

    /// Enrichment succeeded
    Enriched(EnrichedRecord),

    /// The model reply was unusable
    Failed {
        failure: SentinelFailure,
        record: Outcome<BusinessContextRecord>,
    },
}

impl EnrichmentOutcome {
    pub fn not_permitted(record: Outcome<BusinessContextRecord>) -> Self {
        Self::NotPermitted {
            message: ENRICHMENT_NOT_PERMITTED.to_string(),
            record,
        }
    }

    /// The record the run should return after this stage.
    pub fn final_record(&self) -> Outcome<BusinessContextRecord> {
        match self {
            Self::Enriched(enriched) => Outcome::Ok(enriched.record.clone()),
            Self::NotPermitted { record, .. }
            | Self::Skipped { record, .. }
            | Self::Failed { record, .. } => record.clone(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::NotPermitted { .. } => "not_permitted",
            Self::Skipped { .. } => "skipped",
            Self::Enriched(_) => "enriched",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One pipeline run: ephemeral, owned by the coordinator, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Validated (or enriched) record, or the terminal sentinel
    pub final_record: Outcome<BusinessContextRecord>,

    /// Present when the enrichment stage ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentOutcome>,

    /// Ordered execution trace
    pub log: Vec<LogEntry>,
}

impl PipelineRun {
    /// Steps of the log, in order.
    pub fn steps(&self) -> Vec<Step> {
        self.log.iter().map(|e| e.step).collect()
    }

    pub fn succeeded(&self) -> bool {
        self.final_record.is_ok()
    }
}
