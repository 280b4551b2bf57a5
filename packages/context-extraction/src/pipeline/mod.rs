//! Extraction pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Extraction of a candidate record from anchored text blocks
//! - JSON recovery from free-form model replies
//! - Schema coercion with a single repair attempt
//! - Opt-in enrichment from public knowledge
//! - The coordinator that runs the stages in order and keeps the log
//! - Request-level analysis, including the model-free heuristic mode

pub mod analysis;
pub mod coordinator;
pub mod enrich;
pub mod extract;
pub mod heuristics;
pub mod prompts;
pub mod recovery;
pub mod schema;
pub mod validate;

pub use analysis::{
    AnalysisMode, AnalysisStatus, AnalyzeRequest, AnalyzeResponse, Analyzer, RAW_TEXT_SOURCE,
};
pub use coordinator::Coordinator;
pub use enrich::{EnrichmentAgent, NOTHING_TO_LOOK_UP, UPSTREAM_FAILED};
pub use extract::{Extraction, ExtractionAgent};
pub use heuristics::HeuristicAnalyzer;
pub use prompts::{
    format_blocks, format_enrich_prompt, format_extract_prompt, format_repair_prompt,
    prompt_version, ENRICH_PROMPT, EXTRACT_PROMPT, REPAIR_PROMPT,
};
pub use recovery::{recover_candidate, recover_object, NO_JSON_OBJECT};
pub use schema::{coerce_candidate, coerce_value, Coerced};
pub use validate::{RepairAttempt, Validation, ValidationAgent, ValidationState};
