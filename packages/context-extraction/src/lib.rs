//! Business Context Extraction Library
//!
//! Turns client-supplied material (PDF and DOCX documents, plain text,
//! fetched web pages) into a validated [`BusinessContextRecord`], optionally
//! enriched with publicly sourced facts.
//!
//! # Design Philosophy
//!
//! **"Failures are data"**
//!
//! - The language model is an unreliable collaborator, so every stage is a
//!   total function over [`Outcome`]: a failed stage hands a sentinel to the
//!   next one instead of short-circuiting
//! - Exactly one extraction call, at most one repair, at most one enrichment
//! - Every field traces back to an anchored block (`brief.txt | line 3`)
//! - Configuration is an explicit value, never an ambient lookup
//!
//! # Usage
//!
//! ```rust,ignore
//! use context_extraction::{Coordinator, PipelineConfig, SourceInput};
//! use context_extraction::testing::MockModel;
//!
//! let model = MockModel::new().with_json(serde_json::json!({"client_name": "ACME Corp"}));
//! let coordinator = Coordinator::new(model, PipelineConfig::default());
//!
//! let run = coordinator
//!     .run(&[SourceInput::text("brief.txt", "ACME Corp wants to reduce costs")], false)
//!     .await?;
//!
//! for entry in &run.log {
//!     println!("{}: {}", entry.step, entry.description);
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator abstractions (LanguageModel, PageFetcher)
//! - [`types`] - Blocks, sources, records, configuration and the run log
//! - [`normalizers`] - Per-format text extraction into anchored blocks
//! - [`pipeline`] - The agents, the coordinator and request-level analysis
//! - [`security`] - Credential handling and SSRF protection
//! - [`testing`] - Scripted mocks and document fixtures for tests

pub mod error;
pub mod normalizers;
pub mod pipeline;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{
    CoercionError, FetchError, PipelineError, Result, SecurityError, SourceError,
};
pub use traits::{
    fetcher::{FetchedPage, PageFetcher, ValidatedFetcher},
    model::LanguageModel,
};
pub use types::{
    block::{anchor_units, fingerprint, Anchor, AnchorUnit, TextBlock},
    config::{PipelineConfig, RunOptions, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SCHEMA},
    record::{BusinessContextRecord, CandidateRecord, Outcome, SentinelFailure, NO_CONTENT},
    run::{EnrichedRecord, EnrichmentOutcome, LogEntry, PipelineRun, Step},
    source::{
        MergedMetadata, NormalizedInput, NormalizedSource, SkippedInput, SourceInput, SourceKind,
        SourceMetadata, TextEncoding,
    },
};

// Re-export pipeline components
pub use pipeline::{
    AnalysisMode, AnalysisStatus, AnalyzeRequest, AnalyzeResponse, Analyzer, Coordinator,
    EnrichmentAgent, ExtractionAgent, HeuristicAnalyzer, ValidationAgent, ValidationState,
};

// Re-export normalizers
pub use normalizers::{HttpFetcher, Normalizer};

// Re-export security
pub use security::{AICredentials, SecretString, UrlValidator};

#[cfg(feature = "openai")]
pub use ai::OpenAI;

// Re-export testing utilities
pub use testing::{MockFetcher, MockModel};
