//! HTTP boundary for the business context extraction pipeline.
//!
//! Accepts multipart uploads, hands them to the configured
//! [`context_extraction::Analyzer`] and returns its response as JSON.

pub mod app;
pub mod config;
pub mod error;
pub mod routes;

pub use app::{build_analyzer, build_app, build_router, AppState};
pub use config::Config;
pub use error::ApiError;
