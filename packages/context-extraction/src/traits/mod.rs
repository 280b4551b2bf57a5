//! Core trait abstractions for the pipeline's external collaborators.
//!
//! Applications implement these to plug in a language model or a page
//! fetcher; the `testing` module provides scripted mocks of both.

pub mod fetcher;
pub mod model;
