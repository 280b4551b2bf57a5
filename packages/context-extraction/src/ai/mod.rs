//! Language model implementations.
//!
//! This module provides a reference implementation of the
//! [`LanguageModel`](crate::traits::model::LanguageModel) trait. Users can
//! use it directly or implement their own.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAI;
